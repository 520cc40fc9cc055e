//! HTTP surface.
//!
//! A thin request/response contract over the synchronous pipeline:
//! `POST /api/plan` takes the three CSV inputs inline (plus optional
//! disruption events and seed) and returns the structured equivalent of the
//! four output files; `POST /api/disrupt` is the same contract but demands a
//! non-empty event list, mirroring the CLI `disrupt` subcommand;
//! `GET /api/sample` runs the bundled sample data; `GET /health` answers
//! liveness probes. Input validation of the CSV payloads happens here at
//! the boundary; the pipeline itself only ever sees well-formed data.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PlannerConfig;
use crate::domain::DisruptionEvent;
use crate::error::PlannerError;
use crate::ga::CancelFlag;
use crate::disruption;
use crate::io::{self, AlertRow, FlightLoadRow, PlanRouteRow};
use crate::pipeline::{PlanSummary, Planner};

const SAMPLE_FLIGHTS: &str = include_str!("../../data/sample/flights.csv");
const SAMPLE_CARGO: &str = include_str!("../../data/sample/cargo.csv");
const SAMPLE_CONNECTIONS: &str = include_str!("../../data/sample/connections.csv");

pub struct AppState {
    pub config: PlannerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    pub flights_csv: String,
    pub cargo_csv: String,
    pub connections_csv: String,
    #[serde(default)]
    pub events: Vec<DisruptionEvent>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Structured equivalent of the four output files.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub routes: Vec<PlanRouteRow>,
    pub flight_loads: Vec<FlightLoadRow>,
    pub alerts: Vec<AlertRow>,
    pub summary: PlanSummary,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/plan", post(run_plan))
        .route("/api/disrupt", post(run_disrupt))
        .route("/api/sample", get(run_sample))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, config: PlannerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState { config });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP surface listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn run_plan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, (StatusCode, String)> {
    let config = state.config.clone();
    let response = tokio::task::spawn_blocking(move || execute(config, request))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(error_response)?;
    Ok(Json(response))
}

async fn run_disrupt(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, (StatusCode, String)> {
    if request.events.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "disrupt requires a non-empty events list".to_string(),
        ));
    }
    let config = state.config.clone();
    let response = tokio::task::spawn_blocking(move || execute(config, request))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(error_response)?;
    Ok(Json(response))
}

async fn run_sample(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PlanResponse>, (StatusCode, String)> {
    let config = state.config.clone();
    let request = PlanRequest {
        flights_csv: SAMPLE_FLIGHTS.to_string(),
        cargo_csv: SAMPLE_CARGO.to_string(),
        connections_csv: SAMPLE_CONNECTIONS.to_string(),
        events: Vec::new(),
        seed: None,
    };
    let response = tokio::task::spawn_blocking(move || execute(config, request))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(error_response)?;
    Ok(Json(response))
}

fn error_response(err: PlannerError) -> (StatusCode, String) {
    match &err {
        PlannerError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// Run the pipeline for one request. Synchronous; callers put it on a
/// blocking thread.
pub fn execute(config: PlannerConfig, request: PlanRequest) -> Result<PlanResponse, PlannerError> {
    let flights = io::read_flights(request.flights_csv.as_bytes(), "flights_csv")?;
    let cargo = io::read_cargo(request.cargo_csv.as_bytes(), "cargo_csv")?;
    let rules = io::read_connections(request.connections_csv.as_bytes(), "connections_csv")?;

    let planner = Planner::new(flights, cargo, rules, config);
    let cancel = CancelFlag::new();
    let baseline = match request.seed {
        Some(seed) => planner.plan_with_seed(seed, &cancel),
        None => planner.plan(&cancel),
    };

    let (mut outcome, flight_map, alerts) = if request.events.is_empty() {
        let alerts = baseline.alerts.clone();
        let flights = planner.graph().flight_map().clone();
        (baseline, flights, alerts)
    } else {
        let result = disruption::run(&planner, &baseline, &request.events);
        let alerts = result.combined_alerts();
        (result.plan, result.flights, alerts)
    };
    outcome.summary.recount_alerts(&alerts);

    Ok(PlanResponse {
        routes: io::plan_route_rows(&outcome, planner.cargo()),
        flight_loads: io::flight_load_rows(&outcome, &flight_map),
        alerts: io::alert_rows(&alerts),
        summary: outcome.summary,
    })
}

//! Pipeline orchestration.
//!
//! Owns the validated inputs, builds the route catalog, runs the GA and
//! materializes the winning individual into a [`PlanOutcome`]. Any
//! well-formed input produces a complete plan; problems along the way are
//! carried as alerts.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::config::PlannerConfig;
use crate::domain::{
    Alert, AlertKind, Cargo, CargoId, CargoStatus, ConnectionRule, Flight, FlightId, RuleIndex,
    Severity,
};
use crate::ga::{self, CancelFlag};
use crate::graph::FlightGraph;
use crate::routes::RouteCatalog;
use crate::sim::{self, CargoAssignment, FlightLoad};

/// Read-only world shared across the GA's evaluation workers.
#[derive(Clone, Copy)]
pub struct PlanContext<'a> {
    pub graph: &'a FlightGraph,
    pub cargo: &'a BTreeMap<CargoId, Cargo>,
    pub catalog: &'a RouteCatalog,
    pub config: &'a PlannerConfig,
}

/// Aggregate figures for `plan_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub total_margin: Decimal,
    pub delivered: usize,
    pub rolled: usize,
    pub denied: usize,
    pub utilization: UtilizationStats,
    pub alert_counts: BTreeMap<String, usize>,
    pub generations_run: usize,
}

impl PlanSummary {
    /// Rebuild the alert counts from a final alert list (used once
    /// disruption diff alerts are merged in).
    pub fn recount_alerts(&mut self, alerts: &[Alert]) {
        self.alert_counts.clear();
        for alert in alerts {
            *self.alert_counts.entry(alert.kind.to_string()).or_insert(0) += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UtilizationStats {
    pub avg_weight_pct: f64,
    pub avg_volume_pct: f64,
    pub flights_with_load: usize,
    pub total_flights: usize,
}

/// The complete output of one planning run.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub seed: u64,
    pub assignments: BTreeMap<CargoId, CargoAssignment>,
    pub flight_loads: BTreeMap<FlightId, FlightLoad>,
    pub alerts: Vec<Alert>,
    pub summary: PlanSummary,
}

/// The planner: validated inputs plus configuration.
pub struct Planner {
    graph: FlightGraph,
    cargo: BTreeMap<CargoId, Cargo>,
    rules: RuleIndex,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(
        flights: Vec<Flight>,
        cargo: Vec<Cargo>,
        rules: Vec<ConnectionRule>,
        config: PlannerConfig,
    ) -> Self {
        let flight_map: BTreeMap<FlightId, Flight> = flights
            .into_iter()
            .map(|f| (f.flight_id.clone(), f))
            .collect();
        let cargo_map: BTreeMap<CargoId, Cargo> = cargo
            .into_iter()
            .map(|c| (c.cargo_id.clone(), c))
            .collect();
        Planner {
            graph: FlightGraph::from_flights(flight_map),
            cargo: cargo_map,
            rules: RuleIndex::from_rules(rules),
            config,
        }
    }

    /// Planner over an already-built flight map (used by the disruption
    /// engine after mutating the schedule).
    pub fn with_flight_map(
        flights: BTreeMap<FlightId, Flight>,
        cargo: BTreeMap<CargoId, Cargo>,
        rules: RuleIndex,
        config: PlannerConfig,
    ) -> Self {
        Planner {
            graph: FlightGraph::from_flights(flights),
            cargo,
            rules,
            config,
        }
    }

    pub fn graph(&self) -> &FlightGraph {
        &self.graph
    }

    pub fn cargo(&self) -> &BTreeMap<CargoId, Cargo> {
        &self.cargo
    }

    pub fn rules(&self) -> &RuleIndex {
        &self.rules
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Run the full pipeline with the configured seed.
    pub fn plan(&self, cancel: &CancelFlag) -> PlanOutcome {
        self.plan_with_seed(self.config.seed, cancel)
    }

    /// Run the full pipeline: enumerate routes, optimize, materialize the
    /// winner.
    pub fn plan_with_seed(&self, seed: u64, cancel: &CancelFlag) -> PlanOutcome {
        info!(
            flights = self.graph.flight_count(),
            cargo = self.cargo.len(),
            rules = self.rules.len(),
            seed,
            "planning run started"
        );
        let catalog = RouteCatalog::build(&self.cargo, &self.graph, &self.rules, &self.config);
        let ctx = PlanContext {
            graph: &self.graph,
            cargo: &self.cargo,
            catalog: &catalog,
            config: &self.config,
        };

        let outcome = ga::optimize(&ctx, seed, cancel);
        let simulation = sim::simulate(&ctx, &outcome.best_genes);

        let mut alerts = simulation.alerts;
        if outcome.budget_exhausted {
            alerts.push(Alert::new(
                AlertKind::PartialOptimization,
                Severity::Info,
                format!(
                    "optimization budget exhausted after {} generations, returning best plan found",
                    outcome.generations_run
                ),
            ));
        }
        if outcome.cancelled {
            alerts.push(Alert::new(
                AlertKind::PartialOptimization,
                Severity::Info,
                format!(
                    "optimization cancelled after {} generations, returning best plan found",
                    outcome.generations_run
                ),
            ));
        }

        let summary = summarize(
            &self.graph,
            &simulation.assignments,
            &simulation.flight_loads,
            &alerts,
            simulation.total_margin,
            outcome.generations_run,
        );

        info!(
            total_margin = %summary.total_margin,
            delivered = summary.delivered,
            rolled = summary.rolled,
            denied = summary.denied,
            "planning run finished"
        );

        PlanOutcome {
            seed,
            assignments: simulation.assignments,
            flight_loads: simulation.flight_loads,
            alerts,
            summary,
        }
    }
}

fn summarize(
    graph: &FlightGraph,
    assignments: &BTreeMap<CargoId, CargoAssignment>,
    flight_loads: &BTreeMap<FlightId, FlightLoad>,
    alerts: &[Alert],
    total_margin: Decimal,
    generations_run: usize,
) -> PlanSummary {
    let delivered = assignments
        .values()
        .filter(|a| a.status == CargoStatus::Delivered)
        .count();
    let rolled = assignments
        .values()
        .filter(|a| a.status == CargoStatus::Rolled)
        .count();
    let denied = assignments
        .values()
        .filter(|a| a.status == CargoStatus::Denied)
        .count();

    let total_flights = flight_loads.len();
    let mut weight_pct_sum = 0.0;
    let mut volume_pct_sum = 0.0;
    let mut flights_with_load = 0;
    for load in flight_loads.values() {
        if let Some(flight) = graph.flight(&load.flight_id) {
            weight_pct_sum += load.weight_used / flight.weight_capacity_kg * 100.0;
            volume_pct_sum += load.volume_used / flight.volume_capacity_m3 * 100.0;
        }
        if !load.boarded.is_empty() {
            flights_with_load += 1;
        }
    }
    let divisor = total_flights.max(1) as f64;

    let mut alert_counts = BTreeMap::new();
    for alert in alerts {
        *alert_counts.entry(alert.kind.to_string()).or_insert(0) += 1;
    }

    PlanSummary {
        total_margin,
        delivered,
        rolled,
        denied,
        utilization: UtilizationStats {
            avg_weight_pct: weight_pct_sum / divisor,
            avg_volume_pct: volume_pct_sum / divisor,
            flights_with_load,
            total_flights,
        },
        alert_counts,
        generations_run,
    }
}

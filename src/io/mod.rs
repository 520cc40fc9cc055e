//! Input loading and output serialization.
//!
//! Three CSV inputs (flights, cargo, connection rules) and a JSON event
//! list in; four outputs (plan routes, flight loads, alerts, summary) out.
//! Validation is strict and fatal: a malformed record aborts the run before
//! the pipeline starts. Timestamps are ISO 8601; naive values are read as
//! Asia/Calcutta (UTC+05:30) and all output timestamps are rendered in that
//! offset. Output row order is canonical so identical runs produce
//! byte-identical files.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Write as _};
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{
    Alert, Cargo, CargoId, CargoStatus, ConnectionRule, DisruptionEvent, Flight, FlightId,
    Priority,
};
use crate::error::{PlannerError, ValidationError};
use crate::pipeline::PlanOutcome;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 1800;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap()
}

/// Render a timestamp in the local (+05:30) offset.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&ist())
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
}

fn parse_timestamp(
    raw: &str,
    file: &str,
    line: u64,
    column: &'static str,
) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            if let Some(local) = naive.and_local_timezone(ist()).single() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }
    Err(ValidationError::Timestamp {
        file: file.to_string(),
        line,
        column,
        value: raw.to_string(),
    })
}

fn parse_bool(
    raw: &str,
    file: &str,
    line: u64,
    column: &'static str,
) -> Result<bool, ValidationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(ValidationError::Boolean {
            file: file.to_string(),
            line,
            column,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct FlightRecord {
    flight_id: String,
    origin: String,
    destination: String,
    departure: String,
    arrival: String,
    weight_capacity_kg: f64,
    volume_capacity_m3: f64,
    cost_per_kg: Decimal,
}

#[derive(Debug, Deserialize)]
struct CargoRecord {
    cargo_id: String,
    origin: String,
    destination: String,
    weight_kg: f64,
    volume_m3: f64,
    revenue_inr: Decimal,
    priority: String,
    perishable: String,
    max_transit_hours: f64,
    ready_time: String,
    due_by: String,
    handling_cost_per_kg: Decimal,
    sla_penalty_per_hour: Decimal,
}

#[derive(Debug, Deserialize)]
struct ConnectionRecord {
    origin: String,
    destination: String,
    connection_airport: String,
    min_connection_minutes: i64,
    max_connection_minutes: i64,
    handling_fee: Decimal,
}

/// Parse and validate `flights.csv` content.
pub fn read_flights<R: Read>(reader: R, source: &str) -> Result<Vec<Flight>, ValidationError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut flights = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (index, result) in csv_reader.deserialize::<FlightRecord>().enumerate() {
        let line = index as u64 + 2;
        let record = result.map_err(|source_err| ValidationError::Csv {
            file: source.to_string(),
            source: source_err,
        })?;
        if !seen.insert(record.flight_id.clone()) {
            return Err(ValidationError::Duplicate {
                entity: "flight",
                id: record.flight_id,
                file: source.to_string(),
            });
        }
        if record.weight_capacity_kg <= 0.0 {
            return Err(ValidationError::NonPositive {
                file: source.to_string(),
                line,
                column: "weight_capacity_kg",
                value: record.weight_capacity_kg,
            });
        }
        if record.volume_capacity_m3 <= 0.0 {
            return Err(ValidationError::NonPositive {
                file: source.to_string(),
                line,
                column: "volume_capacity_m3",
                value: record.volume_capacity_m3,
            });
        }
        let departure = parse_timestamp(&record.departure, source, line, "departure")?;
        let arrival = parse_timestamp(&record.arrival, source, line, "arrival")?;
        if arrival <= departure {
            return Err(ValidationError::ArrivalBeforeDeparture {
                flight_id: record.flight_id,
            });
        }
        flights.push(Flight {
            flight_id: record.flight_id,
            origin: record.origin,
            destination: record.destination,
            departure,
            arrival,
            weight_capacity_kg: record.weight_capacity_kg,
            volume_capacity_m3: record.volume_capacity_m3,
            cost_per_kg: record.cost_per_kg,
        });
    }
    Ok(flights)
}

/// Parse and validate `cargo.csv` content.
pub fn read_cargo<R: Read>(reader: R, source: &str) -> Result<Vec<Cargo>, ValidationError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut cargo = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (index, result) in csv_reader.deserialize::<CargoRecord>().enumerate() {
        let line = index as u64 + 2;
        let record = result.map_err(|source_err| ValidationError::Csv {
            file: source.to_string(),
            source: source_err,
        })?;
        if !seen.insert(record.cargo_id.clone()) {
            return Err(ValidationError::Duplicate {
                entity: "cargo",
                id: record.cargo_id,
                file: source.to_string(),
            });
        }
        if record.origin == record.destination {
            return Err(ValidationError::SameOriginDestination {
                cargo_id: record.cargo_id,
            });
        }
        if record.weight_kg <= 0.0 {
            return Err(ValidationError::NonPositive {
                file: source.to_string(),
                line,
                column: "weight_kg",
                value: record.weight_kg,
            });
        }
        if record.volume_m3 <= 0.0 {
            return Err(ValidationError::NonPositive {
                file: source.to_string(),
                line,
                column: "volume_m3",
                value: record.volume_m3,
            });
        }
        if record.max_transit_hours <= 0.0 {
            return Err(ValidationError::NonPositive {
                file: source.to_string(),
                line,
                column: "max_transit_hours",
                value: record.max_transit_hours,
            });
        }
        let priority: Priority =
            record
                .priority
                .parse()
                .map_err(|_| ValidationError::Priority {
                    file: source.to_string(),
                    line,
                    value: record.priority.clone(),
                })?;
        let perishable = parse_bool(&record.perishable, source, line, "perishable")?;
        let ready_time = parse_timestamp(&record.ready_time, source, line, "ready_time")?;
        let due_by = parse_timestamp(&record.due_by, source, line, "due_by")?;
        if due_by <= ready_time {
            return Err(ValidationError::DueBeforeReady {
                cargo_id: record.cargo_id,
            });
        }
        cargo.push(Cargo {
            cargo_id: record.cargo_id,
            origin: record.origin,
            destination: record.destination,
            weight_kg: record.weight_kg,
            volume_m3: record.volume_m3,
            revenue: record.revenue_inr,
            priority,
            perishable,
            max_transit_hours: record.max_transit_hours,
            ready_time,
            due_by,
            handling_cost_per_kg: record.handling_cost_per_kg,
            sla_penalty_per_hour: record.sla_penalty_per_hour,
        });
    }
    Ok(cargo)
}

/// Parse `connections.csv` content. An empty connection airport is the lane
/// wildcard.
pub fn read_connections<R: Read>(
    reader: R,
    source: &str,
) -> Result<Vec<ConnectionRule>, ValidationError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rules = Vec::new();
    for result in csv_reader.deserialize::<ConnectionRecord>() {
        let record = result.map_err(|source_err| ValidationError::Csv {
            file: source.to_string(),
            source: source_err,
        })?;
        let connection_airport = if record.connection_airport.is_empty() {
            None
        } else {
            Some(record.connection_airport)
        };
        rules.push(ConnectionRule {
            origin: record.origin,
            destination: record.destination,
            connection_airport,
            min_connection_minutes: record.min_connection_minutes,
            max_connection_minutes: record.max_connection_minutes,
            handling_fee: record.handling_fee,
        });
    }
    Ok(rules)
}

/// Parse a JSON disruption event list.
pub fn read_events<R: Read>(reader: R, source: &str) -> Result<Vec<DisruptionEvent>, ValidationError> {
    serde_json::from_reader(reader).map_err(|source_err| ValidationError::Events {
        file: source.to_string(),
        source: source_err,
    })
}

pub fn load_flights(path: &Path) -> Result<Vec<Flight>, PlannerError> {
    let file = File::open(path)?;
    Ok(read_flights(file, &path.display().to_string())?)
}

pub fn load_cargo(path: &Path) -> Result<Vec<Cargo>, PlannerError> {
    let file = File::open(path)?;
    Ok(read_cargo(file, &path.display().to_string())?)
}

pub fn load_connections(path: &Path) -> Result<Vec<ConnectionRule>, PlannerError> {
    let file = File::open(path)?;
    Ok(read_connections(file, &path.display().to_string())?)
}

pub fn load_events(path: &Path) -> Result<Vec<DisruptionEvent>, PlannerError> {
    let file = File::open(path)?;
    Ok(read_events(file, &path.display().to_string())?)
}

/// One row of `plan_routes.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRouteRow {
    pub cargo_id: String,
    pub status: String,
    pub reason: String,
    pub flights: String,
    pub etd: String,
    pub eta: String,
    pub total_cost: Decimal,
    pub revenue: Decimal,
    pub margin: Decimal,
    pub transit_hours: String,
    pub sla_penalty: Decimal,
    pub handling_cost: Decimal,
    pub notes: String,
}

/// One row of `flight_loads.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct FlightLoadRow {
    pub flight_id: String,
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub weight_capacity_kg: String,
    pub volume_capacity_m3: String,
    pub boarded_cargo: String,
    pub weight_used_kg: String,
    pub volume_used_m3: String,
    pub weight_utilization_pct: String,
    pub volume_utilization_pct: String,
    pub revenue: Decimal,
}

/// One row of `alerts.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRow {
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub cargo_id: String,
    pub flight_id: String,
    pub status: String,
    pub margin_delta: String,
}

/// Build `plan_routes.csv` rows, one per cargo in ascending id order.
pub fn plan_route_rows(
    outcome: &PlanOutcome,
    cargo: &BTreeMap<CargoId, Cargo>,
) -> Vec<PlanRouteRow> {
    outcome
        .assignments
        .values()
        .map(|assignment| {
            let item = &cargo[&assignment.cargo_id];
            let flights = if assignment.status == CargoStatus::Denied || assignment.legs.is_empty()
            {
                if assignment.status == CargoStatus::Denied {
                    "DENIED".to_string()
                } else {
                    String::new()
                }
            } else {
                assignment
                    .legs
                    .iter()
                    .map(|l| l.flight_id.clone())
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            let etd = assignment
                .legs
                .iter()
                .map(|l| format_timestamp(&l.departure))
                .collect::<Vec<_>>()
                .join(" ");
            let eta = assignment
                .legs
                .iter()
                .map(|l| format_timestamp(&l.arrival))
                .collect::<Vec<_>>()
                .join(" ");
            let mut notes = Vec::new();
            if item.perishable {
                notes.push("perishable".to_string());
            }
            if assignment.sla_penalty > Decimal::ZERO {
                notes.push("late arrival, SLA penalty applied".to_string());
            }
            PlanRouteRow {
                cargo_id: assignment.cargo_id.clone(),
                status: assignment.status.to_string(),
                reason: assignment.reason.clone().unwrap_or_default(),
                flights,
                etd,
                eta,
                total_cost: assignment.operating_cost
                    + assignment.handling_cost
                    + assignment.sla_penalty,
                revenue: item.revenue,
                margin: assignment.margin,
                transit_hours: format!("{:.2}", assignment.transit_hours),
                sla_penalty: assignment.sla_penalty,
                handling_cost: assignment.handling_cost,
                notes: notes.join("; "),
            }
        })
        .collect()
}

/// Build `flight_loads.csv` rows ordered by (departure, flight id).
pub fn flight_load_rows(
    outcome: &PlanOutcome,
    flights: &BTreeMap<FlightId, Flight>,
) -> Vec<FlightLoadRow> {
    let mut ordered: Vec<&Flight> = flights.values().collect();
    ordered.sort_by(|a, b| {
        a.departure
            .cmp(&b.departure)
            .then_with(|| a.flight_id.cmp(&b.flight_id))
    });
    ordered
        .iter()
        .filter_map(|flight| {
            let load = outcome.flight_loads.get(&flight.flight_id)?;
            Some(FlightLoadRow {
                flight_id: flight.flight_id.clone(),
                origin: flight.origin.clone(),
                destination: flight.destination.clone(),
                departure: format_timestamp(&flight.departure),
                arrival: format_timestamp(&flight.arrival),
                weight_capacity_kg: format!("{:.1}", flight.weight_capacity_kg),
                volume_capacity_m3: format!("{:.2}", flight.volume_capacity_m3),
                boarded_cargo: load.boarded.join(" "),
                weight_used_kg: format!("{:.1}", load.weight_used),
                volume_used_m3: format!("{:.2}", load.volume_used),
                weight_utilization_pct: format!(
                    "{:.1}",
                    load.weight_used / flight.weight_capacity_kg * 100.0
                ),
                volume_utilization_pct: format!(
                    "{:.1}",
                    load.volume_used / flight.volume_capacity_m3 * 100.0
                ),
                revenue: load.revenue,
            })
        })
        .collect()
}

/// Build `alerts.csv` rows in emission order.
pub fn alert_rows(alerts: &[Alert]) -> Vec<AlertRow> {
    alerts
        .iter()
        .map(|alert| AlertRow {
            alert_type: alert.kind.to_string(),
            severity: alert.severity.to_string(),
            message: alert.message.clone(),
            cargo_id: alert.cargo_id.clone().unwrap_or_default(),
            flight_id: alert.flight_id.clone().unwrap_or_default(),
            status: alert.status.map(|s| s.to_string()).unwrap_or_default(),
            margin_delta: alert
                .margin_delta
                .map(|d| d.to_string())
                .unwrap_or_default(),
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PlannerError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => PlannerError::Io(io),
            other => PlannerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{other:?}"),
            )),
        })?;
    for row in rows {
        writer.serialize(row).map_err(csv_to_io)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_to_io(err: csv::Error) -> PlannerError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => PlannerError::Io(io),
        other => PlannerError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{other:?}"),
        )),
    }
}

/// Write the four output files into `out_dir`. `flights` is the flight map
/// the plan was computed against (the mutated one after a disruption).
pub fn write_outputs(
    cargo: &BTreeMap<CargoId, Cargo>,
    flights: &BTreeMap<FlightId, Flight>,
    outcome: &PlanOutcome,
    alerts: &[Alert],
    out_dir: &Path,
) -> Result<(), PlannerError> {
    std::fs::create_dir_all(out_dir)?;

    write_csv(
        &out_dir.join("plan_routes.csv"),
        &plan_route_rows(outcome, cargo),
    )?;
    write_csv(
        &out_dir.join("flight_loads.csv"),
        &flight_load_rows(outcome, flights),
    )?;
    write_csv(&out_dir.join("alerts.csv"), &alert_rows(alerts))?;

    let mut summary_file = File::create(out_dir.join("plan_summary.json"))?;
    let summary = serde_json::to_string_pretty(&outcome.summary)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    summary_file.write_all(summary.as_bytes())?;
    summary_file.write_all(b"\n")?;

    info!(out_dir = %out_dir.display(), "outputs written");
    Ok(())
}

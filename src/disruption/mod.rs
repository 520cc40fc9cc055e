//! Disruption engine.
//!
//! Applies delay/cancel/swap events to a cloned flight map, re-runs the
//! whole pipeline on the mutated world (fresh seed derived from the
//! baseline's) and diffs the new best plan against the baseline. An empty
//! event list short-circuits to the baseline so a null disruption is exactly
//! the identity. The engine never fails: a degraded world still yields a
//! complete plan plus alerts.

use std::collections::BTreeMap;

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::MarginThreshold;
use crate::domain::{
    Alert, AlertKind, CargoStatus, DisruptionEvent, Flight, FlightId, Severity,
};
use crate::ga::CancelFlag;
use crate::pipeline::{PlanOutcome, Planner};

/// XORed into the baseline seed for the re-optimization run.
pub const DISRUPTION_SEED_SALT: u64 = 0xD15C_0DE5;

/// Re-optimized plan plus the alerts describing what changed. Carries the
/// mutated flight map so callers can render the post-event schedule.
#[derive(Debug, Clone)]
pub struct DisruptionOutcome {
    pub plan: PlanOutcome,
    pub flights: BTreeMap<FlightId, Flight>,
    pub disruption_alerts: Vec<Alert>,
}

impl DisruptionOutcome {
    /// Plan-level alerts followed by the disruption diff.
    pub fn combined_alerts(&self) -> Vec<Alert> {
        let mut alerts = self.plan.alerts.clone();
        alerts.extend(self.disruption_alerts.clone());
        alerts
    }
}

/// Apply events in input order to a copy of the flight map. Each applied
/// event yields one info alert; an event naming an unknown flight is skipped
/// with a warning.
pub fn apply_events(
    flights: &BTreeMap<FlightId, Flight>,
    events: &[DisruptionEvent],
) -> (BTreeMap<FlightId, Flight>, Vec<Alert>) {
    let mut mutated = flights.clone();
    let mut alerts = Vec::with_capacity(events.len());

    for event in events {
        let flight_id = event.flight_id().to_string();
        if !mutated.contains_key(&flight_id) {
            warn!(flight_id = %flight_id, "disruption event targets unknown flight");
            alerts.push(
                Alert::new(
                    AlertKind::DisruptionApplied,
                    Severity::Warning,
                    format!("event targets unknown flight {flight_id}, skipped"),
                )
                .with_flight(flight_id),
            );
            continue;
        }
        match event {
            DisruptionEvent::Delay {
                flight_id,
                delay_minutes,
            } => {
                if let Some(flight) = mutated.get_mut(flight_id) {
                    let shift = Duration::minutes(*delay_minutes);
                    flight.departure = flight.departure + shift;
                    flight.arrival = flight.arrival + shift;
                }
            }
            DisruptionEvent::Cancel { flight_id } => {
                mutated.remove(flight_id);
            }
            DisruptionEvent::Swap {
                flight_id,
                new_weight_capacity_kg,
                new_volume_capacity_m3,
            } => {
                if let Some(flight) = mutated.get_mut(flight_id) {
                    if let Some(weight) = new_weight_capacity_kg {
                        flight.weight_capacity_kg = *weight;
                    }
                    if let Some(volume) = new_volume_capacity_m3 {
                        flight.volume_capacity_m3 = *volume;
                    }
                }
            }
        }
        alerts.push(
            Alert::new(
                AlertKind::DisruptionApplied,
                Severity::Info,
                format!("applied disruption: {event}"),
            )
            .with_flight(event.flight_id().to_string()),
        );
    }

    (mutated, alerts)
}

/// Run the what-if analysis: mutate the world, re-optimize, diff.
pub fn run(
    planner: &Planner,
    baseline: &PlanOutcome,
    events: &[DisruptionEvent],
) -> DisruptionOutcome {
    if events.is_empty() {
        return DisruptionOutcome {
            plan: baseline.clone(),
            flights: planner.graph().flight_map().clone(),
            disruption_alerts: Vec::new(),
        };
    }

    let (mutated, mut alerts) = apply_events(planner.graph().flight_map(), events);
    info!(
        events = events.len(),
        flights = mutated.len(),
        "re-optimizing after disruption"
    );

    let replanner = Planner::with_flight_map(
        mutated,
        planner.cargo().clone(),
        planner.rules().clone(),
        planner.config().clone(),
    );
    let plan = replanner.plan_with_seed(baseline.seed ^ DISRUPTION_SEED_SALT, &CancelFlag::new());

    alerts.extend(diff(
        baseline,
        &plan,
        &planner.config().disruption_margin_threshold,
    ));

    DisruptionOutcome {
        plan,
        flights: replanner.graph().flight_map().clone(),
        disruption_alerts: alerts,
    }
}

fn status_change_severity(old: CargoStatus, new: CargoStatus) -> Severity {
    match (old, new) {
        (_, CargoStatus::Delivered) => Severity::Info,
        (CargoStatus::Delivered, CargoStatus::Denied) => Severity::Critical,
        (CargoStatus::Delivered, CargoStatus::Rolled) => Severity::Warning,
        _ => Severity::Warning,
    }
}

/// Structural diff between the baseline and the re-optimized plan.
fn diff(baseline: &PlanOutcome, new: &PlanOutcome, threshold: &MarginThreshold) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for (cargo_id, old_assignment) in &baseline.assignments {
        let Some(new_assignment) = new.assignments.get(cargo_id) else {
            alerts.push(
                Alert::new(
                    AlertKind::CargoMissing,
                    Severity::Critical,
                    format!("cargo {cargo_id} present in baseline is missing downstream"),
                )
                .with_cargo(cargo_id.clone()),
            );
            continue;
        };

        if new_assignment.status != old_assignment.status {
            alerts.push(
                Alert::new(
                    AlertKind::StatusChange,
                    status_change_severity(old_assignment.status, new_assignment.status),
                    format!(
                        "cargo {cargo_id} status changed from {} to {}",
                        old_assignment.status, new_assignment.status
                    ),
                )
                .with_cargo(cargo_id.clone())
                .with_status(new_assignment.status),
            );
        } else if new_assignment.status == CargoStatus::Delivered {
            let old_legs: Vec<&str> = old_assignment
                .legs
                .iter()
                .map(|l| l.flight_id.as_str())
                .collect();
            let new_legs: Vec<&str> = new_assignment
                .legs
                .iter()
                .map(|l| l.flight_id.as_str())
                .collect();
            if old_legs != new_legs {
                alerts.push(
                    Alert::new(
                        AlertKind::Reroute,
                        Severity::Info,
                        format!(
                            "cargo {cargo_id} rerouted from [{}] to [{}]",
                            old_legs.join(" "),
                            new_legs.join(" ")
                        ),
                    )
                    .with_cargo(cargo_id.clone())
                    .with_status(new_assignment.status),
                );
            }
        }

        let delta = new_assignment.margin - old_assignment.margin;
        let relative_threshold = old_assignment.margin.abs()
            * Decimal::from_f64_retain(threshold.relative).unwrap_or_default();
        let effective = threshold.absolute.max(relative_threshold);
        if delta.abs() > effective {
            let severity = if delta < Decimal::ZERO {
                Severity::Warning
            } else {
                Severity::Info
            };
            alerts.push(
                Alert::new(
                    AlertKind::MarginChange,
                    severity,
                    format!("cargo {cargo_id} margin moved by {delta}"),
                )
                .with_cargo(cargo_id.clone())
                .with_margin_delta(delta),
            );
        }
    }

    alerts
}

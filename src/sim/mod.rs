//! Plan simulation.
//!
//! Given one route choice per cargo, walk every flight in (departure, id)
//! order and run the knapsack selector over the cargo waiting for that
//! flight. A cargo bumped on any leg is rolled for the whole plan; its later
//! legs are simply never boarded, which leaves that capacity to others. The
//! simulator never re-optimizes downstream of a bump.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{Alert, AlertKind, CargoId, CargoStatus, FlightId, Severity};
use crate::knapsack::{self, Candidate};
use crate::pipeline::PlanContext;
use crate::routes::RouteLeg;

/// Final outcome for one cargo.
#[derive(Debug, Clone, Serialize)]
pub struct CargoAssignment {
    pub cargo_id: CargoId,
    pub status: CargoStatus,
    pub route_index: usize,
    pub legs: Vec<RouteLeg>,
    pub margin: Decimal,
    pub operating_cost: Decimal,
    pub handling_cost: Decimal,
    pub sla_penalty: Decimal,
    pub transit_hours: f64,
    pub reason: Option<String>,
}

/// What one flight ended up carrying.
#[derive(Debug, Clone, Serialize)]
pub struct FlightLoad {
    pub flight_id: FlightId,
    pub boarded: Vec<CargoId>,
    pub weight_used: f64,
    pub volume_used: f64,
    pub revenue: Decimal,
}

/// Full result of simulating one individual.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub assignments: BTreeMap<CargoId, CargoAssignment>,
    pub flight_loads: BTreeMap<FlightId, FlightLoad>,
    pub alerts: Vec<Alert>,
    pub total_margin: Decimal,
    pub total_legs: usize,
}

#[derive(Default, Clone)]
struct Progress {
    next_leg: usize,
    bumped_on: Option<FlightId>,
}

/// Simulate the plan encoded by `genes` (one route index per cargo in
/// catalog order).
pub fn simulate(ctx: &PlanContext<'_>, genes: &[usize]) -> Simulation {
    let order = ctx.catalog.cargo_order();
    debug_assert_eq!(order.len(), genes.len());

    let gene_of: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut progress = vec![Progress::default(); order.len()];

    let mut flight_loads: BTreeMap<FlightId, FlightLoad> = ctx
        .graph
        .flights()
        .map(|f| {
            (
                f.flight_id.clone(),
                FlightLoad {
                    flight_id: f.flight_id.clone(),
                    boarded: Vec::new(),
                    weight_used: 0.0,
                    volume_used: 0.0,
                    revenue: Decimal::ZERO,
                },
            )
        })
        .collect();
    let mut alerts = Vec::new();

    for flight in ctx.graph.flights_by_departure() {
        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        for (gene, cargo_id) in order.iter().enumerate() {
            if progress[gene].bumped_on.is_some() {
                continue;
            }
            let option = ctx.catalog.option(gene, genes[gene]);
            if option.is_denied() || progress[gene].next_leg >= option.legs.len() {
                continue;
            }
            let leg = &option.legs[progress[gene].next_leg];
            if leg.flight_id == flight.flight_id {
                candidates.push(Candidate {
                    cargo: &ctx.cargo[cargo_id],
                    dwell_hours: leg.dwell_minutes as f64 / 60.0,
                });
            }
        }
        if candidates.is_empty() {
            continue;
        }

        let selection = knapsack::select(flight, &candidates, &ctx.config.knapsack_weights);
        for cargo_id in &selection.boarded {
            progress[gene_of[cargo_id.as_str()]].next_leg += 1;
        }
        for cargo_id in &selection.rejected {
            progress[gene_of[cargo_id.as_str()]].bumped_on = Some(flight.flight_id.clone());
        }

        let revenue = selection
            .boarded
            .iter()
            .map(|id| ctx.cargo[id].revenue)
            .sum::<Decimal>();
        if let Some(load) = flight_loads.get_mut(&flight.flight_id) {
            load.boarded = selection.boarded.clone();
            load.weight_used = selection.weight_used;
            load.volume_used = selection.volume_used;
            load.revenue = revenue;
        }
        alerts.extend(selection.alerts);
    }

    let mut assignments = BTreeMap::new();
    let mut total_margin = Decimal::ZERO;
    let mut total_legs = 0usize;

    for (gene, cargo_id) in order.iter().enumerate() {
        let cargo = &ctx.cargo[cargo_id];
        let option = ctx.catalog.option(gene, genes[gene]);
        total_legs += option.legs.len();
        let denial_margin = -cargo.revenue * ctx.config.denial_factor;

        let assignment = if option.is_denied() {
            alerts.push(
                Alert::new(
                    AlertKind::BaselineException,
                    Severity::Warning,
                    format!("no feasible itinerary for cargo {cargo_id}"),
                )
                .with_cargo(cargo_id.clone())
                .with_status(CargoStatus::Denied),
            );
            CargoAssignment {
                cargo_id: cargo_id.clone(),
                status: CargoStatus::Denied,
                route_index: genes[gene],
                legs: Vec::new(),
                margin: option.margin,
                operating_cost: Decimal::ZERO,
                handling_cost: Decimal::ZERO,
                sla_penalty: Decimal::ZERO,
                transit_hours: 0.0,
                reason: Some("no feasible itinerary".into()),
            }
        } else if let Some(flight_id) = &progress[gene].bumped_on {
            CargoAssignment {
                cargo_id: cargo_id.clone(),
                status: CargoStatus::Rolled,
                route_index: genes[gene],
                legs: Vec::new(),
                margin: denial_margin,
                operating_cost: Decimal::ZERO,
                handling_cost: Decimal::ZERO,
                sla_penalty: Decimal::ZERO,
                transit_hours: 0.0,
                reason: Some(format!("lost capacity contention on flight {flight_id}")),
            }
        } else if progress[gene].next_leg == option.legs.len() {
            CargoAssignment {
                cargo_id: cargo_id.clone(),
                status: CargoStatus::Delivered,
                route_index: genes[gene],
                legs: option.legs.clone(),
                margin: option.margin,
                operating_cost: option.operating_cost,
                handling_cost: option.handling_cost,
                sla_penalty: option.sla_penalty,
                transit_hours: option.transit_hours,
                reason: None,
            }
        } else {
            // A leg's flight vanished mid-plan; only reachable if the
            // catalog and flight map disagree.
            CargoAssignment {
                cargo_id: cargo_id.clone(),
                status: CargoStatus::Rolled,
                route_index: genes[gene],
                legs: Vec::new(),
                margin: denial_margin,
                operating_cost: Decimal::ZERO,
                handling_cost: Decimal::ZERO,
                sla_penalty: Decimal::ZERO,
                transit_hours: 0.0,
                reason: Some("itinerary interrupted".into()),
            }
        };

        if cargo.priority.is_guaranteed() && assignment.status != CargoStatus::Delivered {
            alerts.push(
                Alert::new(
                    AlertKind::PriorityGuaranteeViolation,
                    Severity::Critical,
                    format!(
                        "{} priority cargo {} not delivered: {}",
                        cargo.priority,
                        cargo_id,
                        assignment.reason.as_deref().unwrap_or("unknown")
                    ),
                )
                .with_cargo(cargo_id.clone())
                .with_status(assignment.status),
            );
        }

        total_margin += assignment.margin;
        assignments.insert(cargo_id.clone(), assignment);
    }

    Simulation {
        assignments,
        flight_loads,
        alerts,
        total_margin,
        total_legs,
    }
}

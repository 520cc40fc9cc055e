//! Route enumeration and scoring.
//!
//! For each cargo the enumerator walks the temporal flight graph depth-first
//! and emits every feasible itinerary of up to `max_legs` legs: the first leg
//! departs at or after the cargo's ready time, every connection falls inside
//! the applicable connection window, the elapsed time never exceeds the
//! cargo's transit cap, and no airport repeats. The strict pass additionally
//! requires on-time arrival; when it comes up empty for guaranteed cargo a
//! relaxed pass contributes the single shortest late itinerary. A cargo with
//! no itinerary at all gets the distinguished DENIED option, so the result
//! is never empty.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::config::PlannerConfig;
use crate::domain::{Cargo, CargoId, Flight, RuleIndex};
use crate::graph::FlightGraph;

/// One flight within a materialized itinerary. `dwell_minutes` is the ground
/// time before this leg (zero for the first).
#[derive(Debug, Clone, Serialize)]
pub struct RouteLeg {
    pub flight_id: String,
    pub origin: String,
    pub destination: String,
    pub departure: chrono::DateTime<chrono::Utc>,
    pub arrival: chrono::DateTime<chrono::Utc>,
    pub dwell_minutes: i64,
}

/// A scored itinerary for one cargo. Empty legs mark the DENIED option.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOption {
    pub legs: Vec<RouteLeg>,
    pub transit_hours: f64,
    pub lateness_hours: f64,
    pub operating_cost: Decimal,
    pub handling_cost: Decimal,
    pub sla_penalty: Decimal,
    pub margin: Decimal,
    pub on_time: bool,
}

impl RouteOption {
    /// The distinguished no-itinerary option: goodwill loss, nothing moves.
    pub fn denied(cargo: &Cargo, denial_factor: Decimal) -> Self {
        RouteOption {
            legs: Vec::new(),
            transit_hours: 0.0,
            lateness_hours: 0.0,
            operating_cost: Decimal::ZERO,
            handling_cost: Decimal::ZERO,
            sla_penalty: Decimal::ZERO,
            margin: -cargo.revenue * denial_factor,
            on_time: false,
        }
    }

    pub fn is_denied(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn flight_ids(&self) -> Vec<&str> {
        self.legs.iter().map(|l| l.flight_id.as_str()).collect()
    }

    fn direct_cost(&self) -> Decimal {
        self.operating_cost + self.handling_cost
    }
}

/// Score a concrete flight sequence for a cargo.
///
/// - operating cost: per-kg flight cost times cargo weight, summed over legs
/// - handling cost: connection fees plus per-kg handling
/// - SLA penalty: hours past `due_by` times the cargo's hourly rate
pub fn build_route_option(cargo: &Cargo, flights: &[&Flight], rules: &RuleIndex) -> RouteOption {
    let weight = Decimal::from_f64_retain(cargo.weight_kg).unwrap_or_default();

    let mut legs = Vec::with_capacity(flights.len());
    let mut operating_cost = Decimal::ZERO;
    let mut connection_fees = Decimal::ZERO;
    for (i, flight) in flights.iter().enumerate() {
        let dwell_minutes = if i == 0 {
            0
        } else {
            let prev = flights[i - 1];
            let window = rules.window(&cargo.origin, &cargo.destination, &flight.origin);
            connection_fees += window.fee;
            (flight.departure - prev.arrival).num_minutes()
        };
        operating_cost += flight.cost_per_kg * weight;
        legs.push(RouteLeg {
            flight_id: flight.flight_id.clone(),
            origin: flight.origin.clone(),
            destination: flight.destination.clone(),
            departure: flight.departure,
            arrival: flight.arrival,
            dwell_minutes,
        });
    }

    let first_departure = flights[0].departure;
    let last_arrival = flights[flights.len() - 1].arrival;
    let transit_secs = (last_arrival - first_departure).num_seconds();
    let lateness_secs = (last_arrival - cargo.due_by).num_seconds().max(0);

    let handling_cost = connection_fees + cargo.handling_cost_per_kg * weight;
    let sla_penalty =
        Decimal::from(lateness_secs) / Decimal::from(3600) * cargo.sla_penalty_per_hour;
    let margin = cargo.revenue - (operating_cost + handling_cost + sla_penalty);

    RouteOption {
        legs,
        transit_hours: transit_secs as f64 / 3600.0,
        lateness_hours: lateness_secs as f64 / 3600.0,
        operating_cost,
        handling_cost,
        sla_penalty,
        margin,
        on_time: lateness_secs == 0,
    }
}

/// Enumerate all feasible itineraries for `cargo`, most attractive first.
pub fn enumerate_routes(
    cargo: &Cargo,
    graph: &FlightGraph,
    rules: &RuleIndex,
    config: &PlannerConfig,
) -> Vec<RouteOption> {
    let strict = search(cargo, graph, rules, config.max_legs, true);
    let mut options: Vec<RouteOption> = strict
        .iter()
        .map(|legs| build_route_option(cargo, legs, rules))
        .collect();

    if options.is_empty() && cargo.priority.is_guaranteed() {
        // No on-time itinerary: keep the shortest late one so guaranteed
        // cargo can still move and eat the SLA penalty.
        let relaxed = search(cargo, graph, rules, config.max_legs, false);
        let best_late = relaxed
            .iter()
            .map(|legs| build_route_option(cargo, legs, rules))
            .min_by(|a, b| {
                a.transit_hours
                    .partial_cmp(&b.transit_hours)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.direct_cost().cmp(&b.direct_cost()))
                    .then_with(|| a.flight_ids().cmp(&b.flight_ids()))
            });
        if let Some(option) = best_late {
            debug!(
                cargo_id = %cargo.cargo_id,
                lateness_hours = option.lateness_hours,
                "no on-time itinerary, keeping relaxed option"
            );
            options.push(option);
        }
    }

    options.sort_by(|a, b| {
        b.on_time
            .cmp(&a.on_time)
            .then_with(|| a.direct_cost().cmp(&b.direct_cost()))
            .then_with(|| a.flight_ids().cmp(&b.flight_ids()))
    });

    if options.is_empty() {
        options.push(RouteOption::denied(cargo, config.denial_factor));
    }
    options
}

fn search<'a>(
    cargo: &Cargo,
    graph: &'a FlightGraph,
    rules: &RuleIndex,
    max_legs: usize,
    enforce_due_by: bool,
) -> Vec<Vec<&'a Flight>> {
    let mut found = Vec::new();
    let mut legs: Vec<&Flight> = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(cargo.origin.clone());
    extend_search(
        cargo,
        graph,
        rules,
        max_legs,
        enforce_due_by,
        &cargo.origin,
        &mut legs,
        &mut visited,
        &mut found,
    );
    found
}

#[allow(clippy::too_many_arguments)]
fn extend_search<'a>(
    cargo: &Cargo,
    graph: &'a FlightGraph,
    rules: &RuleIndex,
    max_legs: usize,
    enforce_due_by: bool,
    airport: &str,
    legs: &mut Vec<&'a Flight>,
    visited: &mut HashSet<String>,
    found: &mut Vec<Vec<&'a Flight>>,
) {
    for flight in graph.departures_from(airport) {
        if visited.contains(&flight.destination) {
            continue;
        }
        match legs.last() {
            None => {
                if flight.departure < cargo.ready_time {
                    continue;
                }
            }
            Some(prev) => {
                let dwell_secs = (flight.departure - prev.arrival).num_seconds();
                let window = rules.window(&cargo.origin, &cargo.destination, &flight.origin);
                if dwell_secs < window.min_minutes * 60 || dwell_secs > window.max_minutes * 60 {
                    continue;
                }
            }
        }
        let first_departure = legs.first().map(|l| l.departure).unwrap_or(flight.departure);
        let elapsed_hours = (flight.arrival - first_departure).num_seconds() as f64 / 3600.0;
        if elapsed_hours > cargo.max_transit_hours {
            continue;
        }
        if enforce_due_by && flight.arrival > cargo.due_by {
            continue;
        }

        legs.push(flight);
        if flight.destination == cargo.destination {
            found.push(legs.clone());
        } else if legs.len() < max_legs {
            visited.insert(flight.destination.clone());
            extend_search(
                cargo,
                graph,
                rules,
                max_legs,
                enforce_due_by,
                &flight.destination.clone(),
                legs,
                visited,
                found,
            );
            visited.remove(&flight.destination);
        }
        legs.pop();
    }
}

/// Per-run arena of route options, one slice per cargo in canonical
/// (ascending id) order. GA genes index into these slices.
pub struct RouteCatalog {
    cargo_order: Vec<CargoId>,
    options: Vec<Vec<RouteOption>>,
}

impl RouteCatalog {
    pub fn build(
        cargo: &BTreeMap<CargoId, Cargo>,
        graph: &FlightGraph,
        rules: &RuleIndex,
        config: &PlannerConfig,
    ) -> Self {
        let mut cargo_order = Vec::with_capacity(cargo.len());
        let mut options = Vec::with_capacity(cargo.len());
        for (id, item) in cargo {
            let routes = enumerate_routes(item, graph, rules, config);
            debug!(cargo_id = %id, options = routes.len(), "route catalog entry");
            cargo_order.push(id.clone());
            options.push(routes);
        }
        RouteCatalog {
            cargo_order,
            options,
        }
    }

    /// Cargo ids in canonical order; gene `i` belongs to `cargo_order()[i]`.
    pub fn cargo_order(&self) -> &[CargoId] {
        &self.cargo_order
    }

    pub fn len(&self) -> usize {
        self.cargo_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cargo_order.is_empty()
    }

    pub fn options_for(&self, gene: usize) -> &[RouteOption] {
        &self.options[gene]
    }

    pub fn option(&self, gene: usize, route: usize) -> &RouteOption {
        &self.options[gene][route]
    }
}

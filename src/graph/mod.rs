//! Temporal flight network.
//!
//! In-memory graph of airports connected by scheduled flights. The network
//! is a DAG under departure-time ordering; it is built once per run and
//! shared read-only. Iteration order is canonical everywhere: flights by id,
//! departures by (departure time, flight id).

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::domain::{Flight, FlightId};

/// The flight graph: airports as nodes, flights as edges.
pub struct FlightGraph {
    graph: DiGraph<String, FlightId>,
    airport_index: HashMap<String, NodeIndex>,
    flights: BTreeMap<FlightId, Flight>,
}

impl FlightGraph {
    /// Build the graph from an id-keyed flight map.
    pub fn from_flights(flights: BTreeMap<FlightId, Flight>) -> Self {
        let mut graph = FlightGraph {
            graph: DiGraph::new(),
            airport_index: HashMap::new(),
            flights: BTreeMap::new(),
        };
        for (id, flight) in flights {
            let from = graph.add_airport(&flight.origin);
            let to = graph.add_airport(&flight.destination);
            graph.graph.add_edge(from, to, id.clone());
            graph.flights.insert(id, flight);
        }
        graph
    }

    fn add_airport(&mut self, code: &str) -> NodeIndex {
        if let Some(&idx) = self.airport_index.get(code) {
            return idx;
        }
        let idx = self.graph.add_node(code.to_string());
        self.airport_index.insert(code.to_string(), idx);
        idx
    }

    pub fn flight(&self, id: &str) -> Option<&Flight> {
        self.flights.get(id)
    }

    /// All flights in ascending id order.
    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    /// The underlying id-keyed flight map.
    pub fn flight_map(&self) -> &BTreeMap<FlightId, Flight> {
        &self.flights
    }

    /// Flights departing `airport`, sorted by (departure, id).
    pub fn departures_from(&self, airport: &str) -> Vec<&Flight> {
        let Some(&idx) = self.airport_index.get(airport) else {
            return vec![];
        };
        let mut departures: Vec<&Flight> = self
            .graph
            .edges(idx)
            .filter_map(|edge| self.flights.get(edge.weight()))
            .collect();
        departures.sort_by(|a, b| {
            a.departure
                .cmp(&b.departure)
                .then_with(|| a.flight_id.cmp(&b.flight_id))
        });
        departures
    }

    /// All flights sorted by (departure, id), the simulation order.
    pub fn flights_by_departure(&self) -> Vec<&Flight> {
        let mut all: Vec<&Flight> = self.flights.values().collect();
        all.sort_by(|a, b| {
            a.departure
                .cmp(&b.departure)
                .then_with(|| a.flight_id.cmp(&b.flight_id))
        });
        all
    }

    pub fn airport_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn flight_count(&self) -> usize {
        self.flights.len()
    }
}

//! Core domain entities: flights, cargo, connection rules, alerts and
//! disruption events.
//!
//! Flights and cargo are immutable once loaded; the disruption engine never
//! mutates in place, it derives a new flight map. All money is `Decimal`,
//! all timestamps are UTC internally.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type FlightId = String;
pub type CargoId = String;

/// Connection window applied when no rule matches.
pub const DEFAULT_MIN_CONNECTION_MINUTES: i64 = 60;
pub const DEFAULT_MAX_CONNECTION_MINUTES: i64 = 720;

/// A scheduled flight with fixed capacity and per-kg operating cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub flight_id: FlightId,
    pub origin: String,
    pub destination: String,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub weight_capacity_kg: f64,
    pub volume_capacity_m3: f64,
    pub cost_per_kg: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank: high before medium before low.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Weight used by the knapsack subset score.
    pub fn weight(self) -> f64 {
        match self {
            Priority::High => 3.0,
            Priority::Medium => 2.0,
            Priority::Low => 1.0,
        }
    }

    pub fn is_guaranteed(self) -> bool {
        matches!(self, Priority::High | Priority::Medium)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(()),
        }
    }
}

/// A shipment to be planned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cargo {
    pub cargo_id: CargoId,
    pub origin: String,
    pub destination: String,
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub revenue: Decimal,
    pub priority: Priority,
    pub perishable: bool,
    pub max_transit_hours: f64,
    pub ready_time: DateTime<Utc>,
    pub due_by: DateTime<Utc>,
    pub handling_cost_per_kg: Decimal,
    pub sla_penalty_per_hour: Decimal,
}

impl Cargo {
    /// Revenue per kg, guarded against degenerate weights.
    pub fn revenue_density(&self) -> f64 {
        let revenue = self.revenue.to_f64().unwrap_or(0.0);
        revenue / self.weight_kg.max(f64::EPSILON)
    }
}

/// Connection constraints for an (origin, destination) lane, optionally
/// refined to one connection airport. A rule without a connection airport is
/// the wildcard fallback for the lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRule {
    pub origin: String,
    pub destination: String,
    pub connection_airport: Option<String>,
    pub min_connection_minutes: i64,
    pub max_connection_minutes: i64,
    pub handling_fee: Decimal,
}

/// Resolved connection window for one transfer.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionWindow {
    pub min_minutes: i64,
    pub max_minutes: i64,
    pub fee: Decimal,
}

impl Default for ConnectionWindow {
    fn default() -> Self {
        ConnectionWindow {
            min_minutes: DEFAULT_MIN_CONNECTION_MINUTES,
            max_minutes: DEFAULT_MAX_CONNECTION_MINUTES,
            fee: Decimal::ZERO,
        }
    }
}

/// Lookup index over connection rules: exact (origin, destination,
/// connection airport) first, then the lane wildcard, then defaults.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    rules: HashMap<(String, String, Option<String>), ConnectionRule>,
}

impl RuleIndex {
    pub fn from_rules(rules: Vec<ConnectionRule>) -> Self {
        let mut index = HashMap::new();
        for rule in rules {
            let key = (
                rule.origin.clone(),
                rule.destination.clone(),
                rule.connection_airport.clone(),
            );
            index.insert(key, rule);
        }
        RuleIndex { rules: index }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Window for connecting at `via` on the (origin, destination) lane.
    pub fn window(&self, origin: &str, destination: &str, via: &str) -> ConnectionWindow {
        let exact = (
            origin.to_string(),
            destination.to_string(),
            Some(via.to_string()),
        );
        let wildcard = (origin.to_string(), destination.to_string(), None);
        self.rules
            .get(&exact)
            .or_else(|| self.rules.get(&wildcard))
            .map(|rule| ConnectionWindow {
                min_minutes: rule.min_connection_minutes,
                max_minutes: rule.max_connection_minutes,
                fee: rule.handling_fee,
            })
            .unwrap_or_default()
    }
}

/// Final per-cargo outcome of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CargoStatus {
    Delivered,
    Rolled,
    Denied,
}

impl fmt::Display for CargoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CargoStatus::Delivered => write!(f, "delivered"),
            CargoStatus::Rolled => write!(f, "rolled"),
            CargoStatus::Denied => write!(f, "denied"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    StatusChange,
    Reroute,
    MarginChange,
    CargoMissing,
    BaselineException,
    DisruptionApplied,
    CapacityBreach,
    PriorityGuaranteeViolation,
    PartialOptimization,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertKind::StatusChange => "status_change",
            AlertKind::Reroute => "reroute",
            AlertKind::MarginChange => "margin_change",
            AlertKind::CargoMissing => "cargo_missing",
            AlertKind::BaselineException => "baseline_exception",
            AlertKind::DisruptionApplied => "disruption_applied",
            AlertKind::CapacityBreach => "capacity_breach",
            AlertKind::PriorityGuaranteeViolation => "priority_guarantee_violation",
            AlertKind::PartialOptimization => "partial_optimization",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// An operational condition surfaced alongside a plan. Alerts are the only
/// channel for optimization-level problems; they never abort the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub cargo_id: Option<CargoId>,
    pub flight_id: Option<FlightId>,
    pub status: Option<CargoStatus>,
    pub margin_delta: Option<Decimal>,
}

impl Alert {
    pub fn new(kind: AlertKind, severity: Severity, message: impl Into<String>) -> Self {
        Alert {
            kind,
            severity,
            message: message.into(),
            cargo_id: None,
            flight_id: None,
            status: None,
            margin_delta: None,
        }
    }

    pub fn with_cargo(mut self, cargo_id: impl Into<CargoId>) -> Self {
        self.cargo_id = Some(cargo_id.into());
        self
    }

    pub fn with_flight(mut self, flight_id: impl Into<FlightId>) -> Self {
        self.flight_id = Some(flight_id.into());
        self
    }

    pub fn with_status(mut self, status: CargoStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_margin_delta(mut self, delta: Decimal) -> Self {
        self.margin_delta = Some(delta);
        self
    }
}

/// A mutation of the flight set for what-if analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "lowercase")]
pub enum DisruptionEvent {
    Delay {
        flight_id: FlightId,
        delay_minutes: i64,
    },
    Cancel {
        flight_id: FlightId,
    },
    Swap {
        flight_id: FlightId,
        #[serde(default)]
        new_weight_capacity_kg: Option<f64>,
        #[serde(default)]
        new_volume_capacity_m3: Option<f64>,
    },
}

impl DisruptionEvent {
    pub fn flight_id(&self) -> &str {
        match self {
            DisruptionEvent::Delay { flight_id, .. }
            | DisruptionEvent::Cancel { flight_id }
            | DisruptionEvent::Swap { flight_id, .. } => flight_id,
        }
    }
}

impl fmt::Display for DisruptionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisruptionEvent::Delay {
                flight_id,
                delay_minutes,
            } => write!(f, "delay {flight_id} by {delay_minutes}min"),
            DisruptionEvent::Cancel { flight_id } => write!(f, "cancel {flight_id}"),
            DisruptionEvent::Swap { flight_id, .. } => write!(f, "swap capacity of {flight_id}"),
        }
    }
}

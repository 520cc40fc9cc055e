//! Planner configuration.
//!
//! Defaults match the tuning in the component design; an optional TOML file
//! and `PLANNER_*` environment variables are layered on top. Everything not
//! listed here (tournament size, elitism, connection-window defaults, the
//! early-stop patience) is fixed behavior and deliberately not configurable.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// Weights of the low-priority subset score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KnapsackWeights {
    /// w1: sum of revenue densities.
    pub density: f64,
    /// w2: sum of priority weights.
    pub priority: f64,
    /// w3: band utilization score.
    pub utilization: f64,
    /// w4: sum of dwell hours (subtracted).
    pub dwell: f64,
}

impl Default for KnapsackWeights {
    fn default() -> Self {
        KnapsackWeights {
            density: 1.0,
            priority: 0.5,
            utilization: 0.3,
            dwell: 0.05,
        }
    }
}

/// Threshold for margin-change alerts: the larger of the absolute amount and
/// the relative fraction of the baseline margin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginThreshold {
    pub absolute: Decimal,
    pub relative: f64,
}

impl Default for MarginThreshold {
    fn default() -> Self {
        MarginThreshold {
            absolute: Decimal::from(5000),
            relative: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub population_size: usize,
    pub generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub seed: u64,
    pub max_legs: usize,
    pub denial_factor: Decimal,
    pub knapsack_weights: KnapsackWeights,
    pub disruption_margin_threshold: MarginThreshold,
    /// Wall-clock budget for the GA; `None` means unbounded.
    pub optimization_budget_ms: Option<u64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            population_size: 80,
            generations: 120,
            crossover_rate: 0.8,
            mutation_rate: 0.15,
            seed: 42,
            max_legs: 4,
            denial_factor: Decimal::new(25, 2),
            knapsack_weights: KnapsackWeights::default(),
            disruption_margin_threshold: MarginThreshold::default(),
            optimization_budget_ms: None,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from an optional TOML file plus `PLANNER_*`
    /// environment variables (nested keys separated by `__`).
    pub fn load(path: Option<&Path>) -> Result<Self, PlannerError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("PLANNER").separator("__"),
        );
        let merged = builder.build()?;
        Ok(merged.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_design() {
        let cfg = PlannerConfig::default();
        assert_eq!(cfg.population_size, 80);
        assert_eq!(cfg.generations, 120);
        assert_eq!(cfg.crossover_rate, 0.8);
        assert_eq!(cfg.mutation_rate, 0.15);
        assert_eq!(cfg.max_legs, 4);
        assert_eq!(cfg.denial_factor, Decimal::new(25, 2));
        assert_eq!(cfg.knapsack_weights.density, 1.0);
        assert_eq!(cfg.disruption_margin_threshold.absolute, Decimal::from(5000));
        assert!(cfg.optimization_budget_ms.is_none());
    }

    #[test]
    fn load_without_file_yields_defaults() {
        let cfg = PlannerConfig::load(None).unwrap();
        assert_eq!(cfg.population_size, 80);
        assert_eq!(cfg.seed, 42);
    }
}

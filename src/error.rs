//! Error taxonomy.
//!
//! Validation failures abort the pipeline and surface to the caller; every
//! optimization-level condition (infeasible routes, capacity breaches,
//! guarantee violations, timeouts) is reported as an [`Alert`] instead and
//! never raised as an error.
//!
//! [`Alert`]: crate::domain::Alert

use thiserror::Error;

/// Malformed or inconsistent input data. Fatal: the pipeline does not start.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
    #[error("{file}: {source}")]
    Events {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{file} line {line}: cannot parse timestamp '{value}' in column {column}")]
    Timestamp {
        file: String,
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("{file} line {line}: cannot parse boolean '{value}' in column {column}")]
    Boolean {
        file: String,
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("{file} line {line}: unknown priority '{value}'")]
    Priority {
        file: String,
        line: u64,
        value: String,
    },
    #[error("{file} line {line}: column {column} must be positive (got {value})")]
    NonPositive {
        file: String,
        line: u64,
        column: &'static str,
        value: f64,
    },
    #[error("flight {flight_id}: arrival must be after departure")]
    ArrivalBeforeDeparture { flight_id: String },
    #[error("cargo {cargo_id}: due_by must be after ready_time")]
    DueBeforeReady { cargo_id: String },
    #[error("cargo {cargo_id}: origin and destination are the same airport")]
    SameOriginDestination { cargo_id: String },
    #[error("duplicate {entity} id '{id}' in {file}")]
    Duplicate {
        entity: &'static str,
        id: String,
        file: String,
    },
}

/// Top-level error for the planner binary and HTTP surface.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PlannerError {
    /// Process exit code: 2 for data validation failures, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlannerError::Validation(_) => 2,
            _ => 1,
        }
    }
}

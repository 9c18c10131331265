//! Error types for input handling.
//!
//! Solver outcomes are not errors: an infeasible model is reported through
//! [`SolveStatus`](crate::solver::SolveStatus) on the returned outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{table} table is missing required column `{column}`")]
    MissingColumn { table: &'static str, column: String },

    #[error("{table} table contains duplicate key `{key}`")]
    DuplicateKey { table: &'static str, key: String },

    #[error("{table} table has invalid value `{value}` in column `{column}` for `{key}`")]
    InvalidValue {
        table: &'static str,
        key: String,
        column: String,
        value: String,
    },

    #[error("{name} override does not cover staff: {}", missing.join(", "))]
    IncompleteOverride {
        name: &'static str,
        missing: Vec<String>,
    },

    #[error("{name} override names unknown staff `{key}`")]
    UnknownOverrideKey { name: &'static str, key: String },

    #[error("solver backend `{0}` was not compiled into this build")]
    BackendUnavailable(String),

    #[error("malformed schedule table: {0}")]
    MalformedSchedule(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PlanResult<T> = Result<T, PlanError>;

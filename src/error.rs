use std::path::PathBuf;
use thiserror::Error;

use crate::models::WeightSet;

/// Fatal ingestion errors. Any of these aborts the prediction request.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("history file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file '{0}' is empty or has a blank header row")]
    Empty(String),

    #[error("history file '{0}' has no header row")]
    MissingHeader(String),

    #[error("history file '{source_name}' has no entrant name column (NUME or NAME); header was {header:?}")]
    MissingNameColumn {
        source_name: String,
        header: Vec<String>,
    },

    #[error("history file '{source_name}' could not be parsed: {source}")]
    Malformed {
        source_name: String,
        #[source]
        source: polars::prelude::PolarsError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Request-level problems. These are reported as warnings and never block output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("box number must be between 1 and 6, got {0}")]
    InvalidBox(u8),

    #[error("weights cannot be negative (best={best:.2}, average={average:.2}, average_trap={average_trap:.2})")]
    NegativeWeight {
        best: f64,
        average: f64,
        average_trap: f64,
    },

    #[error("weights sum to {0:.2}; predictions may be meaningless")]
    NonPositiveWeightSum(f64),

    #[error("no entrants were given for the race")]
    NoEntrants,

    #[error("race distance must be positive")]
    InvalidDistance,

    #[error("race date '{0}' is not in DD/MM/YYYY format; recency cannot be computed")]
    UnparsableRaceDate(String),
}

pub fn validate_box_number(box_no: u8) -> Result<(), ValidationError> {
    if !(1..=6).contains(&box_no) {
        return Err(ValidationError::InvalidBox(box_no));
    }
    Ok(())
}

/// Checks a weight set, returning every problem found. Callers warn and carry on.
pub fn validate_weights(weights: &WeightSet) -> Vec<ValidationError> {
    let mut problems = Vec::new();
    if weights.best < 0.0 || weights.average < 0.0 || weights.average_trap < 0.0 {
        problems.push(ValidationError::NegativeWeight {
            best: weights.best,
            average: weights.average,
            average_trap: weights.average_trap,
        });
    }
    let total = weights.total();
    if total <= 0.0 {
        problems.push(ValidationError::NonPositiveWeightSum(total));
    }
    problems
}

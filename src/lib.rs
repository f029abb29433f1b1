//! Greyhound - Race time prediction from historical race records
//!
//! This library provides:
//! - CSV ingestion of historical runs with tolerant cell parsing
//! - Per-entrant indicators over the track+distance history
//! - Weighted time prediction with additive adjustments
//! - Checkpoint race simulation and weight sensitivity testing
//!
//! # Example
//!
//! ```no_run
//! use greyhound::models::{RaceDefinition, RaceEntrant, WeightSet};
//! use greyhound::predictor::TimePredictor;
//!
//! let race = RaceDefinition {
//!     track: "Towcester".to_string(),
//!     distance: 500,
//!     grade: "A3".to_string(),
//!     date: Some("01/02/2024".to_string()),
//!     entrants: vec![RaceEntrant { name: "Fast Dog".to_string(), box_no: 3 }],
//! };
//!
//! let predictor = TimePredictor::default();
//! let prediction = predictor.predict_file("history.csv", &race, &WeightSet::default());
//! for result in &prediction.results {
//!     println!("{} {:?}", result.name, result.predicted_time);
//! }
//! ```

pub mod core;
pub mod data;
pub mod error;
pub mod models;
pub mod predictor;
pub mod simulation;

// Re-export commonly used types
pub use crate::core::{Diagnostic, Diagnostics, ModelConfig, Severity};
pub use data::{load_history, EntrantIndicators, HistoricalRaceRecord, HistoryIndex};
pub use error::{IngestError, ValidationError};
pub use models::{
    PredictionResult, RaceDefinition, RaceEntrant, RacePrediction, WeightSet, UNKNOWN_TIME,
};
pub use predictor::TimePredictor;
pub use simulation::{RaceSimulation, RaceSimulator, SensitivityOutcome, SensitivityTester};

//! Checkpoint simulation and weight sensitivity testing

pub mod race;
pub mod sensitivity;

pub use race::{Checkpoint, CheckpointTrace, Leaderboard, RaceSimulation, RaceSimulator};
pub use sensitivity::{
    weight_catalogue, EntrantSensitivity, SensitivityOutcome, SensitivityReport, SensitivityTester,
};

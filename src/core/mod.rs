//! Model configuration and request diagnostics

pub mod config;
pub mod diagnostics;

pub use config::ModelConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};

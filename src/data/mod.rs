//! Data loading and indicator aggregation modules

pub mod bends;
pub mod csv_loader;
pub mod features;
pub mod history;
pub mod parser;
pub mod remarks;

// Re-export commonly used types
pub use bends::{parse_bends, BendStyle, BendSummary};
pub use csv_loader::{load_history, parse_history_bytes, Age, HistoricalRaceRecord, HistoryLoad};
pub use features::{EntrantIndicators, HistoryFlags, RecencyStatus};
pub use history::HistoryIndex;
pub use remarks::{RemarkClassifier, RemarkProbabilities};

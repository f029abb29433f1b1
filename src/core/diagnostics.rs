//! Structured diagnostics returned alongside results
//!
//! Each message is also emitted through `tracing` at the matching level, so the
//! console log and the collector always agree.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Append-only message log for one request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.push(Severity::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.push(Severity::Warning, message);
    }

    pub fn fatal(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.push(Severity::Fatal, message);
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.entries.push(Diagnostic { severity, message });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Fatal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let mut diags = Diagnostics::new();
        diags.info("loaded 3 rows");
        diags.warn("unknown sex 'X'");
        assert_eq!(diags.len(), 2);
        assert!(!diags.has_fatal());
        assert_eq!(diags.warnings().count(), 1);

        diags.fatal("missing name column");
        assert!(diags.has_fatal());
        let severities: Vec<Severity> = diags.iter().map(|d| d.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Info, Severity::Warning, Severity::Fatal]
        );
    }

    #[test]
    fn test_extend() {
        let mut a = Diagnostics::new();
        a.warn("first");
        let mut b = Diagnostics::new();
        b.warn("second");
        a.extend(b);
        assert_eq!(a.len(), 2);
    }
}

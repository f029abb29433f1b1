//! Per-entrant indicator bundle
//!
//! Every statistic is optional. `None` means no contributing record, never zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::data::bends::BendSummary;
use crate::data::csv_loader::Age;
use crate::data::parser::normalize_name;
use crate::data::remarks::RemarkProbabilities;

/// How long ago the entrant last ran at this track and distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecencyStatus {
    #[serde(rename = "Very Recent")]
    VeryRecent,
    Recent,
    Moderate,
    Old,
    #[serde(rename = "No History")]
    NoHistory,
    /// Race date missing, no dated record, or last run after the race date
    #[serde(rename = "N/A Date")]
    NoDate,
}

impl RecencyStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RecencyStatus::VeryRecent => "Very Recent",
            RecencyStatus::Recent => "Recent",
            RecencyStatus::Moderate => "Moderate",
            RecencyStatus::Old => "Old",
            RecencyStatus::NoHistory => "No History",
            RecencyStatus::NoDate => "N/A Date",
        }
    }
}

impl fmt::Display for RecencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which statistics had at least one contributing record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFlags {
    pub general: bool,
    pub box_specific: bool,
    pub sectional: bool,
    pub sectional_average: bool,
    pub box_start: bool,
    pub age: bool,
    pub sex: bool,
    pub per_box_times: bool,
    pub grade: bool,
    pub recency: bool,
}

impl HistoryFlags {
    /// Compact form for tables, e.g. "GBSAPVXTRD"; "None" when nothing was found
    pub fn code(&self) -> String {
        let letters = [
            (self.general, 'G'),
            (self.box_specific, 'B'),
            (self.sectional, 'S'),
            (self.sectional_average, 'A'),
            (self.box_start, 'P'),
            (self.age, 'V'),
            (self.sex, 'X'),
            (self.per_box_times, 'T'),
            (self.grade, 'R'),
            (self.recency, 'D'),
        ];
        let code: String = letters
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, letter)| *letter)
            .collect();
        if code.is_empty() {
            "None".to_string()
        } else {
            code
        }
    }
}

/// Statistics for one entrant over its track+distance history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrantIndicators {
    pub name: String,
    pub normalized_name: String,
    /// Box assigned in the race being predicted
    pub box_no: u8,
    /// Records that matched track and distance
    pub relevant_runs: usize,

    pub best_time: Option<f64>,
    pub mean_time: Option<f64>,
    /// Mean time from the assigned box
    pub box_mean_time: Option<f64>,
    pub per_box_means: BTreeMap<u8, f64>,

    pub best_sectional: Option<f64>,
    pub mean_sectional: Option<f64>,
    pub mean_start_box: Option<f64>,

    pub age: Option<Age>,
    pub sex: Option<String>,
    /// Grade of the most recent dated run
    pub historical_grade: Option<String>,

    pub recency: RecencyStatus,
    pub days_since_last_race: Option<i64>,

    pub remarks: RemarkProbabilities,
    pub bends: BendSummary,

    pub flags: HistoryFlags,
}

impl EntrantIndicators {
    /// Bundle for an entrant with no relevant history
    pub fn no_history(name: &str, box_no: u8) -> Self {
        Self {
            name: name.trim().to_string(),
            normalized_name: normalize_name(name),
            box_no,
            relevant_runs: 0,
            best_time: None,
            mean_time: None,
            box_mean_time: None,
            per_box_means: BTreeMap::new(),
            best_sectional: None,
            mean_sectional: None,
            mean_start_box: None,
            age: None,
            sex: None,
            historical_grade: None,
            recency: RecencyStatus::NoHistory,
            days_since_last_race: None,
            remarks: RemarkProbabilities::default(),
            bends: BendSummary::default(),
            flags: HistoryFlags::default(),
        }
    }

    pub fn has_history(&self) -> bool {
        self.relevant_runs > 0
    }

    pub fn age_years(&self) -> Option<f64> {
        self.age.as_ref().and_then(Age::years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::bends::BendStyle;

    #[test]
    fn test_no_history_bundle() {
        let ind = EntrantIndicators::no_history(" Fast Dog ", 4);
        assert_eq!(ind.name, "Fast Dog");
        assert_eq!(ind.normalized_name, "fast dog");
        assert_eq!(ind.box_no, 4);
        assert!(!ind.has_history());
        assert_eq!(ind.best_time, None);
        assert_eq!(ind.recency, RecencyStatus::NoHistory);
        assert_eq!(ind.bends.style, BendStyle::Unknown);
        assert_eq!(ind.flags.code(), "None");
    }

    #[test]
    fn test_flag_code() {
        let flags = HistoryFlags {
            general: true,
            sectional: true,
            sex: true,
            recency: true,
            ..Default::default()
        };
        assert_eq!(flags.code(), "GSXD");
    }

    #[test]
    fn test_recency_labels() {
        assert_eq!(RecencyStatus::VeryRecent.to_string(), "Very Recent");
        assert_eq!(RecencyStatus::NoDate.to_string(), "N/A Date");
        assert_eq!(
            serde_json::to_string(&RecencyStatus::NoHistory).unwrap(),
            "\"No History\""
        );
    }

    #[test]
    fn test_age_years() {
        let mut ind = EntrantIndicators::no_history("Fast Dog", 1);
        ind.age = Some(Age::Years(2.0));
        assert_eq!(ind.age_years(), Some(2.0));
        ind.age = Some(Age::Text("2y".to_string()));
        assert_eq!(ind.age_years(), None);
    }
}

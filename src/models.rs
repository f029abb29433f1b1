use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::diagnostics::Diagnostics;
use crate::data::features::EntrantIndicators;

/// Value shown for unknown times at output boundaries. Unknown times sort worst.
pub const UNKNOWN_TIME: f64 = 999.99;

/// Materializes an optional time as the sentinel used for display and sorting.
pub fn time_or_sentinel(time: Option<f64>) -> f64 {
    time.unwrap_or(UNKNOWN_TIME)
}

/// Orders optional times ascending with unknown times last.
pub fn compare_times(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Formats a time with two decimals, or "N/A" when unknown
pub fn format_time(time: Option<f64>) -> String {
    match time {
        Some(t) => format!("{:.2}", t),
        None => "N/A".to_string(),
    }
}

/// Entrant in an upcoming race
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceEntrant {
    pub name: String,
    pub box_no: u8,
}

/// Upcoming race to predict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceDefinition {
    /// Track code as written in the history file, or a display name from the track map
    pub track: String,
    pub distance: u32,
    #[serde(default)]
    pub grade: String,
    /// DD/MM/YYYY
    #[serde(default)]
    pub date: Option<String>,
    pub entrants: Vec<RaceEntrant>,
}

/// Weights for blending best and average finish times
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    pub best: f64,
    pub average: f64,
    pub average_trap: f64,
}

impl WeightSet {
    pub fn new(best: f64, average: f64, average_trap: f64) -> Self {
        Self {
            best,
            average,
            average_trap,
        }
    }

    pub fn total(&self) -> f64 {
        self.best + self.average + self.average_trap
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        Self::new(0.33, 0.34, 0.33)
    }
}

impl std::fmt::Display for WeightSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "best={:.2} average={:.2} average_trap={:.2}",
            self.best, self.average, self.average_trap
        )
    }
}

/// Per-factor additive adjustments in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentBreakdown {
    pub box_specific: f64,
    pub age: f64,
    pub sex: f64,
    pub box_position: f64,
    pub grade: f64,
    pub recency: f64,
    pub remark: f64,
    pub bend: f64,
}

impl AdjustmentBreakdown {
    pub fn total(&self) -> f64 {
        self.box_specific
            + self.age
            + self.sex
            + self.box_position
            + self.grade
            + self.recency
            + self.remark
            + self.bend
    }
}

impl std::fmt::Display for AdjustmentBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "box_specific={:.2}, age={:.2}, sex={:.2}, box_position={:.2}, grade={:.2}, recency={:.2}, remark={:.2}, bend={:.2}",
            self.box_specific,
            self.age,
            self.sex,
            self.box_position,
            self.grade,
            self.recency,
            self.remark,
            self.bend
        )
    }
}

/// Prediction for one entrant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub name: String,
    pub box_no: u8,
    /// Grade of the race being predicted, as applied to the grade adjustment
    pub race_grade: String,
    pub indicators: EntrantIndicators,
    /// Weighted blend of best/average times before adjustments
    pub base_time: Option<f64>,
    pub adjustments: AdjustmentBreakdown,
    /// None when the entrant has no usable history
    pub predicted_time: Option<f64>,
}

impl PredictionResult {
    /// Predicted time with the sentinel substituted for unknown values
    pub fn predicted_or_sentinel(&self) -> f64 {
        time_or_sentinel(self.predicted_time)
    }
}

/// Ranked predictions for a race plus everything reported along the way
#[derive(Debug, Clone, Default, Serialize)]
pub struct RacePrediction {
    /// Sorted by predicted time ascending, unknown last
    pub results: Vec<PredictionResult>,
    /// Number of history rows read, zero when ingestion was fatal
    pub records_loaded: usize,
    pub diagnostics: Diagnostics,
}

impl RacePrediction {
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.has_fatal()
    }
}

/// Sorts results by predicted time (unknown last), then normalized name, then box.
pub fn rank_results(results: &mut [PredictionResult]) {
    results.sort_by(|a, b| {
        compare_times(a.predicted_time, b.predicted_time)
            .then_with(|| a.indicators.normalized_name.cmp(&b.indicators.normalized_name))
            .then_with(|| a.box_no.cmp(&b.box_no))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_times_unknown_last() {
        assert_eq!(compare_times(Some(28.1), None), Ordering::Less);
        assert_eq!(compare_times(None, Some(28.1)), Ordering::Greater);
        assert_eq!(compare_times(None, None), Ordering::Equal);
        assert_eq!(compare_times(Some(28.1), Some(28.5)), Ordering::Less);
    }

    #[test]
    fn test_sentinel_boundary() {
        assert_eq!(time_or_sentinel(None), UNKNOWN_TIME);
        assert_eq!(time_or_sentinel(Some(29.5)), 29.5);
        assert_eq!(format_time(None), "N/A");
        assert_eq!(format_time(Some(28.456)), "28.46");
    }

    #[test]
    fn test_adjustment_total() {
        let adj = AdjustmentBreakdown {
            box_specific: 0.1,
            age: 0.2,
            sex: 0.1,
            box_position: -0.06,
            grade: 0.1,
            recency: 0.0,
            remark: 0.05,
            bend: -0.07,
        };
        assert!((adj.total() - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_weight_set_default() {
        let w = WeightSet::default();
        assert!((w.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_race_definition_from_json() {
        let json = r#"{
            "track": "Tow",
            "distance": 500,
            "grade": "A2",
            "date": "05/01/2024",
            "entrants": [{"name": "Fast Dog", "box_no": 3}]
        }"#;
        let race: RaceDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(race.distance, 500);
        assert_eq!(race.entrants[0].box_no, 3);
        assert_eq!(race.date.as_deref(), Some("05/01/2024"));
    }
}

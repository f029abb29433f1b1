//! Weighted Time Predictor
//!
//! Blends an entrant's best and mean finish times by the caller's weights, then
//! adds a fixed set of additive adjustments taken from [`ModelConfig`].

use std::path::Path;
use tracing::{debug, info};

use crate::core::config::ModelConfig;
use crate::core::diagnostics::Diagnostics;
use crate::data::csv_loader::{load_history, HistoryLoad};
use crate::data::features::EntrantIndicators;
use crate::data::history::HistoryIndex;
use crate::data::parser::CellParser;
use crate::data::remarks::RemarkClassifier;
use crate::error::{validate_box_number, validate_weights, IngestError, ValidationError};
use crate::models::{
    rank_results, AdjustmentBreakdown, PredictionResult, RaceDefinition, RacePrediction, WeightSet,
};

/// Heuristic time model driven by an immutable configuration
pub struct TimePredictor {
    config: ModelConfig,
    classifier: RemarkClassifier,
}

impl TimePredictor {
    pub fn new(config: ModelConfig) -> Self {
        let classifier = RemarkClassifier::new(&config.problem_keywords, &config.clear_run_keywords);
        Self { config, classifier }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn classifier(&self) -> &RemarkClassifier {
        &self.classifier
    }

    /// Weighted blend of best and mean time over the statistics that exist.
    ///
    /// Only present statistics with a positive weight take part and their
    /// weights are renormalized to sum to one. `average_trap` never enters the
    /// blend; the box-specific figure acts through its own adjustment.
    pub fn base_time(&self, ind: &EntrantIndicators, weights: &WeightSet) -> Option<f64> {
        let candidates = [(ind.best_time, weights.best), (ind.mean_time, weights.average)];

        let applicable: Vec<(f64, f64)> = candidates
            .iter()
            .filter_map(|(time, weight)| time.map(|t| (t, *weight)))
            .filter(|(_, weight)| *weight > 0.0)
            .collect();

        let weight_sum: f64 = applicable.iter().map(|(_, w)| w).sum();
        if weight_sum <= 0.0 {
            return None;
        }
        Some(applicable.iter().map(|(t, w)| t * w / weight_sum).sum())
    }

    /// Per-factor adjustments for one entrant
    ///
    /// Sex warnings go to `diagnostics`; race grade problems are reported once
    /// per race by [`TimePredictor::predict_race`].
    pub fn adjustments(
        &self,
        ind: &EntrantIndicators,
        race_grade: &str,
        diagnostics: &mut Diagnostics,
    ) -> AdjustmentBreakdown {
        let config = &self.config;

        let box_specific = match (ind.box_mean_time, ind.mean_time) {
            (Some(box_mean), Some(mean)) => box_mean - mean,
            _ => 0.0,
        };

        let age = match ind.age_years() {
            Some(years) if years < config.young_age_threshold => config.young_age_adjustment,
            Some(years) if years > config.old_age_threshold => config.old_age_adjustment,
            _ => 0.0,
        };

        let sex = match ind.sex.as_deref() {
            Some(code) => config.sex_adjustment(code).unwrap_or_else(|| {
                diagnostics.warn(format!(
                    "Unknown sex '{}' for {}; using default adjustment",
                    code.trim().to_uppercase(),
                    ind.name
                ));
                config.default_sex_adjustment
            }),
            None => {
                if ind.has_history() {
                    diagnostics.warn(format!(
                        "Sex missing for {}; using default adjustment",
                        ind.name
                    ));
                }
                config.default_sex_adjustment
            }
        };

        let box_position = ind
            .mean_start_box
            .map(|mean_box| (f64::from(ind.box_no) - mean_box) * config.box_position_factor)
            .unwrap_or(0.0);

        let grade = self.grade_adjustment(race_grade);

        let recency = config.recency_adjustments.get(ind.recency);

        let remark = ind.remarks.problem.unwrap_or(0.0) * config.remark_problem_coefficient
            - ind.remarks.clear_run.unwrap_or(0.0) * config.remark_clear_run_coefficient;

        let bend = match ind.bends.mean_difference {
            Some(diff) if diff < -1.0 => -config.bend_finisher_bonus,
            Some(diff) if diff > 1.0 => config.bend_early_pace_penalty,
            _ => 0.0,
        };

        AdjustmentBreakdown {
            box_specific,
            age,
            sex,
            box_position,
            grade,
            recency,
            remark,
            bend,
        }
    }

    /// Grade lookup, falling back to the default for blank or unknown grades
    pub fn grade_adjustment(&self, race_grade: &str) -> f64 {
        if race_grade.trim().is_empty() {
            return self.config.default_grade_adjustment;
        }
        self.config
            .grade_adjustment(race_grade)
            .unwrap_or(self.config.default_grade_adjustment)
    }

    /// Predicted time for one entrant. Unknown stays unknown.
    pub fn predict_entrant(
        &self,
        indicators: EntrantIndicators,
        race_grade: &str,
        weights: &WeightSet,
        diagnostics: &mut Diagnostics,
    ) -> PredictionResult {
        let base_time = self.base_time(&indicators, weights);
        let adjustments = self.adjustments(&indicators, race_grade, diagnostics);
        let total = adjustments.total();

        if total.abs() > self.config.adjustment_warning_threshold {
            diagnostics.warn(format!(
                "Very large total adjustment ({:.2}s) for {}; check the history data. Breakdown: {}",
                total, indicators.name, adjustments
            ));
        }

        let predicted_time = base_time.map(|base| base + total);
        debug!(
            "{} box {}: base={:?} adjustment={:.3} predicted={:?}",
            indicators.name, indicators.box_no, base_time, total, predicted_time
        );

        PredictionResult {
            name: indicators.name.clone(),
            box_no: indicators.box_no,
            race_grade: race_grade.trim().to_string(),
            indicators,
            base_time,
            adjustments,
            predicted_time,
        }
    }

    /// Predict every entrant of a race against an indexed history
    pub fn predict_race(
        &self,
        index: &HistoryIndex,
        race: &RaceDefinition,
        weights: &WeightSet,
    ) -> RacePrediction {
        let mut diagnostics = Diagnostics::new();
        let mut prediction = RacePrediction {
            records_loaded: index.record_count(),
            ..Default::default()
        };

        if race.entrants.is_empty() {
            diagnostics.fatal(ValidationError::NoEntrants.to_string());
            prediction.diagnostics = diagnostics;
            return prediction;
        }
        if race.distance == 0 {
            diagnostics.fatal(ValidationError::InvalidDistance.to_string());
            prediction.diagnostics = diagnostics;
            return prediction;
        }

        for problem in validate_weights(weights) {
            diagnostics.warn(problem.to_string());
        }

        let (track, known_track) = self.config.resolve_track(&race.track);
        if !known_track {
            diagnostics.warn(format!(
                "Track '{}' is not in the track map; matching history on it verbatim",
                track
            ));
        }

        let race_date = self.parse_race_date(race.date.as_deref(), &mut diagnostics);
        self.check_race_grade(&race.grade, &mut diagnostics);

        info!(
            "Predicting {} entrants at {} {}m (weights {})",
            race.entrants.len(),
            track,
            race.distance,
            weights
        );

        for entrant in &race.entrants {
            if let Err(e) = validate_box_number(entrant.box_no) {
                diagnostics.warn(format!("{}: {}", entrant.name, e));
            }
            let indicators = index.compute_indicators(
                &entrant.name,
                entrant.box_no,
                &track,
                race.distance,
                race_date,
                &self.classifier,
                &self.config,
            );
            let result = self.predict_entrant(indicators, &race.grade, weights, &mut diagnostics);
            prediction.results.push(result);
        }

        rank_results(&mut prediction.results);
        prediction.diagnostics = diagnostics;
        prediction
    }

    /// Predict from an ingestion outcome. A fatal ingestion yields no results.
    pub fn predict_loaded(
        &self,
        loaded: Result<HistoryLoad, IngestError>,
        race: &RaceDefinition,
        weights: &WeightSet,
    ) -> RacePrediction {
        match loaded {
            Ok(load) => {
                let mut diagnostics = load.diagnostics;
                let index = HistoryIndex::from_records(load.records);
                let mut prediction = self.predict_race(&index, race, weights);
                diagnostics.extend(prediction.diagnostics);
                prediction.diagnostics = diagnostics;
                prediction
            }
            Err(e) => fatal_prediction(&e),
        }
    }

    /// Load the history file and predict the race
    pub fn predict_file<P: AsRef<Path>>(
        &self,
        path: P,
        race: &RaceDefinition,
        weights: &WeightSet,
    ) -> RacePrediction {
        self.predict_loaded(load_history(path), race, weights)
    }

    fn parse_race_date(
        &self,
        date: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Option<chrono::NaiveDate> {
        let raw = date.map(str::trim).unwrap_or("");
        if raw.is_empty() {
            diagnostics.warn("No race date given; recency cannot be computed");
            return None;
        }
        let parsed = CellParser::new().parse_date(raw);
        if parsed.is_none() {
            diagnostics.warn(ValidationError::UnparsableRaceDate(raw.to_string()).to_string());
        }
        parsed
    }

    fn check_race_grade(&self, grade: &str, diagnostics: &mut Diagnostics) {
        let grade = grade.trim();
        if grade.is_empty() {
            diagnostics.warn("Race grade missing; using default grade adjustment");
        } else if self.config.grade_adjustment(grade).is_none() {
            diagnostics.warn(format!(
                "Unknown race grade '{}'; using default grade adjustment",
                grade.to_uppercase()
            ));
        }
    }
}

impl Default for TimePredictor {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

/// Empty prediction carrying the fatal ingestion message
pub fn fatal_prediction(error: &IngestError) -> RacePrediction {
    let mut diagnostics = Diagnostics::new();
    diagnostics.fatal(error.to_string());
    RacePrediction {
        results: Vec::new(),
        records_loaded: 0,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::Severity;
    use crate::data::csv_loader::{parse_history_bytes, Age};
    use crate::data::features::RecencyStatus;
    use crate::models::{RaceEntrant, UNKNOWN_TIME};

    const HISTORY: &str = "\
DATA,PISTA,DISTANTA,GRAD,BOXA,SECTIONAL,POZITIE,FINAL,VARSTA,SEX,NUME,REMARK,CURBA
05/01/2024,Tow,500,A2,3,4.95,1,28.10,3.0,D,Fast Dog,,
12/01/2024,Tow,500,A2,3,5.00,2,28.30,3.0,D,Fast Dog,,
19/01/2024,Tow,500,A2,3,5.05,3,28.50,3.0,D,Fast Dog,,
19/01/2024,Tow,500,A2,1,5.10,4,28.90,3.0,B,Steady Girl,,
";

    fn race(entrants: &[(&str, u8)]) -> RaceDefinition {
        RaceDefinition {
            track: "Towcester".to_string(),
            distance: 500,
            grade: "A2".to_string(),
            date: Some("01/02/2024".to_string()),
            entrants: entrants
                .iter()
                .map(|(name, box_no)| RaceEntrant {
                    name: name.to_string(),
                    box_no: *box_no,
                })
                .collect(),
        }
    }

    fn with_times(best: Option<f64>, mean: Option<f64>) -> EntrantIndicators {
        let mut ind = EntrantIndicators::no_history("Test Dog", 1);
        ind.relevant_runs = 2;
        ind.best_time = best;
        ind.mean_time = mean;
        ind.sex = Some("D".to_string());
        ind.recency = RecencyStatus::VeryRecent;
        ind
    }

    #[test]
    fn test_base_time_renormalizes_present_weights() {
        let predictor = TimePredictor::default();
        let ind = with_times(Some(10.0), Some(10.4));
        let base = predictor.base_time(&ind, &WeightSet::default()).unwrap();
        let expected = (10.0 * 0.33 + 10.4 * 0.34) / (0.33 + 0.34);
        assert!((base - expected).abs() < 1e-9);
        assert!((base - 10.2).abs() < 0.01);
    }

    #[test]
    fn test_base_time_skips_non_positive_weights() {
        let predictor = TimePredictor::default();
        let ind = with_times(Some(10.0), Some(10.4));
        let base = predictor
            .base_time(&ind, &WeightSet::new(0.0, 0.5, 0.5))
            .unwrap();
        assert!((base - 10.4).abs() < 1e-9);
        let base = predictor
            .base_time(&ind, &WeightSet::new(-1.0, 0.5, 0.5))
            .unwrap();
        assert!((base - 10.4).abs() < 1e-9);
        assert!(predictor
            .base_time(&ind, &WeightSet::new(0.0, 0.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_no_history_stays_unknown() {
        let predictor = TimePredictor::default();
        let mut diags = Diagnostics::new();
        for weights in [WeightSet::default(), WeightSet::new(0.5, 0.25, 0.25)] {
            let ind = EntrantIndicators::no_history("Ghost", 2);
            let result = predictor.predict_entrant(ind, "A2", &weights, &mut diags);
            assert_eq!(result.predicted_time, None);
            assert_eq!(result.predicted_or_sentinel(), UNKNOWN_TIME);
        }
    }

    #[test]
    fn test_age_adjustments() {
        let predictor = TimePredictor::default();
        let mut diags = Diagnostics::new();
        let mut ind = with_times(Some(28.0), Some(28.2));

        ind.age = Some(Age::Years(2.0));
        assert_eq!(predictor.adjustments(&ind, "A1", &mut diags).age, 0.2);
        ind.age = Some(Age::Years(5.0));
        assert_eq!(predictor.adjustments(&ind, "A1", &mut diags).age, 0.1);
        ind.age = Some(Age::Years(3.0));
        assert_eq!(predictor.adjustments(&ind, "A1", &mut diags).age, 0.0);
        ind.age = Some(Age::Text("young".to_string()));
        assert_eq!(predictor.adjustments(&ind, "A1", &mut diags).age, 0.0);
    }

    #[test]
    fn test_sex_and_grade_lookups() {
        let predictor = TimePredictor::default();
        let mut diags = Diagnostics::new();
        let mut ind = with_times(Some(28.0), Some(28.2));

        ind.sex = Some("b".to_string());
        let adj = predictor.adjustments(&ind, "a3", &mut diags);
        assert_eq!(adj.sex, 0.1);
        assert_eq!(adj.grade, 0.2);
        assert!(diags.is_empty());

        ind.sex = Some("X".to_string());
        let adj = predictor.adjustments(&ind, "S4", &mut diags);
        assert_eq!(adj.sex, 0.0);
        assert_eq!(adj.grade, 0.5);
        assert_eq!(diags.warnings().count(), 1);

        assert_eq!(predictor.grade_adjustment(""), 0.5);
    }

    #[test]
    fn test_box_position_remark_and_bend() {
        let predictor = TimePredictor::default();
        let mut diags = Diagnostics::new();
        let mut ind = with_times(Some(28.0), Some(28.2));
        ind.box_no = 5;
        ind.mean_start_box = Some(3.0);
        ind.remarks.problem = Some(0.5);
        ind.remarks.clear_run = Some(0.25);
        ind.bends.mean_difference = Some(-2.0);

        let adj = predictor.adjustments(&ind, "A1", &mut diags);
        assert!((adj.box_position - 0.06).abs() < 1e-9);
        assert!((adj.remark - (0.5 * 0.2 - 0.25 * 0.1)).abs() < 1e-9);
        assert!((adj.bend + 0.07).abs() < 1e-9);

        ind.bends.mean_difference = Some(1.5);
        assert!((predictor.adjustments(&ind, "A1", &mut diags).bend - 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_large_adjustment_warns() {
        let predictor = TimePredictor::default();
        let mut diags = Diagnostics::new();
        let mut ind = with_times(Some(28.0), Some(28.2));
        ind.box_mean_time = Some(29.5);
        let result = predictor.predict_entrant(ind, "A1", &WeightSet::default(), &mut diags);
        assert!(result.adjustments.total() > 1.0);
        let warning = diags.warnings().next().unwrap();
        assert!(warning.message.contains("Test Dog"));
        assert!(warning.message.contains("box_specific=1.30"));
    }

    #[test]
    fn test_end_to_end_box_adjustment_zero() {
        let predictor = TimePredictor::default();
        let loaded = parse_history_bytes(HISTORY.as_bytes(), "history.csv");
        let prediction = predictor.predict_loaded(
            loaded,
            &race(&[("Fast Dog", 3), ("Unknown Dog", 2), ("Steady Girl", 1)]),
            &WeightSet::default(),
        );
        assert!(!prediction.is_fatal());
        assert_eq!(prediction.records_loaded, 4);
        assert_eq!(prediction.results.len(), 3);

        let fast = &prediction.results[0];
        assert_eq!(fast.name, "Fast Dog");
        assert!((fast.indicators.box_mean_time.unwrap() - 28.3).abs() < 1e-9);
        assert!((fast.indicators.mean_time.unwrap() - 28.3).abs() < 1e-9);
        assert!(fast.adjustments.box_specific.abs() < 1e-9);
        assert!(fast.predicted_time.is_some());

        assert_eq!(prediction.results[1].name, "Steady Girl");
        assert_eq!(prediction.results[2].name, "Unknown Dog");
        assert_eq!(prediction.results[2].predicted_time, None);
    }

    #[test]
    fn test_fatal_ingestion_gives_empty_results() {
        let predictor = TimePredictor::default();
        let loaded = parse_history_bytes(b"DATA,PISTA\n01/01/2024,Tow\n", "bad.csv");
        let prediction =
            predictor.predict_loaded(loaded, &race(&[("Fast Dog", 3)]), &WeightSet::default());
        assert!(prediction.is_fatal());
        assert!(prediction.results.is_empty());
        assert_eq!(prediction.records_loaded, 0);

        let prediction = predictor.predict_file(
            "/nonexistent/history.csv",
            &race(&[("Fast Dog", 3)]),
            &WeightSet::default(),
        );
        assert!(prediction.is_fatal());
        assert!(prediction.results.is_empty());
    }

    #[test]
    fn test_no_entrants_is_rejected() {
        let predictor = TimePredictor::default();
        let loaded = parse_history_bytes(HISTORY.as_bytes(), "history.csv");
        let prediction = predictor.predict_loaded(loaded, &race(&[]), &WeightSet::default());
        assert!(prediction.is_fatal());
        assert!(prediction.results.is_empty());
    }

    #[test]
    fn test_zero_distance_is_rejected() {
        let predictor = TimePredictor::default();
        let loaded = parse_history_bytes(HISTORY.as_bytes(), "history.csv");
        let mut race = race(&[("Fast Dog", 3)]);
        race.distance = 0;
        let prediction = predictor.predict_loaded(loaded, &race, &WeightSet::default());
        assert!(prediction.is_fatal());
        assert!(prediction.results.is_empty());
    }

    #[test]
    fn test_unknown_track_warns_and_matches_verbatim() {
        let predictor = TimePredictor::default();
        let loaded = parse_history_bytes(HISTORY.as_bytes(), "history.csv");
        let mut race = race(&[("Fast Dog", 3), ("Steady Girl", 1)]);
        race.track = "Hove".to_string();
        let prediction = predictor.predict_loaded(loaded, &race, &WeightSet::default());

        assert!(!prediction.is_fatal());
        assert!(prediction
            .diagnostics
            .warnings()
            .any(|d| d.message.contains("Hove")));
        assert_eq!(prediction.results.len(), 2);
        assert!(prediction.results.iter().all(|r| r.predicted_time.is_none()));
    }

    #[test]
    fn test_classifier_uses_configured_keywords() {
        let mut config = ModelConfig::default();
        config.problem_keywords = vec!["stumbled".to_string()];
        config.clear_run_keywords = vec!["smooth".to_string()];
        let predictor = TimePredictor::new(config);
        let class = predictor.classifier().classify("Stumbled at start");
        assert!(class.problem);
        assert!(!class.clear_run);
        let class = predictor.classifier().classify("Smooth trip");
        assert!(!class.problem);
        assert!(class.clear_run);
    }

    #[test]
    fn test_request_warnings_do_not_block() {
        let predictor = TimePredictor::default();
        let loaded = parse_history_bytes(HISTORY.as_bytes(), "history.csv");
        let mut race = race(&[("Fast Dog", 3), ("Steady Girl", 9)]);
        race.date = Some("2024-02-01".to_string());
        race.grade = "S4".to_string();
        let prediction = predictor.predict_loaded(loaded, &race, &WeightSet::new(-0.5, 0.25, 0.25));

        assert!(!prediction.is_fatal());
        assert_eq!(prediction.results.len(), 2);
        let messages: Vec<&str> = prediction
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| d.message.as_str())
            .collect();
        assert!(messages.iter().any(|m| m.contains("negative")));
        assert!(messages.iter().any(|m| m.contains("DD/MM/YYYY")));
        assert!(messages.iter().any(|m| m.contains("S4")));
        assert!(messages.iter().any(|m| m.contains("box number")));
        assert!(prediction
            .results
            .iter()
            .all(|r| r.indicators.recency == RecencyStatus::NoDate));
    }

    #[test]
    fn test_ties_broken_by_name_then_box() {
        let data = "\
PISTA,DISTANTA,FINAL,SEX,NUME
Tow,500,28.00,D,Zulu
Tow,500,28.00,D,Alpha
";
        let predictor = TimePredictor::default();
        let loaded = parse_history_bytes(data.as_bytes(), "ties.csv");
        let prediction = predictor.predict_loaded(
            loaded,
            &race(&[("Zulu", 2), ("Alpha", 2)]),
            &WeightSet::default(),
        );
        let names: Vec<&str> = prediction.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zulu"]);
    }
}

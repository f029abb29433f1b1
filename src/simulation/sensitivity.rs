//! Weight Sensitivity Tester
//!
//! Runs the predictor over a fixed catalogue of weight sets against one race
//! and summarizes how much each entrant's rank and time move.

use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::core::diagnostics::Diagnostics;
use crate::data::csv_loader::{load_history, HistoryLoad};
use crate::data::history::HistoryIndex;
use crate::data::parser::normalize_name;
use crate::error::IngestError;
use crate::models::{RaceDefinition, RacePrediction, WeightSet};
use crate::predictor::TimePredictor;

/// Weight sets compared by the tester, default first
pub fn weight_catalogue() -> Vec<WeightSet> {
    vec![
        WeightSet::new(0.33, 0.34, 0.33),
        WeightSet::new(0.25, 0.45, 0.30),
        WeightSet::new(0.5, 0.25, 0.25),
        WeightSet::new(0.25, 0.5, 0.25),
        WeightSet::new(0.25, 0.25, 0.5),
        WeightSet::new(0.4, 0.3, 0.3),
        WeightSet::new(0.3, 0.4, 0.3),
    ]
}

/// One prediction under one weight set
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityRun {
    pub weights: WeightSet,
    pub prediction: RacePrediction,
}

/// How one entrant moved across the catalogue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrantSensitivity {
    pub name: String,
    pub box_no: u8,
    pub best_rank: usize,
    pub worst_rank: usize,
    pub fastest: Option<f64>,
    pub slowest: Option<f64>,
}

impl EntrantSensitivity {
    /// Difference between slowest and fastest predicted time
    pub fn spread(&self) -> Option<f64> {
        match (self.fastest, self.slowest) {
            (Some(fast), Some(slow)) => Some(slow - fast),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SensitivityReport {
    pub runs: Vec<SensitivityRun>,
    /// In race-card order
    pub summary: Vec<EntrantSensitivity>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub enum SensitivityOutcome {
    /// Nothing meaningful to compare; the reason and any messages so far
    Skipped {
        reason: String,
        diagnostics: Diagnostics,
    },
    Completed(SensitivityReport),
}

pub struct SensitivityTester<'a> {
    predictor: &'a TimePredictor,
    catalogue: Vec<WeightSet>,
}

impl<'a> SensitivityTester<'a> {
    pub fn new(predictor: &'a TimePredictor) -> Self {
        Self {
            predictor,
            catalogue: weight_catalogue(),
        }
    }

    pub fn with_catalogue(predictor: &'a TimePredictor, catalogue: Vec<WeightSet>) -> Self {
        Self {
            predictor,
            catalogue,
        }
    }

    pub fn run_file<P: AsRef<Path>>(&self, path: P, race: &RaceDefinition) -> SensitivityOutcome {
        self.run_loaded(load_history(path), race)
    }

    /// Skips on fatal ingestion; otherwise runs against the loaded records
    pub fn run_loaded(
        &self,
        loaded: Result<HistoryLoad, IngestError>,
        race: &RaceDefinition,
    ) -> SensitivityOutcome {
        match loaded {
            Ok(load) => {
                let mut diagnostics = load.diagnostics;
                let index = HistoryIndex::from_records(load.records);
                match self.run_index(&index, race) {
                    SensitivityOutcome::Completed(mut report) => {
                        diagnostics.extend(report.diagnostics);
                        report.diagnostics = diagnostics;
                        SensitivityOutcome::Completed(report)
                    }
                    SensitivityOutcome::Skipped {
                        reason,
                        diagnostics: more,
                    } => {
                        diagnostics.extend(more);
                        SensitivityOutcome::Skipped {
                            reason,
                            diagnostics,
                        }
                    }
                }
            }
            Err(e) => {
                let mut diagnostics = Diagnostics::new();
                diagnostics.fatal(e.to_string());
                skipped(
                    "Fatal errors reading the history file; weight testing cannot continue"
                        .to_string(),
                    diagnostics,
                )
            }
        }
    }

    /// Runs every weight set, unless no entrant has track+distance history
    pub fn run_index(&self, index: &HistoryIndex, race: &RaceDefinition) -> SensitivityOutcome {
        let (track, _) = self.predictor.config().resolve_track(&race.track);
        let any_relevant = race
            .entrants
            .iter()
            .any(|e| index.has_relevant_history(&e.name, &track, race.distance));

        if !any_relevant {
            let mut diagnostics = Diagnostics::new();
            diagnostics.info(format!(
                "{} history rows processed; test race is {} / {}m",
                index.record_count(),
                track,
                race.distance
            ));
            return skipped(
                format!(
                    "No relevant history (track {} at {}m) for any entrant; check names, track and distance match the history file exactly",
                    track, race.distance
                ),
                diagnostics,
            );
        }

        info!(
            "Testing {} weight sets on {} {}m",
            self.catalogue.len(),
            track,
            race.distance
        );

        let mut diagnostics = Diagnostics::new();
        let mut runs = Vec::with_capacity(self.catalogue.len());
        for weights in &self.catalogue {
            let prediction = self.predictor.predict_race(index, race, weights);
            // the same request warnings repeat for every weight set; keep the first run's
            if runs.is_empty() {
                diagnostics.extend(prediction.diagnostics.clone());
            }
            runs.push(SensitivityRun {
                weights: *weights,
                prediction,
            });
        }

        let summary = summarize(race, &runs);
        SensitivityOutcome::Completed(SensitivityReport {
            runs,
            summary,
            diagnostics,
        })
    }
}

fn skipped(reason: String, diagnostics: Diagnostics) -> SensitivityOutcome {
    warn!("Weight sensitivity skipped: {}", reason);
    SensitivityOutcome::Skipped {
        reason,
        diagnostics,
    }
}

fn summarize(race: &RaceDefinition, runs: &[SensitivityRun]) -> Vec<EntrantSensitivity> {
    race.entrants
        .iter()
        .map(|entrant| {
            let key = normalize_name(&entrant.name);
            let mut best_rank = usize::MAX;
            let mut worst_rank = 0;
            let mut fastest: Option<f64> = None;
            let mut slowest: Option<f64> = None;

            for run in runs {
                let found = run.prediction.results.iter().enumerate().find(|(_, r)| {
                    r.indicators.normalized_name == key && r.box_no == entrant.box_no
                });
                if let Some((i, result)) = found {
                    best_rank = best_rank.min(i + 1);
                    worst_rank = worst_rank.max(i + 1);
                    if let Some(t) = result.predicted_time {
                        fastest = Some(fastest.map_or(t, |f| f.min(t)));
                        slowest = Some(slowest.map_or(t, |s| s.max(t)));
                    }
                }
            }

            EntrantSensitivity {
                name: entrant.name.trim().to_string(),
                box_no: entrant.box_no,
                best_rank: if worst_rank == 0 { 0 } else { best_rank },
                worst_rank,
                fastest,
                slowest,
            }
        })
        .collect()
}

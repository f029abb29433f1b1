//! Entrant History Index
//!
//! Groups history records by normalized entrant name and aggregates the
//! track+distance subset into an [`EntrantIndicators`] bundle.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::core::config::ModelConfig;
use crate::data::bends::BendAccumulator;
use crate::data::csv_loader::HistoricalRaceRecord;
use crate::data::features::{EntrantIndicators, HistoryFlags, RecencyStatus};
use crate::data::parser::normalize_name;
use crate::data::remarks::{RemarkClassifier, RemarkTally};

/// History records indexed by normalized entrant name, in file order
pub struct HistoryIndex {
    history: HashMap<String, Vec<HistoricalRaceRecord>>,
    record_count: usize,
}

impl HistoryIndex {
    pub fn from_records(records: Vec<HistoricalRaceRecord>) -> Self {
        let record_count = records.len();
        let mut history: HashMap<String, Vec<HistoricalRaceRecord>> = HashMap::new();
        for record in records {
            history
                .entry(record.normalized_name.clone())
                .or_default()
                .push(record);
        }
        Self {
            history,
            record_count,
        }
    }

    /// All records for an entrant, matched on the normalized name
    pub fn records_for(&self, name: &str) -> &[HistoricalRaceRecord] {
        self.history
            .get(&normalize_name(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records at exactly this track code and distance
    pub fn relevant_records(
        &self,
        name: &str,
        track: &str,
        distance: u32,
    ) -> Vec<&HistoricalRaceRecord> {
        self.records_for(name)
            .iter()
            .filter(|r| r.track == track && r.distance == Some(distance))
            .collect()
    }

    pub fn has_relevant_history(&self, name: &str, track: &str, distance: u32) -> bool {
        self.records_for(name)
            .iter()
            .any(|r| r.track == track && r.distance == Some(distance))
    }

    /// Compute the indicator bundle for one entrant in an upcoming race
    ///
    /// # Arguments
    /// * `name` - Entrant name as entered for the race
    /// * `box_no` - Box assigned in the upcoming race
    /// * `track` - Track code as written in the history file
    /// * `distance` - Race distance in metres
    /// * `race_date` - Date of the upcoming race, if known
    #[allow(clippy::too_many_arguments)]
    pub fn compute_indicators(
        &self,
        name: &str,
        box_no: u8,
        track: &str,
        distance: u32,
        race_date: Option<NaiveDate>,
        classifier: &RemarkClassifier,
        config: &ModelConfig,
    ) -> EntrantIndicators {
        let relevant = self.relevant_records(name, track, distance);
        let mut ind = EntrantIndicators::no_history(name, box_no);
        if relevant.is_empty() {
            return ind;
        }
        ind.relevant_runs = relevant.len();

        let mut flags = HistoryFlags::default();

        // Finish times
        let times: Vec<f64> = relevant.iter().filter_map(|r| r.finish_time).collect();
        if !times.is_empty() {
            flags.general = true;
            ind.best_time = times.iter().copied().reduce(f64::min);
            ind.mean_time = mean(&times);
        }

        // Per-box finish times
        let mut by_box: BTreeMap<u8, Vec<f64>> = BTreeMap::new();
        for r in &relevant {
            if let (Some(b), Some(t)) = (r.box_no, r.finish_time) {
                if (1..=6).contains(&b) {
                    by_box.entry(b).or_default().push(t);
                }
            }
        }
        if !by_box.is_empty() {
            flags.per_box_times = true;
            ind.per_box_means = by_box
                .iter()
                .filter_map(|(b, ts)| mean(ts).map(|m| (*b, m)))
                .collect();
            if let Some(m) = ind.per_box_means.get(&box_no) {
                flags.box_specific = true;
                ind.box_mean_time = Some(*m);
            }
        }

        // Sectionals
        let sectionals: Vec<f64> = relevant.iter().filter_map(|r| r.sectional).collect();
        if !sectionals.is_empty() {
            flags.sectional = true;
            flags.sectional_average = true;
            ind.best_sectional = sectionals.iter().copied().reduce(f64::min);
            ind.mean_sectional = mean(&sectionals);
        }

        // Starting boxes
        let boxes: Vec<f64> = relevant
            .iter()
            .filter_map(|r| r.box_no)
            .filter(|b| (1..=6).contains(b))
            .map(f64::from)
            .collect();
        if !boxes.is_empty() {
            flags.box_start = true;
            ind.mean_start_box = mean(&boxes);
        }

        // Age and sex: first value in file order
        ind.age = relevant.iter().find_map(|r| r.age.clone());
        flags.age = ind.age.is_some();
        ind.sex = relevant
            .iter()
            .map(|r| r.sex.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string);
        flags.sex = ind.sex.is_some();

        // Most recent dated run; the first one wins on equal dates
        let mut latest: Option<(NaiveDate, &HistoricalRaceRecord)> = None;
        for r in &relevant {
            if let Some(date) = r.date {
                if latest.map_or(true, |(d, _)| date > d) {
                    latest = Some((date, *r));
                }
            }
        }
        flags.recency = latest.is_some();

        if let Some((_, record)) = latest {
            let grade = record.grade.trim();
            if !grade.is_empty() {
                ind.historical_grade = Some(grade.to_string());
                flags.grade = true;
            }
        }

        ind.recency = match (race_date, latest) {
            (Some(current), Some((last, _))) if last <= current => {
                let days = (current - last).num_days();
                ind.days_since_last_race = Some(days);
                config.recency_thresholds.classify(days)
            }
            _ => RecencyStatus::NoDate,
        };

        // Remarks and bends over the same subset
        let mut tally = RemarkTally::default();
        let mut bends = BendAccumulator::default();
        for r in &relevant {
            tally.add(classifier, &r.remark);
            bends.add(&r.bends);
        }
        ind.remarks = tally.probabilities();
        ind.bends = bends.summary();

        ind.flags = flags;
        ind
    }

    /// Number of distinct entrants in the index
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of records the index was built from
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

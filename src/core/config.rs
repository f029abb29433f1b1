//! Model configuration
//!
//! Every hand-tuned constant of the time model lives here as one immutable
//! value handed to the predictor and simulator. Defaults reproduce the
//! production tuning; a JSON file can override any subset of fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::data::features::RecencyStatus;
use crate::error::ConfigError;
use crate::models::WeightSet;

/// Day thresholds separating the recency buckets (inclusive upper bounds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyThresholds {
    pub very_recent_days: i64,
    pub recent_days: i64,
    pub moderate_days: i64,
}

impl Default for RecencyThresholds {
    fn default() -> Self {
        Self {
            very_recent_days: 30,
            recent_days: 90,
            moderate_days: 180,
        }
    }
}

impl RecencyThresholds {
    pub fn classify(&self, days: i64) -> RecencyStatus {
        if days <= self.very_recent_days {
            RecencyStatus::VeryRecent
        } else if days <= self.recent_days {
            RecencyStatus::Recent
        } else if days <= self.moderate_days {
            RecencyStatus::Moderate
        } else {
            RecencyStatus::Old
        }
    }
}

/// Seconds added per recency bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyAdjustments {
    pub very_recent: f64,
    pub recent: f64,
    pub moderate: f64,
    pub old: f64,
    pub no_history: f64,
    pub no_date: f64,
}

impl Default for RecencyAdjustments {
    fn default() -> Self {
        Self {
            very_recent: 0.0,
            recent: 0.1,
            moderate: 0.2,
            old: 0.3,
            no_history: 0.5,
            no_date: 0.5,
        }
    }
}

impl RecencyAdjustments {
    pub fn get(&self, status: RecencyStatus) -> f64 {
        match status {
            RecencyStatus::VeryRecent => self.very_recent,
            RecencyStatus::Recent => self.recent,
            RecencyStatus::Moderate => self.moderate,
            RecencyStatus::Old => self.old,
            RecencyStatus::NoHistory => self.no_history,
            RecencyStatus::NoDate => self.no_date,
        }
    }
}

/// Tuned constants for the time model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub young_age_threshold: f64,
    pub old_age_threshold: f64,
    pub young_age_adjustment: f64,
    pub old_age_adjustment: f64,

    /// Keyed by upper-case sex code
    pub sex_adjustments: BTreeMap<String, f64>,
    pub default_sex_adjustment: f64,

    /// Seconds per box between the assigned box and the historical mean box
    pub box_position_factor: f64,

    /// Keyed by upper-case grade
    pub grade_adjustments: BTreeMap<String, f64>,
    pub default_grade_adjustment: f64,

    pub recency_thresholds: RecencyThresholds,
    pub recency_adjustments: RecencyAdjustments,

    pub remark_problem_coefficient: f64,
    pub remark_clear_run_coefficient: f64,
    pub problem_keywords: Vec<String>,
    pub clear_run_keywords: Vec<String>,

    pub bend_finisher_bonus: f64,
    pub bend_early_pace_penalty: f64,

    /// Total adjustment magnitude above which a warning is logged
    pub adjustment_warning_threshold: f64,

    pub default_weights: WeightSet,

    /// Track code -> race distance -> intermediate checkpoint distances
    pub checkpoints: BTreeMap<String, BTreeMap<u32, Vec<u32>>>,

    /// Display name -> track code used in the history file
    pub track_codes: BTreeMap<String, String>,
}

const PROBLEM_KEYWORDS: &[&str] = &[
    "awk", "awkward", "bd", "bdly", "blk", "blocked", "bmp", "bumped", "ck", "ckd", "ckds",
    "checked", "ckd sough", "cmofflm", "crd", "crowded", "crmp", "cramped", "dint", "dist", "disq",
    "dnf", "eased", "fcd-ck", "fcdwd", "fcd", "fcdw", "fd", "fdd", "imp", "impede", "ko",
    "knocked over", "lm", "lame", "lckd", "locked", "msdbk", "missed break", "outp", "outpaced",
    "rnoff", "ran off", "slaw", "slow away", "stkrl", "struck rail", "stmb", "stumbled", "stppd",
    "stopped", "tndintrps", "tangled in traps", "upwthtrps", "up with traps", "wtd", "weakened",
    "fcd-wd", "bmp rnin", "bmpd rnin", "bmpdrnin", "crd rnin", "ckd rnin", "bmprnin", "bmprnup",
    "crdrnin", "crdstt", "bmpd", "fcdck", "tangled",
];

const CLEAR_RUN_KEYWORDS: &[&str] = &[
    "ald", "all led", "clrrn", "clear run", "drwclr", "drew clear", "evaw", "even away", "evch",
    "even chase", "lftclr", "left clear", "qaw", "quick away", "rls", "rails", "rnon", "ran on",
    "snld", "soon led", "strfn", "strong finish", "styd", "stayed", "throut", "throughout", "vqaw",
    "very quick away", "fnwll", "finish well", "gdmiddle", "good middle", "hldon", "held on",
    "msdtrbl", "missed trouble", "chl", "chased leader", "ep", "early pace", "ld", "led", "rnin",
    "run-in",
];

fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn default_checkpoints() -> BTreeMap<String, BTreeMap<u32, Vec<u32>>> {
    let mut checkpoints: BTreeMap<String, BTreeMap<u32, Vec<u32>>> = BTreeMap::new();
    let mut add = |track: &str, distance: u32, points: &[u32]| {
        checkpoints
            .entry(track.to_string())
            .or_default()
            .insert(distance, points.to_vec());
    };

    add("Tow", 500, &[100, 250, 350, 450]);
    add("Har", 415, &[80, 120, 280, 320]);
    add("Har", 592, &[50, 150, 300, 450, 550]);
    add("ROM", 400, &[50, 150, 250, 350]);
    add("ROM", 575, &[50, 150, 300, 450, 525]);
    add("Sheff", 400, &[50, 150, 250, 350]);
    add("Sheff", 500, &[100, 250, 350, 450]);
    add("Monmr", 480, &[80, 240, 320, 400]);

    checkpoints
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            young_age_threshold: 2.5,
            old_age_threshold: 4.5,
            young_age_adjustment: 0.2,
            old_age_adjustment: 0.1,
            sex_adjustments: table(&[("M", 0.0), ("F", 0.1), ("D", 0.0), ("B", 0.1), ("N/A", 0.0)]),
            default_sex_adjustment: 0.0,
            box_position_factor: 0.03,
            grade_adjustments: table(&[
                ("A1", 0.0),
                ("A2", 0.1),
                ("A3", 0.2),
                ("A4", 0.3),
                ("A5", 0.4),
                ("A6", 0.5),
                ("A7", 0.6),
                ("A8", 0.7),
                ("A9", 0.8),
                ("A10", 0.9),
                ("OPEN", 0.0),
                ("STANDARD", 0.5),
                ("N/A", 0.5),
            ]),
            default_grade_adjustment: 0.5,
            recency_thresholds: RecencyThresholds::default(),
            recency_adjustments: RecencyAdjustments::default(),
            remark_problem_coefficient: 0.2,
            remark_clear_run_coefficient: 0.1,
            problem_keywords: PROBLEM_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            clear_run_keywords: CLEAR_RUN_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            bend_finisher_bonus: 0.07,
            bend_early_pace_penalty: 0.07,
            adjustment_warning_threshold: 1.0,
            default_weights: WeightSet::default(),
            checkpoints: default_checkpoints(),
            track_codes: [
                ("Romford", "ROM"),
                ("Towcester", "Tow"),
                ("Harlow", "Har"),
                ("Monmore", "Monmr"),
                ("Sheffield", "Sheff"),
            ]
            .iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect(),
        }
    }
}

impl ModelConfig {
    /// Load a JSON override file. Fields not present keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Intermediate checkpoints for a track code and distance, if configured
    pub fn checkpoints_for(&self, track: &str, distance: u32) -> Option<&[u32]> {
        self.checkpoints
            .get(track)
            .and_then(|by_distance| by_distance.get(&distance))
            .map(Vec::as_slice)
    }

    /// Map a display name to its history file code.
    ///
    /// Returns the code and whether the track was recognised at all, either as a
    /// display name or as a code already.
    pub fn resolve_track(&self, track: &str) -> (String, bool) {
        let trimmed = track.trim();
        if let Some(code) = self.track_codes.get(trimmed) {
            return (code.clone(), true);
        }
        let known_code = self.track_codes.values().any(|code| code == trimmed)
            || self.checkpoints.contains_key(trimmed);
        (trimmed.to_string(), known_code)
    }

    /// Sex adjustment, or None when the code is not in the table
    pub fn sex_adjustment(&self, sex: &str) -> Option<f64> {
        self.sex_adjustments
            .get(&sex.trim().to_uppercase())
            .copied()
    }

    /// Grade adjustment, or None when the grade is not in the table
    pub fn grade_adjustment(&self, grade: &str) -> Option<f64> {
        self.grade_adjustments
            .get(&grade.trim().to_uppercase())
            .copied()
    }
}

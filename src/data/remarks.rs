//! Running-style remark classification
//!
//! Matching is plain case-insensitive substring containment against two
//! keyword lists, so short abbreviations ("ck", "ld", "ep") also fire inside
//! longer unrelated words. Results depend on that, so keep it as is.

use serde::{Deserialize, Serialize};

/// Keyword membership of a single remark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemarkClass {
    pub problem: bool,
    pub clear_run: bool,
}

/// Classifies remarks against the problem and clear-run lexicons
#[derive(Debug, Clone)]
pub struct RemarkClassifier {
    problem_keywords: Vec<String>,
    clear_run_keywords: Vec<String>,
}

impl RemarkClassifier {
    pub fn new<S: AsRef<str>>(problem_keywords: &[S], clear_run_keywords: &[S]) -> Self {
        let lower = |words: &[S]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.as_ref().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            problem_keywords: lower(problem_keywords),
            clear_run_keywords: lower(clear_run_keywords),
        }
    }

    pub fn classify(&self, remark: &str) -> RemarkClass {
        let text = remark.to_lowercase();
        RemarkClass {
            problem: self.problem_keywords.iter().any(|k| text.contains(k.as_str())),
            clear_run: self.clear_run_keywords.iter().any(|k| text.contains(k.as_str())),
        }
    }
}

/// Running tally of remark classes over a filtered history
#[derive(Debug, Clone, Copy, Default)]
pub struct RemarkTally {
    pub with_remark: usize,
    pub problem: usize,
    pub clear_run: usize,
}

impl RemarkTally {
    /// Blank remarks do not count towards the denominator
    pub fn add(&mut self, classifier: &RemarkClassifier, remark: &str) {
        if remark.trim().is_empty() {
            return;
        }
        let class = classifier.classify(remark);
        self.with_remark += 1;
        if class.problem {
            self.problem += 1;
        }
        if class.clear_run {
            self.clear_run += 1;
        }
    }

    pub fn probabilities(&self) -> RemarkProbabilities {
        if self.with_remark == 0 {
            return RemarkProbabilities::default();
        }
        let total = self.with_remark as f64;
        RemarkProbabilities {
            problem: Some(self.problem as f64 / total),
            clear_run: Some(self.clear_run as f64 / total),
        }
    }
}

/// Fractions of remarked runs that matched each lexicon; None without remarks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemarkProbabilities {
    pub problem: Option<f64>,
    pub clear_run: Option<f64>,
}

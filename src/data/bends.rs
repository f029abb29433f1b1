//! Bend position analysis
//!
//! A bend string like "1222" lists an entrant's running position at each bend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary of one race's bend positions
#[derive(Debug, Clone, PartialEq)]
pub struct BendPositions {
    pub positions: Vec<u8>,
    pub mean: f64,
    pub last: u8,
    /// last - first; negative means places were gained
    pub difference: i32,
}

/// Parse a bend string, ignoring non-digit characters. None if no digits.
pub fn parse_bends(value: &str) -> Option<BendPositions> {
    let positions: Vec<u8> = value
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as u8)
        .collect();

    let first = *positions.first()?;
    let last = *positions.last()?;
    let mean = positions.iter().map(|&p| p as f64).sum::<f64>() / positions.len() as f64;

    Some(BendPositions {
        mean,
        last,
        difference: last as i32 - first as i32,
        positions,
    })
}

/// Qualitative running style from the mean bend difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BendStyle {
    /// Gains two or more places from first bend to last
    Finisher,
    /// Loses two or more places
    EarlyPace,
    Constant,
    #[serde(rename = "N/A")]
    Unknown,
}

impl BendStyle {
    pub fn from_difference(difference: Option<f64>) -> Self {
        match difference {
            None => BendStyle::Unknown,
            Some(d) if d < -1.0 => BendStyle::Finisher,
            Some(d) if d > 1.0 => BendStyle::EarlyPace,
            Some(_) => BendStyle::Constant,
        }
    }
}

impl fmt::Display for BendStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BendStyle::Finisher => "Finisher",
            BendStyle::EarlyPace => "EarlyPace",
            BendStyle::Constant => "Constant",
            BendStyle::Unknown => "N/A",
        };
        f.write_str(label)
    }
}

/// Bend statistics averaged over an entrant's relevant history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BendSummary {
    pub mean_position: Option<f64>,
    pub mean_last_position: Option<f64>,
    pub mean_difference: Option<f64>,
    pub style: BendStyle,
}

impl Default for BendSummary {
    fn default() -> Self {
        Self {
            mean_position: None,
            mean_last_position: None,
            mean_difference: None,
            style: BendStyle::Unknown,
        }
    }
}

/// Accumulates per-race bend positions into a summary
#[derive(Debug, Clone, Default)]
pub struct BendAccumulator {
    means: Vec<f64>,
    lasts: Vec<f64>,
    differences: Vec<f64>,
}

impl BendAccumulator {
    pub fn add(&mut self, bends: &str) {
        if let Some(parsed) = parse_bends(bends) {
            self.means.push(parsed.mean);
            self.lasts.push(parsed.last as f64);
            self.differences.push(parsed.difference as f64);
        }
    }

    pub fn summary(&self) -> BendSummary {
        let mean_difference = mean(&self.differences);
        BendSummary {
            mean_position: mean(&self.means),
            mean_last_position: mean(&self.lasts),
            mean_difference,
            style: BendStyle::from_difference(mean_difference),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bends_finisher() {
        let bends = parse_bends("4321").unwrap();
        assert_eq!(bends.positions, vec![4, 3, 2, 1]);
        assert!((bends.mean - 2.5).abs() < 1e-9);
        assert_eq!(bends.last, 1);
        assert_eq!(bends.difference, -3);
        assert_eq!(
            BendStyle::from_difference(Some(bends.difference as f64)),
            BendStyle::Finisher
        );
    }

    #[test]
    fn test_parse_bends_early_pace_and_constant() {
        let early = parse_bends("1234").unwrap();
        assert_eq!(early.difference, 3);
        assert_eq!(
            BendStyle::from_difference(Some(early.difference as f64)),
            BendStyle::EarlyPace
        );

        let constant = parse_bends("2332").unwrap();
        assert_eq!(constant.difference, 0);
        assert_eq!(
            BendStyle::from_difference(Some(constant.difference as f64)),
            BendStyle::Constant
        );
    }

    #[test]
    fn test_parse_bends_ignores_non_digits() {
        let bends = parse_bends(" 1-2-2-2 ").unwrap();
        assert_eq!(bends.positions, vec![1, 2, 2, 2]);
        assert!(parse_bends("").is_none());
        assert!(parse_bends("--").is_none());
    }

    #[test]
    fn test_style_boundaries() {
        assert_eq!(BendStyle::from_difference(Some(-1.0)), BendStyle::Constant);
        assert_eq!(BendStyle::from_difference(Some(1.0)), BendStyle::Constant);
        assert_eq!(BendStyle::from_difference(Some(-1.5)), BendStyle::Finisher);
        assert_eq!(BendStyle::from_difference(None), BendStyle::Unknown);
        assert_eq!(BendStyle::Unknown.to_string(), "N/A");
    }

    #[test]
    fn test_accumulator_summary() {
        let mut acc = BendAccumulator::default();
        acc.add("4321");
        acc.add("2332");
        acc.add("");
        let summary = acc.summary();
        assert!((summary.mean_position.unwrap() - 2.5).abs() < 1e-9);
        assert!((summary.mean_last_position.unwrap() - 1.5).abs() < 1e-9);
        assert!((summary.mean_difference.unwrap() + 1.5).abs() < 1e-9);
        assert_eq!(summary.style, BendStyle::Finisher);

        assert_eq!(BendAccumulator::default().summary(), BendSummary::default());
    }
}

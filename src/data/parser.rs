//! Cell-level parsers for the history file
//!
//! Every parser is lenient: a malformed cell becomes `None` and never fails the
//! row. Only the entrant name decides whether a row is kept at all.

use chrono::NaiveDate;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::data::csv_loader::Age;

/// Lower-case, trim and strip diacritics so names match across spellings
///
/// # Examples
/// ```
/// use greyhound::data::parser::normalize_name;
/// assert_eq!(normalize_name("  Ballymac Éile "), "ballymac eile");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

fn positive(value: f64) -> Option<f64> {
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Parser for the typed columns of a history row
pub struct CellParser {
    leading_digits: Regex,
    digit_run: Regex,
    leading_decimal: Regex,
    date: Regex,
}

impl Default for CellParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CellParser {
    pub fn new() -> Self {
        Self {
            leading_digits: Regex::new(r"^\d+").unwrap(),
            digit_run: Regex::new(r"\d+").unwrap(),
            leading_decimal: Regex::new(r"^\d*\.?\d*").unwrap(),
            date: Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap(),
        }
    }

    /// "480", "480m" and "480 metres" all give 480
    pub fn parse_distance(&self, value: &str) -> Option<u32> {
        self.leading_digits
            .find(value.trim())
            .and_then(|m| m.as_str().parse().ok())
            .filter(|d| *d > 0)
    }

    /// Finish time in seconds, comma accepted as decimal separator
    pub fn parse_time(&self, value: &str) -> Option<f64> {
        let cleaned = value.trim().replace(',', ".");
        if cleaned.is_empty() {
            return None;
        }
        cleaned.parse::<f64>().ok().and_then(positive)
    }

    /// Sectional time: the leading numeric part of the cell ("4.95", "4,95 (2)")
    pub fn parse_sectional(&self, value: &str) -> Option<f64> {
        let cleaned = value.trim().replace(',', ".");
        let number = self.leading_decimal.find(&cleaned)?.as_str();
        if number.is_empty() || number == "." {
            return None;
        }
        number.parse::<f64>().ok().and_then(positive)
    }

    /// Box from free text: "[3]", "box 3", "3". Only boxes 1-6 are kept.
    pub fn parse_box(&self, value: &str) -> Option<u8> {
        self.digit_run
            .find(value)
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .filter(|b| (1..=6).contains(b))
    }

    /// Finishing position with ordinal suffixes and brackets stripped ("1st" -> 1)
    pub fn parse_position(&self, value: &str) -> Option<u32> {
        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        digits.parse::<u32>().ok().filter(|p| *p > 0)
    }

    /// Numeric years when possible, otherwise the raw text
    pub fn parse_age(&self, value: &str) -> Option<Age> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(years) if years.is_finite() => Some(Age::Years(years)),
            _ => Some(Age::Text(trimmed.to_string())),
        }
    }

    /// DD/MM/YYYY only; anything else is None
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let caps = self.date.captures(value.trim())?;
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

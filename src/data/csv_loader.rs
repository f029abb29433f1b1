//! CSV loading for historical race records
//!
//! The whole file is read into memory, decoded and sniffed before polars sees
//! it. Every column is read as text and typed by [`CellParser`] so a bad cell
//! only loses that one field.

use chrono::NaiveDate;
use encoding_rs::WINDOWS_1252;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::core::diagnostics::Diagnostics;
use crate::data::parser::{normalize_name, CellParser};
use crate::error::IngestError;

/// Accepted header spellings for the entrant name. Matching ignores case.
const NAME_COLUMNS: &[&str] = &["NUME", "NAME"];

const DATE_COLUMNS: &[&str] = &["DATA", "DATE"];
const TRACK_COLUMNS: &[&str] = &["PISTA", "TRACK"];
const DISTANCE_COLUMNS: &[&str] = &["DISTANTA", "DISTANCE"];
const GRADE_COLUMNS: &[&str] = &["GRAD", "GRADE"];
const BOX_COLUMNS: &[&str] = &["BOXA", "BOX", "TRAP"];
const SECTIONAL_COLUMNS: &[&str] = &["SECTIONAL", "SPLIT"];
const POSITION_COLUMNS: &[&str] = &["POZITIE", "POSITION"];
const TIME_COLUMNS: &[&str] = &["FINAL", "TIME"];
const AGE_COLUMNS: &[&str] = &["VARSTA", "AGE"];
const SEX_COLUMNS: &[&str] = &["SEX"];
const REMARK_COLUMNS: &[&str] = &["REMARK", "REMARKS"];
const BEND_COLUMNS: &[&str] = &["CURBA", "BENDS"];

const CANDIDATE_SEPARATORS: [u8; 3] = [b',', b';', b'\t'];

/// Age as recorded: numeric years when parseable, otherwise the raw text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    Years(f64),
    Text(String),
}

impl Age {
    pub fn years(&self) -> Option<f64> {
        match self {
            Age::Years(years) => Some(*years),
            Age::Text(_) => None,
        }
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Age::Years(years) => write!(f, "{}", years),
            Age::Text(text) => f.write_str(text),
        }
    }
}

/// One row of the history file
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRaceRecord {
    pub name: String,
    /// Matching key, see [`normalize_name`]
    pub normalized_name: String,
    pub track: String,
    pub distance: Option<u32>,
    pub grade: String,
    pub box_no: Option<u8>,
    pub sectional: Option<f64>,
    pub position: Option<u32>,
    pub finish_time: Option<f64>,
    pub age: Option<Age>,
    pub sex: String,
    pub date: Option<NaiveDate>,
    pub remark: String,
    pub bends: String,
}

/// Parsed records plus the non-fatal warnings raised while reading them
#[derive(Debug, Clone, Default)]
pub struct HistoryLoad {
    pub records: Vec<HistoricalRaceRecord>,
    pub diagnostics: Diagnostics,
}

/// Load and parse a history file from disk
pub fn load_history<P: AsRef<Path>>(path: P) -> Result<HistoryLoad, IngestError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IngestError::NotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    parse_history_bytes(&bytes, &source_name)
}

/// Parse history records from an in-memory buffer
///
/// `source_name` only appears in messages.
pub fn parse_history_bytes(bytes: &[u8], source_name: &str) -> Result<HistoryLoad, IngestError> {
    let mut diagnostics = Diagnostics::new();

    let text = decode(bytes, source_name, &mut diagnostics);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let header_line = text.lines().next().unwrap_or("");
    if header_line.trim().is_empty() {
        return Err(IngestError::Empty(source_name.to_string()));
    }

    let separator = sniff_separator(header_line);
    if header_line
        .split(separator as char)
        .all(|field| field.trim().trim_matches('"').is_empty())
    {
        return Err(IngestError::MissingHeader(source_name.to_string()));
    }
    debug!(
        "Reading '{}' with separator {:?}",
        source_name, separator as char
    );

    let malformed = |source: PolarsError| IngestError::Malformed {
        source_name: source_name.to_string(),
        source,
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_truncate_ragged_lines(true),
        )
        .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
        .finish()
        .map_err(malformed)?;

    let columns = HistoryColumns::locate(&df, source_name).and_then(|located| {
        located.ok_or_else(|| IngestError::MissingNameColumn {
            source_name: source_name.to_string(),
            header: df
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
        })
    })?;

    let parser = CellParser::new();
    let mut records = Vec::with_capacity(df.height());
    let mut bad_dates = 0usize;
    let mut first_bad_date: Option<(usize, String)> = None;

    for i in 0..df.height() {
        let name = cell(Some(columns.name), i).trim();
        if name.is_empty() {
            continue;
        }

        let raw_date = cell(columns.date, i).trim();
        let date = parser.parse_date(raw_date);
        if date.is_none() && !raw_date.is_empty() {
            bad_dates += 1;
            if first_bad_date.is_none() {
                // header is line 1
                first_bad_date = Some((i + 2, raw_date.to_string()));
            }
        }

        records.push(HistoricalRaceRecord {
            name: name.to_string(),
            normalized_name: normalize_name(name),
            track: cell(columns.track, i).trim().to_string(),
            distance: parser.parse_distance(cell(columns.distance, i)),
            grade: cell(columns.grade, i).trim().to_string(),
            box_no: parser.parse_box(cell(columns.box_no, i)),
            sectional: parser.parse_sectional(cell(columns.sectional, i)),
            position: parser.parse_position(cell(columns.position, i)),
            finish_time: parser.parse_time(cell(columns.finish_time, i)),
            age: parser.parse_age(cell(columns.age, i)),
            sex: cell(columns.sex, i).trim().to_string(),
            date,
            remark: cell(columns.remark, i).trim().to_string(),
            bends: cell(columns.bends, i).trim().to_string(),
        });
    }

    if let Some((line, value)) = first_bad_date {
        diagnostics.warn(format!(
            "{} row(s) in '{}' have a date not in DD/MM/YYYY format and were kept without a date (first at line {}: '{}')",
            bad_dates, source_name, line, value
        ));
    }

    if records.is_empty() {
        diagnostics.warn(format!(
            "'{}' has a header but no parseable data rows",
            source_name
        ));
    } else {
        diagnostics.info(format!(
            "Loaded {} records from '{}'",
            records.len(),
            source_name
        ));
    }

    Ok(HistoryLoad {
        records,
        diagnostics,
    })
}

/// Decode as UTF-8, falling back to Windows-1252 for legacy exports
fn decode(bytes: &[u8], source_name: &str, diagnostics: &mut Diagnostics) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            diagnostics.warn(format!(
                "'{}' is not valid UTF-8; decoding as Windows-1252",
                source_name
            ));
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

/// Pick the candidate separator occurring most often in the header; comma on ties
fn sniff_separator(header_line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = 0;
    for sep in CANDIDATE_SEPARATORS {
        let count = header_line.bytes().filter(|b| *b == sep).count();
        if count > best_count {
            best = sep;
            best_count = count;
        }
    }
    best
}

fn cell(column: Option<&StringChunked>, row: usize) -> &str {
    column.and_then(|c| c.get(row)).unwrap_or("")
}

/// Text columns of the frame resolved through their accepted header spellings
struct HistoryColumns<'a> {
    name: &'a StringChunked,
    date: Option<&'a StringChunked>,
    track: Option<&'a StringChunked>,
    distance: Option<&'a StringChunked>,
    grade: Option<&'a StringChunked>,
    box_no: Option<&'a StringChunked>,
    sectional: Option<&'a StringChunked>,
    position: Option<&'a StringChunked>,
    finish_time: Option<&'a StringChunked>,
    age: Option<&'a StringChunked>,
    sex: Option<&'a StringChunked>,
    remark: Option<&'a StringChunked>,
    bends: Option<&'a StringChunked>,
}

impl<'a> HistoryColumns<'a> {
    /// Ok(None) when the frame has no name column
    fn locate(df: &'a DataFrame, source_name: &str) -> Result<Option<Self>, IngestError> {
        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let find = |aliases: &[&str]| -> Result<Option<&'a StringChunked>, IngestError> {
            let found = aliases.iter().find_map(|alias| {
                headers
                    .iter()
                    .find(|header| header_key(header) == *alias)
            });
            match found {
                Some(header) => df
                    .column(header)
                    .and_then(|series| series.str())
                    .map(Some)
                    .map_err(|source| IngestError::Malformed {
                        source_name: source_name.to_string(),
                        source,
                    }),
                None => Ok(None),
            }
        };

        let name = match find(NAME_COLUMNS)? {
            Some(name) => name,
            None => return Ok(None),
        };

        Ok(Some(Self {
            name,
            date: find(DATE_COLUMNS)?,
            track: find(TRACK_COLUMNS)?,
            distance: find(DISTANCE_COLUMNS)?,
            grade: find(GRADE_COLUMNS)?,
            box_no: find(BOX_COLUMNS)?,
            sectional: find(SECTIONAL_COLUMNS)?,
            position: find(POSITION_COLUMNS)?,
            finish_time: find(TIME_COLUMNS)?,
            age: find(AGE_COLUMNS)?,
            sex: find(SEX_COLUMNS)?,
            remark: find(REMARK_COLUMNS)?,
            bends: find(BEND_COLUMNS)?,
        }))
    }
}

fn header_key(header: &str) -> String {
    header.trim().trim_start_matches('\u{feff}').trim().to_uppercase()
}

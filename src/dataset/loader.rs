//! Delimited-text readers for the event and country tables
//!
//! Columns are located by header name, so column order in the file is free.
//! Quoted fields follow the usual CSV convention (`"a,b"`, `""` for a literal
//! quote) but records may not span lines.

use crate::dataset::records::{Group, LandingPage, RawCountry, RawEvent};
use crate::error::{AnalysisError, Result};
use chrono::{DateTime, NaiveDateTime};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const EVENT_COLUMNS: [&str; 5] = ["user_id", "timestamp", "group", "landing_page", "converted"];
pub const COUNTRY_COLUMNS: [&str; 2] = ["user_id", "country"];

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Read the event table from a file
pub fn load_events<P: AsRef<Path>>(path: P, delimiter: char) -> Result<Vec<RawEvent>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_events(BufReader::new(file), &path.display().to_string(), delimiter)
}

/// Read the country lookup table from a file
pub fn load_countries<P: AsRef<Path>>(path: P, delimiter: char) -> Result<Vec<RawCountry>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_countries(BufReader::new(file), &path.display().to_string(), delimiter)
}

/// Parse event rows; `source` names the table in error messages
pub fn parse_events<R: BufRead>(reader: R, source: &str, delimiter: char) -> Result<Vec<RawEvent>> {
    let table = Table::read(reader, source, delimiter, &EVENT_COLUMNS)?;
    let mut events = Vec::with_capacity(table.rows.len());

    for (row, fields) in table.rows.iter() {
        let cell = |column: usize| table.cell(fields, column);
        let at = |column: &str| format!("{} row {}, column {}", source, row, column);

        let timestamp = cell(1)
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| AnalysisError::data_integrity(at("timestamp"), e))?;
        let group = cell(2)
            .map(str::parse::<Group>)
            .transpose()
            .map_err(|e| AnalysisError::data_integrity(at("group"), e))?;
        let landing_page = cell(3)
            .map(str::parse::<LandingPage>)
            .transpose()
            .map_err(|e| AnalysisError::data_integrity(at("landing_page"), e))?;
        let converted = cell(4)
            .map(parse_converted)
            .transpose()
            .map_err(|e| AnalysisError::data_integrity(at("converted"), e))?;

        events.push(RawEvent {
            user_id: cell(0).map(str::to_string),
            timestamp,
            group,
            landing_page,
            converted,
        });
    }

    Ok(events)
}

/// Parse country rows; `source` names the table in error messages
pub fn parse_countries<R: BufRead>(
    reader: R,
    source: &str,
    delimiter: char,
) -> Result<Vec<RawCountry>> {
    let table = Table::read(reader, source, delimiter, &COUNTRY_COLUMNS)?;
    Ok(table
        .rows
        .iter()
        .map(|(_, fields)| RawCountry {
            user_id: table.cell(fields, 0).map(str::to_string),
            country: table.cell(fields, 1).map(str::to_string),
        })
        .collect())
}

/// Parse a timestamp in any of the accepted layouts
pub fn parse_timestamp(value: &str) -> std::result::Result<NaiveDateTime, String> {
    let value = value.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.naive_utc())
        .map_err(|_| {
            format!(
                "unparseable timestamp '{}' (expected YYYY-MM-DD HH:MM:SS[.f] or RFC 3339)",
                value
            )
        })
}

fn parse_converted(value: &str) -> std::result::Result<bool, String> {
    match value.trim() {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(format!(
            "invalid converted value '{}' (expected 0, 1, true or false)",
            other
        )),
    }
}

/// Header-indexed rows of one table
struct Table {
    /// Position of each required column in a row
    positions: Vec<usize>,
    /// (1-based data row number, fields)
    rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    fn read<R: BufRead>(reader: R, source: &str, delimiter: char, required: &[&str]) -> Result<Self> {
        let mut lines = reader.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((idx, line)) => {
                    let line = line.map_err(|e| {
                        AnalysisError::data_integrity(format!("{} line {}", source, idx + 1), e.to_string())
                    })?;
                    if !line.trim().is_empty() {
                        break split_record(&line, delimiter).map_err(|e| {
                            AnalysisError::data_integrity(format!("{} header", source), e)
                        })?;
                    }
                }
                None => {
                    return Err(AnalysisError::data_integrity(
                        source,
                        "table is empty (no header row)",
                    ))
                }
            }
        };

        let header: Vec<String> = header
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        let mut positions = Vec::with_capacity(required.len());
        let mut missing = Vec::new();
        for column in required {
            match header.iter().position(|h| h == column) {
                Some(pos) => positions.push(pos),
                None => missing.push(*column),
            }
        }
        if !missing.is_empty() {
            return Err(AnalysisError::data_integrity(
                source,
                format!(
                    "missing columns {:?} (required: {})",
                    missing,
                    required.join(", ")
                ),
            ));
        }

        let mut rows = Vec::new();
        let mut row_number = 0;
        for (idx, line) in lines {
            let line = line.map_err(|e| {
                AnalysisError::data_integrity(format!("{} line {}", source, idx + 1), e.to_string())
            })?;
            if line.trim().is_empty() {
                continue;
            }
            row_number += 1;
            let fields = split_record(&line, delimiter).map_err(|e| {
                AnalysisError::data_integrity(format!("{} row {}", source, row_number), e)
            })?;
            rows.push((row_number, fields));
        }

        Ok(Self { positions, rows })
    }

    /// Trimmed cell for a required column; `None` when empty or absent
    fn cell<'a>(&self, fields: &'a [String], column: usize) -> Option<&'a str> {
        fields
            .get(self.positions[column])
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
    }
}

/// Split one line into fields, honoring double quotes
pub fn split_record(line: &str, delimiter: char) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.trim().is_empty() {
            field.clear();
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

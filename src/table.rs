//! Raw tabular period sources.
//!
//! A period arrives as one spreadsheet, either an `.xlsx` workbook sheet or a
//! CSV export: a header row, then one row per participant. Cells stay as
//! strings here; interpretation is left to the extractor and the club
//! decomposer.

use crate::error::{LeaderboardError, Result};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;

/// One period's sheet, headers and rows as read.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTable {
    pub period: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Interpretation of a numeric cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Blank,
    Number(f64),
    /// Present but not a usable non-negative number.
    Invalid,
}

impl CellValue {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "-" {
            return CellValue::Blank;
        }
        match trimmed.replace(',', "").parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => CellValue::Number(v),
            _ => CellValue::Invalid,
        }
    }

    /// The value used for scoring: blanks and invalid cells count as zero.
    pub fn score(&self) -> f64 {
        match self {
            CellValue::Number(v) => *v,
            _ => 0.0,
        }
    }
}

impl PeriodTable {
    pub fn new(period: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            period: period.to_string(),
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    /// Read a source, picking the reader by file extension. `sheet` only
    /// applies to workbooks; without it the first sheet is used.
    pub fn read(path: &Path, period: &str, sheet: Option<&str>) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("xlsx" | "xlsm" | "xls" | "ods") => Self::read_workbook(path, period, sheet),
            _ => Self::read_csv(path, period),
        }
    }

    /// Read one sheet of a workbook. The first non-empty row is the header.
    pub fn read_workbook(path: &Path, period: &str, sheet: Option<&str>) -> Result<Self> {
        let workbook_err = |message: String| LeaderboardError::Workbook {
            path: path.display().to_string(),
            message,
        };
        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_err(e.to_string()))?;
        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| workbook_err("workbook has no sheets".to_string()))?,
        };
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| workbook_err(format!("sheet '{}': {}", sheet_name, e)))?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
        let headers = rows.next().unwrap_or_default();
        let rows: Vec<Vec<String>> = rows.collect();

        log::info!(
            "Read period '{}' from sheet '{}': {} columns, {} rows",
            period,
            sheet_name,
            headers.len(),
            rows.len()
        );
        Ok(Self::new(period, headers, rows))
    }

    /// Read a CSV export. A UTF-8 byte order mark is stripped and rows may be ragged.
    pub fn read_csv(path: &Path, period: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| LeaderboardError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_csv(raw.trim_start_matches('\u{feff}'), period).map_err(|e| match e {
            LeaderboardError::Csv { source, .. } => LeaderboardError::Csv {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn parse_csv(data: &str, period: &str) -> Result<Self> {
        let csv_err = |source| LeaderboardError::Csv {
            path: format!("<{}>", period),
            source,
        };
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(csv_err)?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }

        log::info!("Read period '{}': {} columns, {} rows", period, headers.len(), rows.len());
        Ok(Self::new(period, headers, rows))
    }

    /// Cell text, empty when the row is shorter than the header.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn header(&self, col: usize) -> &str {
        self.headers.get(col).map(|s| s.as_str()).unwrap_or("")
    }

    /// First column whose header equals one of `names` (case-insensitive).
    pub fn find_exact(&self, names: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    }

    /// First column whose header contains one of `needles` (case-insensitive).
    pub fn find_containing(&self, needles: &[&str]) -> Option<usize> {
        self.headers.iter().position(|h| {
            let lower = h.to_lowercase();
            needles.iter().any(|n| lower.contains(&n.to_lowercase()))
        })
    }
}

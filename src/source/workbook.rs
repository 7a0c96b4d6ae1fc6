//! Series loading from spreadsheet workbooks.
//!
//! The loader only reads: it opens the workbook, selects the analysis sheet
//! and hands back its two leading columns as [`RawSeries`] cells. Header
//! detection, numeric validation and sorting belong to feature extraction.

use crate::source::types::{Cell, RawSeries, Unit};
use calamine::{open_workbook_auto, Data, Reader};

/// Source of raw (time, value) rows for one unit.
///
/// Implementations must be shareable across worker threads; they are
/// read-only once constructed.
pub trait SeriesLoader: Send + Sync {
    fn load(&self, unit: &Unit) -> Result<RawSeries, LoadError>;
}

/// Loads the named sheet of an xlsx/xls/ods workbook.
#[derive(Debug, Clone)]
pub struct WorkbookLoader {
    section_name: String,
}

impl WorkbookLoader {
    pub fn new(section_name: impl Into<String>) -> Self {
        Self {
            section_name: section_name.into(),
        }
    }

    pub fn section_name(&self) -> &str {
        &self.section_name
    }
}

impl SeriesLoader for WorkbookLoader {
    fn load(&self, unit: &Unit) -> Result<RawSeries, LoadError> {
        let mut workbook = open_workbook_auto(&unit.path).map_err(|e| LoadError::Open {
            path: unit.path.display().to_string(),
            message: e.to_string(),
        })?;

        let sheet_names = workbook.sheet_names();
        if !sheet_names.iter().any(|n| n == &self.section_name) {
            return Err(LoadError::MissingSection {
                section: self.section_name.clone(),
                available: sheet_names,
            });
        }

        let range = workbook
            .worksheet_range(&self.section_name)
            .map_err(|e| LoadError::Read {
                section: self.section_name.clone(),
                message: e.to_string(),
            })?;

        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>());
        let raw = raw_series_from_rows(rows)?;

        tracing::debug!(unit = %unit.id, rows = raw.len(), "loaded sheet");
        Ok(raw)
    }
}

/// Convert a calamine cell.
fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::Error(e) => Cell::Text(format!("{e:?}")),
        Data::Empty => Cell::Empty,
    }
}

/// Keep the first two columns of each row; fully blank rows are dropped.
fn raw_series_from_rows<I>(rows: I) -> Result<RawSeries, LoadError>
where
    I: IntoIterator<Item = Vec<Cell>>,
{
    let mut out = Vec::new();
    for (idx, row) in rows.into_iter().enumerate() {
        if row.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        let mut cells = row.into_iter();
        match (cells.next(), cells.next()) {
            (Some(time), Some(value)) => out.push((time, value)),
            _ => return Err(LoadError::MissingColumns { row: idx + 1 }),
        }
    }
    Ok(RawSeries::new(out))
}

/// Errors that can occur while loading a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The file could not be opened as a workbook
    Open { path: String, message: String },
    /// The analysis sheet does not exist
    MissingSection {
        section: String,
        available: Vec<String>,
    },
    /// The analysis sheet exists but could not be read
    Read { section: String, message: String },
    /// A row has fewer than two columns
    MissingColumns { row: usize },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Open { path, message } => {
                write!(f, "cannot open workbook {path}: {message}")
            }
            LoadError::MissingSection { section, available } => write!(
                f,
                "{section} sheet not found (available: {})",
                available.join(", ")
            ),
            LoadError::Read { section, message } => {
                write!(f, "cannot read {section} sheet: {message}")
            }
            LoadError::MissingColumns { row } => {
                write!(f, "row {row} has fewer than two columns (time, signal)")
            }
        }
    }
}

impl std::error::Error for LoadError {}

//! Data types produced by the source layer.
//!
//! A unit is one input file. Loading a unit yields a [`RawSeries`]: the two
//! leading columns of the analysis sheet exactly as stored, before any header
//! stripping, numeric validation or sorting.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One input unit (a single signal file).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Unit {
    /// File name, used as the identifier in results and for ordering
    pub id: String,
    /// Full path to the file
    pub path: PathBuf,
}

impl Unit {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Build a unit from a path, using its file name as the identifier.
    pub fn from_path(path: &Path) -> Self {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::new(id, path)
    }
}

/// A single spreadsheet cell, reduced to what the extractor cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// Numeric value of the cell, accepting numeric text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s:?}"),
            Cell::Empty => write!(f, "<empty>"),
        }
    }
}

/// Two-column (time, value) rows as read from the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub rows: Vec<(Cell, Cell)>,
}

impl RawSeries {
    pub fn new(rows: Vec<(Cell, Cell)>) -> Self {
        Self { rows }
    }

    /// Build a raw series from already-numeric (time, value) pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Self {
            rows: pairs
                .into_iter()
                .map(|(t, v)| (Cell::Number(t), Cell::Number(v)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A numeric (time, value) sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Time in milliseconds
    pub time: f64,
    /// Signal value
    pub value: f64,
}

/// A time-sorted numeric series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// Build a series, stably sorting the samples by time.
    pub fn from_samples(mut samples: Vec<Sample>) -> Self {
        samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the first sample whose time equals `time` exactly.
    pub fn position_of_time(&self, time: f64) -> Option<usize> {
        self.samples.iter().position(|s| s.time == time)
    }
}

//! Input side of the detector.
//!
//! This module contains:
//! - Unit discovery (folder scan with a case-insensitive extension filter)
//! - The `SeriesLoader` boundary and its workbook implementation
//! - Raw and numeric series types

pub mod discovery;
pub mod types;
pub mod workbook;

// Re-export commonly used types
pub use discovery::{discover_units, DiscoveryError};
pub use types::{Cell, RawSeries, Sample, Series, Unit};
pub use workbook::{LoadError, SeriesLoader, WorkbookLoader};

//! Reporting of batch results.
//!
//! This module provides run tallies, the `ResultSink` consumers used by the
//! CLI, and the exportable JSON run report.

pub mod log;
pub mod sink;

// Re-export commonly used types
pub use log::{RunLog, RunStats};
pub use sink::{
    ConsoleSink, JsonLinesSink, ResultRecord, ResultSink, RunReport, END_BANNER, START_BANNER,
};

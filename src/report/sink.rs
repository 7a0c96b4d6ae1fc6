//! Result consumers.
//!
//! Sinks drain the ordered result stream and render each result as it
//! arrives. Rendering is independent of how fast the batch produces results.

use crate::core::batch::{ClassificationResult, Severity};
use crate::report::log::RunStats;
use crate::scoring::model::Label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Opening banner for console output.
pub const START_BANNER: &str = "===== FAULT DETECTION RESULTS =====";

/// Closing banner for console output.
pub const END_BANNER: &str = "===== INFERENCE COMPLETED =====";

/// Consumer of labeled results.
pub trait ResultSink {
    /// Called once before the first result.
    fn begin(&mut self, total: usize) -> io::Result<()>;

    /// Called once per result, in emission order.
    fn record(&mut self, result: &ClassificationResult) -> io::Result<()>;

    /// Called once after the last result.
    fn finish(&mut self, stats: &RunStats, cancelled: bool) -> io::Result<()>;
}

/// Line-oriented console output with a three-way marker and banners.
pub struct ConsoleSink<W: Write> {
    out: W,
    color: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, color: false }
    }

    /// Enable ANSI colors (green normal, red fault, yellow error).
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Marker and ANSI color code for a severity.
    fn style(severity: Severity) -> (&'static str, &'static str) {
        match severity {
            Severity::Normal => ("✓", "32"),
            Severity::Fault => ("⚠", "31"),
            Severity::Error => ("✗", "33"),
        }
    }

    /// Render one result line without the trailing newline.
    pub fn render(&self, result: &ClassificationResult) -> String {
        let (marker, code) = Self::style(result.severity());
        let detail = match result.label() {
            Some(Label::Fault) => " (stuck-at-zero)",
            _ => "",
        };
        let line = format!("{marker} {result}{detail}");
        if self.color {
            format!("\x1b[{code}m{line}\x1b[0m")
        } else {
            line
        }
    }
}

impl<W: Write> ResultSink for ConsoleSink<W> {
    fn begin(&mut self, total: usize) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{START_BANNER}")?;
        writeln!(self.out, "Units: {total}")?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn record(&mut self, result: &ClassificationResult) -> io::Result<()> {
        let line = self.render(result);
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    fn finish(&mut self, stats: &RunStats, cancelled: bool) -> io::Result<()> {
        writeln!(self.out)?;
        if cancelled {
            writeln!(self.out, "Cancelled after {} unit(s)", stats.total)?;
        }
        writeln!(
            self.out,
            "Normal: {}  Fault: {}  Error: {}",
            stats.normal, stats.fault, stats.errors
        )?;
        writeln!(self.out, "{END_BANNER}")?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// One JSON object per result.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn begin(&mut self, _total: usize) -> io::Result<()> {
        Ok(())
    }

    fn record(&mut self, result: &ClassificationResult) -> io::Result<()> {
        let json = serde_json::to_string(&ResultRecord::from(result)).map_err(io::Error::other)?;
        writeln!(self.out, "{json}")?;
        self.out.flush()
    }

    fn finish(&mut self, _stats: &RunStats, _cancelled: bool) -> io::Result<()> {
        self.out.flush()
    }
}

/// Serializable form of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub unit_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ClassificationResult> for ResultRecord {
    fn from(result: &ClassificationResult) -> Self {
        let status = match result.severity() {
            Severity::Normal => "normal",
            Severity::Fault => "fault",
            Severity::Error => "error",
        };
        Self {
            unit_id: result.unit_id.clone(),
            status: status.to_string(),
            label: result.label(),
            stage: result.error().map(|e| e.stage().to_string()),
            error: result.error().map(|e| e.to_string()),
        }
    }
}

/// Full record of a run, written as pretty JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub producer: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub cancelled: bool,
    pub stats: RunStats,
    pub results: Vec<ResultRecord>,
}

impl RunReport {
    pub fn new(stats: RunStats, data_dir: &Path, model_dir: &Path) -> Self {
        Self {
            run_id: stats.run_id,
            producer: format!("{} {}", crate::PRODUCER_NAME, crate::VERSION),
            started_at: stats.started_at,
            finished_at: Utc::now(),
            data_dir: data_dir.to_path_buf(),
            model_dir: model_dir.to_path_buf(),
            cancelled: false,
            stats,
            results: Vec::new(),
        }
    }

    /// Write the report, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)
    }
}

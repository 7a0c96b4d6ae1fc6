//! Run-level tallies.
//!
//! Counts how many units ended up NORMAL, FAULT or in error during one run.
//! Counters are atomic so a log can be recorded through a shared reference.

use crate::core::batch::{ClassificationResult, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counters for the current run.
#[derive(Debug)]
pub struct RunLog {
    /// Identifier of this run, repeated in exported reports
    run_id: Uuid,
    /// Units classified NORMAL
    normal: AtomicU64,
    /// Units classified FAULT
    fault: AtomicU64,
    /// Units that could not be evaluated
    errors: AtomicU64,
    /// Run start time
    started_at: DateTime<Utc>,
}

impl RunLog {
    /// Create a new run log.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            normal: AtomicU64::new(0),
            fault: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record one result.
    pub fn record(&self, result: &ClassificationResult) {
        let counter = match result.severity() {
            Severity::Normal => &self.normal,
            Severity::Fault => &self.fault,
            Severity::Error => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        let normal = self.normal.load(Ordering::Relaxed);
        let fault = self.fault.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        RunStats {
            run_id: self.run_id,
            normal,
            fault,
            errors,
            total: normal + fault + errors,
            started_at: self.started_at,
            duration_ms: (Utc::now() - self.started_at).num_milliseconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Units processed: {}\n\
             - Normal: {}\n\
             - Faulty (stuck-at-zero): {}\n\
             - Errors: {}\n\
             - Duration: {} ms",
            stats.total, stats.normal, stats.fault, stats.errors, stats.duration_ms
        )
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub normal: u64,
    pub fault: u64,
    pub errors: u64,
    pub total: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

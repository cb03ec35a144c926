//! Statistics tracking for a batch run.
//!
//! Rows are processed one at a time, so the tracker is owned by the batch
//! loop and updated through `&mut self`.

use crate::request::Classification;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Statistics tracker for a batch run.
#[derive(Debug)]
pub struct StatsTracker {
    /// Start time of processing.
    start_time: Instant,
    /// Total rows in the input table.
    total_rows: usize,
    /// Rows classified successfully.
    success_count: usize,
    /// Rows recorded as errors.
    failure_count: usize,
    /// Successful rows per classification.
    per_class: BTreeMap<&'static str, usize>,
    /// Summed call latency across all rows.
    total_latency: Duration,
}

impl StatsTracker {
    /// Create a tracker for a table of `total_rows` rows.
    #[must_use]
    pub fn new(total_rows: usize) -> Self {
        Self {
            start_time: Instant::now(),
            total_rows,
            success_count: 0,
            failure_count: 0,
            per_class: Classification::ALL
                .iter()
                .map(|c| (c.as_str(), 0))
                .collect(),
            total_latency: Duration::ZERO,
        }
    }

    /// Record a successfully classified row.
    pub fn record_success(&mut self, classification: Classification, latency: Duration) {
        self.success_count += 1;
        *self.per_class.entry(classification.as_str()).or_insert(0) += 1;
        self.total_latency += latency;
    }

    /// Record a failed row.
    pub fn record_failure(&mut self, latency: Duration) {
        self.failure_count += 1;
        self.total_latency += latency;
    }

    /// Rows processed so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// Get the current statistics snapshot.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> StatsSnapshot {
        let processed = self.processed();
        let avg_latency_ms = if processed > 0 {
            self.total_latency.as_secs_f64() * 1000.0 / processed as f64
        } else {
            0.0
        };

        StatsSnapshot {
            elapsed: self.start_time.elapsed(),
            total_rows: self.total_rows,
            processed,
            success_count: self.success_count,
            failure_count: self.failure_count,
            per_class: self.per_class.clone(),
            avg_latency_ms,
        }
    }
}

/// A snapshot of batch statistics.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Elapsed time since start.
    pub elapsed: Duration,
    /// Rows in the input table.
    pub total_rows: usize,
    /// Rows processed so far.
    pub processed: usize,
    /// Rows classified successfully.
    pub success_count: usize,
    /// Rows recorded as errors.
    pub failure_count: usize,
    /// Successful rows per classification name.
    pub per_class: BTreeMap<&'static str, usize>,
    /// Average call latency in milliseconds.
    pub avg_latency_ms: f64,
}

impl StatsSnapshot {
    /// Get the success rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.processed > 0 {
            (self.success_count as f64 / self.processed as f64) * 100.0
        } else {
            100.0
        }
    }

    /// Format as a one-line progress summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Processed: {}/{} | Success: {} | Failed: {} | Avg Latency: {:.1}ms",
            self.processed,
            self.total_rows,
            self.success_count,
            self.failure_count,
            self.avg_latency_ms
        )
    }
}

//! Batch-level import report

use serde::Serialize;
use std::time::Duration;

use super::validator::RowRejection;

/// Summary of one import call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Rows in the input dataset
    pub total_rows: usize,
    /// Rows persisted by committed chunks
    pub imported: usize,
    /// Rows skipped by validation
    pub rejected_count: usize,
    /// First rejections, up to the configured limit
    pub rejections: Vec<RowRejection>,
    /// Write scopes committed
    pub chunks_committed: usize,
    /// Distinct titles resolved against the store
    pub entities_resolved: usize,
    /// Apps inserted while resolving
    pub entities_created: usize,
    #[serde(skip)]
    pub duration: Duration,
}

impl ImportReport {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Default::default()
        }
    }

    /// Count a rejection, keeping it verbatim only while under `limit`
    pub fn record_rejection(&mut self, rejection: RowRejection, limit: usize) {
        self.rejected_count += 1;
        if self.rejections.len() < limit {
            self.rejections.push(rejection);
        }
    }

    /// Imported rows per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.imported as f64 / secs
        } else {
            0.0
        }
    }

    /// Check if every input row was imported
    pub fn is_complete(&self) -> bool {
        self.imported == self.total_rows
    }

    /// Rejections dropped from the report by the limit
    pub fn unreported_rejections(&self) -> usize {
        self.rejected_count - self.rejections.len()
    }
}

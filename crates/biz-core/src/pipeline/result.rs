//! Per-item and per-batch results.

use std::path::PathBuf;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::staging::StoreError;
use crate::transcode::TranscodeError;

/// A transcoded image written into the staging store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    /// Zero-based position of the source URL.
    pub position: usize,
    pub url: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

/// Why one item produced no artifact. Never aborts the batch.
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("staging failed: {0}")]
    Store(#[from] StoreError),

    /// Worker panicked or was torn down before reporting.
    #[error("worker aborted: {0}")]
    Aborted(String),
}

impl ItemFailure {
    /// True when the fetch gave up on a connect or total timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ItemFailure::Fetch(e) if e.is_timeout())
    }
}

/// Outcome of one URL.
#[derive(Debug)]
pub struct ItemReport {
    pub position: usize,
    pub url: String,
    pub result: Result<StagedArtifact, ItemFailure>,
}

impl ItemReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// A failed item, kept in the run outcome for the final summary.
#[derive(Debug)]
pub struct FailedItem {
    pub position: usize,
    pub url: String,
    pub reason: ItemFailure,
}

/// Fatal, run-level errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("no valid URLs found in input")]
    NoInput,

    #[error("no images were successfully processed ({attempted} attempted)")]
    NoArtifacts { attempted: usize },
}

/// Every item's report, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Split into the run outcome; fails if nothing was produced.
    pub fn into_outcome(self) -> Result<RunOutcome, BatchError> {
        if self.items.is_empty() {
            return Err(BatchError::NoInput);
        }
        let attempted = self.items.len();
        let mut artifacts = Vec::new();
        let mut failures = Vec::new();
        for item in self.items {
            match item.result {
                Ok(artifact) => artifacts.push(artifact),
                Err(reason) => failures.push(FailedItem {
                    position: item.position,
                    url: item.url,
                    reason,
                }),
            }
        }
        if artifacts.is_empty() {
            return Err(BatchError::NoArtifacts { attempted });
        }
        Ok(RunOutcome {
            artifacts,
            failures,
            attempted,
        })
    }
}

/// Ordered artifacts ready for packaging, plus what was dropped.
#[derive(Debug)]
pub struct RunOutcome {
    pub artifacts: Vec<StagedArtifact>,
    pub failures: Vec<FailedItem>,
    pub attempted: usize,
}

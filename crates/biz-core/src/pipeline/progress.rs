//! Progress reporting for a batch (items done, rate, ETA).
//!
//! One snapshot is emitted per finished item so the CLI can print failures as
//! they happen instead of waiting for the final summary.

/// Snapshot of batch progress, taken right after one item finished.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Position of the item that just finished.
    pub position: usize,
    pub url: String,
    /// Failure reason, `None` if the item was staged.
    pub error: Option<String>,
    /// Items finished so far (success or failure).
    pub done: usize,
    /// Items staged so far.
    pub succeeded: usize,
    /// Items in the batch.
    pub total: usize,
    /// Elapsed time since the batch started (seconds).
    pub elapsed_secs: f64,
}

impl BatchProgress {
    pub fn failed(&self) -> usize {
        self.done - self.succeeded
    }

    /// Items per second (0 if elapsed is 0).
    pub fn items_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total.saturating_sub(self.done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.items_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done as f64 / self.total as f64).min(1.0)
    }
}

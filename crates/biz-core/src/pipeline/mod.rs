//! Bounded-concurrency fetch/transcode/stage scheduler.
//!
//! Takes an ordered URL list and runs the per-item pipeline with at most
//! `concurrency` items in flight. Results are put back in input order by
//! position, never by completion time. A failed item becomes an `ItemReport`
//! with an error; only an empty input or a batch with zero artifacts fails the
//! run.
//!
//! Two policies share the peak bound:
//! - `Pool` keeps N workers busy; a new item starts as soon as any finishes.
//! - `Chunked` processes consecutive chunks of N and waits for the whole
//!   chunk before starting the next one.

mod item;
mod progress;
mod result;

pub use progress::BatchProgress;
pub use result::{
    BatchError, BatchReport, FailedItem, ItemFailure, ItemReport, RunOutcome, StagedArtifact,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::fetch::Fetcher;
use crate::input::UrlEntry;
use crate::staging::StagingStore;

use item::{process_item, ItemContext};

/// How items are admitted under the concurrency limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePolicy {
    /// Work-conserving pool of N slots.
    #[default]
    Pool,
    /// Strict chunks of N; chunk k+1 starts after all of chunk k finished.
    Chunked,
}

impl std::str::FromStr for SchedulePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool" => Ok(SchedulePolicy::Pool),
            "chunked" => Ok(SchedulePolicy::Chunked),
            other => anyhow::bail!("unknown schedule '{}' (expected pool or chunked)", other),
        }
    }
}

/// Knobs for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Maximum items in flight. Values below 1 are treated as 1.
    pub concurrency: usize,
    /// JPEG quality, expected in 1-100.
    pub quality: u8,
    pub policy: SchedulePolicy,
}

impl PipelineSettings {
    pub fn new(concurrency: usize, quality: u8) -> Self {
        Self {
            concurrency,
            quality,
            policy: SchedulePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Run the pipeline and return artifacts in input order.
///
/// Fails with `BatchError::NoInput` for an empty list and
/// `BatchError::NoArtifacts` when every item failed. Partial success is `Ok`.
pub async fn run(
    entries: Vec<UrlEntry>,
    settings: PipelineSettings,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<StagingStore>,
    progress_tx: Option<&mpsc::Sender<BatchProgress>>,
) -> Result<RunOutcome, BatchError> {
    if entries.is_empty() {
        return Err(BatchError::NoInput);
    }
    let report = run_batch(entries, settings, fetcher, store, progress_tx).await;
    let outcome = report.into_outcome()?;
    tracing::info!(
        succeeded = outcome.artifacts.len(),
        attempted = outcome.attempted,
        "pipeline finished"
    );
    Ok(outcome)
}

/// Run every item and collect a report per item, in input order. Never fails.
pub async fn run_batch(
    entries: Vec<UrlEntry>,
    settings: PipelineSettings,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<StagingStore>,
    progress_tx: Option<&mpsc::Sender<BatchProgress>>,
) -> BatchReport {
    let max_concurrent = settings.concurrency.max(1);
    let ctx = ItemContext {
        fetcher,
        store,
        quality: settings.quality,
    };
    tracing::info!(
        items = entries.len(),
        concurrency = max_concurrent,
        quality = settings.quality,
        policy = ?settings.policy,
        "pipeline starting"
    );

    let mut collector = Collector::new(&entries, progress_tx);
    let mut join_set: JoinSet<(usize, ItemReport)> = JoinSet::new();

    match settings.policy {
        SchedulePolicy::Pool => {
            let mut pending = entries.iter().cloned().enumerate();
            loop {
                while join_set.len() < max_concurrent {
                    let Some((index, entry)) = pending.next() else {
                        break;
                    };
                    spawn_item(&mut join_set, index, entry, ctx.clone());
                }
                let Some(res) = join_set.join_next().await else {
                    break;
                };
                collector.accept(res).await;
            }
        }
        SchedulePolicy::Chunked => {
            for (chunk_no, chunk) in entries.chunks(max_concurrent).enumerate() {
                let base = chunk_no * max_concurrent;
                for (offset, entry) in chunk.iter().enumerate() {
                    spawn_item(&mut join_set, base + offset, entry.clone(), ctx.clone());
                }
                while let Some(res) = join_set.join_next().await {
                    collector.accept(res).await;
                }
                tracing::debug!(chunk = chunk_no, size = chunk.len(), "chunk finished");
            }
        }
    }

    collector.finish(&entries)
}

fn spawn_item(
    join_set: &mut JoinSet<(usize, ItemReport)>,
    index: usize,
    entry: UrlEntry,
    ctx: ItemContext,
) {
    join_set.spawn_blocking(move || (index, process_item(&entry, &ctx)));
}

/// Gathers reports into input-order slots and emits progress.
///
/// Every finished item produces one snapshot. Sends wait for channel space,
/// so the receiver must keep draining while the batch runs; a dropped
/// receiver only disables progress.
struct Collector<'a> {
    slots: Vec<Option<ItemReport>>,
    done: usize,
    succeeded: usize,
    started: Instant,
    progress_tx: Option<&'a mpsc::Sender<BatchProgress>>,
}

impl<'a> Collector<'a> {
    fn new(entries: &[UrlEntry], progress_tx: Option<&'a mpsc::Sender<BatchProgress>>) -> Self {
        Self {
            slots: entries.iter().map(|_| None).collect(),
            done: 0,
            succeeded: 0,
            started: Instant::now(),
            progress_tx,
        }
    }

    async fn accept(&mut self, res: Result<(usize, ItemReport), JoinError>) {
        let (index, report) = match res {
            Ok(pair) => pair,
            Err(e) => {
                // Position is unknown here; `finish` marks the empty slot.
                tracing::error!("pipeline task join: {}", e);
                return;
            }
        };
        self.done += 1;
        if report.is_success() {
            self.succeeded += 1;
        }
        if let Some(tx) = self.progress_tx {
            let snapshot = BatchProgress {
                position: report.position,
                url: report.url.clone(),
                error: report.result.as_ref().err().map(|e| e.to_string()),
                done: self.done,
                succeeded: self.succeeded,
                total: self.slots.len(),
                elapsed_secs: self.started.elapsed().as_secs_f64(),
            };
            if tx.send(snapshot).await.is_err() {
                tracing::debug!("progress receiver dropped");
            }
        }
        self.slots[index] = Some(report);
    }

    fn finish(self, entries: &[UrlEntry]) -> BatchReport {
        let items = self
            .slots
            .into_iter()
            .zip(entries)
            .map(|(slot, entry)| {
                slot.unwrap_or_else(|| ItemReport {
                    position: entry.position,
                    url: entry.url.clone(),
                    result: Err(ItemFailure::Aborted("task did not report".to_string())),
                })
            })
            .collect();
        BatchReport { items }
    }
}

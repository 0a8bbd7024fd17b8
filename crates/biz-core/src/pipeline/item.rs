//! One item's pipeline: fetch, transcode, stage. Runs on a blocking thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::fetch::Fetcher;
use crate::input::UrlEntry;
use crate::staging::StagingStore;
use crate::transcode::transcode;

use super::result::{ItemFailure, ItemReport, StagedArtifact};

/// Everything a worker needs; cheap to clone per item.
#[derive(Clone)]
pub(super) struct ItemContext {
    pub(super) fetcher: Arc<dyn Fetcher>,
    pub(super) store: Arc<StagingStore>,
    pub(super) quality: u8,
}

fn stage_one(entry: &UrlEntry, ctx: &ItemContext) -> Result<StagedArtifact, ItemFailure> {
    let fetched = ctx.fetcher.fetch(&entry.url)?;
    let transcoded = transcode(&fetched.bytes, ctx.quality)?;
    let path = ctx.store.write(entry.position, &transcoded.bytes)?;
    Ok(StagedArtifact {
        position: entry.position,
        url: entry.url.clone(),
        path,
        width: transcoded.width,
        height: transcoded.height,
        size_bytes: transcoded.bytes.len() as u64,
    })
}

/// Run the item pipeline, converting a panic into an `Aborted` failure so the
/// report keeps its position.
pub(super) fn process_item(entry: &UrlEntry, ctx: &ItemContext) -> ItemReport {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| stage_one(entry, ctx)))
        .unwrap_or_else(|payload| Err(ItemFailure::Aborted(panic_message(&payload))));

    match &result {
        Ok(artifact) => tracing::debug!(
            position = entry.position,
            url = %entry.url,
            width = artifact.width,
            height = artifact.height,
            bytes = artifact.size_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "image staged"
        ),
        Err(e) => tracing::warn!(
            position = entry.position,
            url = %entry.url,
            timed_out = e.is_timeout(),
            "error processing image: {}",
            e
        ),
    }

    ItemReport {
        position: entry.position,
        url: entry.url.clone(),
        result,
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

//! End-to-end run: read URL lists, stage images through the pipeline, package
//! them, and tear the staging directory down on every exit path.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{validate_quality, BizConfig};
use crate::fetch::{FetchOptions, Fetcher};
use crate::input::{read_url_lists, UrlEntry};
use crate::package::{self, output_file_path, OutputFormat, PackageSummary};
use crate::pipeline::{self, BatchError, BatchProgress, FailedItem, PipelineSettings, SchedulePolicy};
use crate::shutdown::Interrupted;
use crate::staging::{StagingGuard, StagingStore};

/// Everything one run needs. Paths are used as given; relative paths resolve
/// against the process working directory.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub input_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    /// Output file name without extension.
    pub output_name: String,
    pub format: OutputFormat,
    pub concurrency: usize,
    pub quality: u8,
    pub schedule: SchedulePolicy,
    pub staging_dir: PathBuf,
    pub fetch: FetchOptions,
}

impl ProcessOptions {
    /// Options seeded from config; callers override fields from CLI flags.
    pub fn from_config(cfg: &BizConfig, input_files: Vec<PathBuf>, output_name: String) -> Self {
        Self {
            input_files,
            output_dir: cfg.output_dir.clone(),
            output_name,
            format: cfg.format,
            concurrency: cfg.concurrency,
            quality: cfg.quality,
            schedule: cfg.schedule,
            staging_dir: cfg.staging_dir.clone(),
            fetch: cfg.fetch_options(),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        output_file_path(&self.output_dir, &self.output_name, self.format)
    }

    fn settings(&self) -> PipelineSettings {
        PipelineSettings::new(self.concurrency, self.quality).with_policy(self.schedule)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        validate_quality(self.quality)?;
        if self.output_name.trim().is_empty() {
            anyhow::bail!("output name must not be empty");
        }
        Ok(())
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct ProcessSummary {
    pub output: PackageSummary,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<FailedItem>,
}

/// Run the whole job. `shutdown` resolving aborts the run with [`Interrupted`];
/// pass [`crate::shutdown::wait_for_signal`] in production.
///
/// The staging directory is removed before this returns, whatever the outcome.
/// An interrupt during packaging stops the packager and removes its output, so
/// an interrupted run never leaves a bundle or `.part` file behind.
/// Fatal errors can be told apart with `downcast_ref`: [`BatchError`],
/// [`crate::staging::StoreError`], [`Interrupted`].
pub async fn process_images<S>(
    opts: &ProcessOptions,
    fetcher: Arc<dyn Fetcher>,
    progress_tx: Option<mpsc::Sender<BatchProgress>>,
    shutdown: S,
) -> Result<ProcessSummary>
where
    S: Future<Output = ()>,
{
    opts.validate()?;

    let guard = StagingGuard::acquire(&opts.staging_dir)?;
    tokio::pin!(shutdown);

    let result = run_job(opts, fetcher, guard.store(), progress_tx, &mut shutdown).await;

    guard.release();
    result
}

fn interrupted() -> anyhow::Error {
    anyhow::Error::new(Interrupted)
}

async fn run_job<S>(
    opts: &ProcessOptions,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<StagingStore>,
    progress_tx: Option<mpsc::Sender<BatchProgress>>,
    shutdown: &mut S,
) -> Result<ProcessSummary>
where
    S: Future<Output = ()> + Unpin,
{
    let entries: Vec<UrlEntry> = read_url_lists(&opts.input_files)?;
    if entries.is_empty() {
        return Err(BatchError::NoInput.into());
    }
    tracing::info!(count = entries.len(), "found URLs to process");

    std::fs::create_dir_all(&opts.output_dir).with_context(|| {
        format!("failed to create output directory: {}", opts.output_dir.display())
    })?;

    let outcome = tokio::select! {
        res = pipeline::run(entries, opts.settings(), fetcher, store, progress_tx.as_ref()) => res,
        _ = &mut *shutdown => {
            tracing::warn!("interrupted; abandoning in-flight downloads");
            return Err(interrupted());
        }
    };
    // Close the progress channel so consumers stop before packaging output.
    drop(progress_tx);
    let outcome = outcome?;

    let format = opts.format;
    let output = opts.output_path();
    let artifacts = outcome.artifacts;
    let cancel = Arc::new(AtomicBool::new(false));
    let mut packager = tokio::task::spawn_blocking({
        let cancel = Arc::clone(&cancel);
        move || package::package(format, &artifacts, &output, &cancel)
    });

    let summary = tokio::select! {
        joined = &mut packager => joined.map_err(|e| anyhow::anyhow!("packaging task join: {}", e))??,
        _ = &mut *shutdown => {
            tracing::warn!("interrupted while packaging; discarding output");
            cancel.store(true, Ordering::Release);
            // The packager stops at the next entry and removes its temp file.
            // If it had already finished, the completed bundle goes too.
            if let Ok(Ok(done)) = packager.await {
                if let Err(e) = std::fs::remove_file(&done.path) {
                    tracing::warn!(path = %done.path.display(), "failed to remove output: {}", e);
                }
            }
            return Err(interrupted());
        }
    };

    let succeeded = summary.entries;
    tracing::info!(
        succeeded,
        attempted = outcome.attempted,
        path = %summary.path.display(),
        "run complete"
    );
    Ok(ProcessSummary {
        output: summary,
        attempted: outcome.attempted,
        succeeded,
        failures: outcome.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, Fetched};
    use crate::shutdown::is_interrupted;
    use crate::staging::StoreError;
    use crate::transcode::sample_png;
    use std::time::Duration;

    /// Serves a PNG for URLs containing "ok", sleeps for "hang", 404 otherwise.
    struct StaticFetcher;

    impl Fetcher for StaticFetcher {
        fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            if url.contains("hang") {
                std::thread::sleep(Duration::from_millis(500));
            }
            if url.contains("ok") {
                Ok(Fetched {
                    bytes: sample_png(12, 9),
                    content_length: None,
                })
            } else {
                Err(FetchError::BadStatus(404))
            }
        }
    }

    fn options(dir: &std::path::Path, urls: &str, format: OutputFormat) -> ProcessOptions {
        let input = dir.join("urls.txt");
        std::fs::write(&input, urls).unwrap();
        ProcessOptions {
            input_files: vec![input],
            output_dir: dir.join("output"),
            output_name: "bundle".to_string(),
            format,
            concurrency: 2,
            quality: 90,
            schedule: SchedulePolicy::Pool,
            staging_dir: dir.join("temp"),
            fetch: FetchOptions::default(),
        }
    }

    fn never() -> impl Future<Output = ()> {
        std::future::pending()
    }

    #[tokio::test]
    async fn zip_run_packages_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "http://h/ok/1\n\nhttp://h/missing\nhttp://h/ok/3\n", OutputFormat::Zip);
        let summary = process_images(&opts, Arc::new(StaticFetcher), None, never())
            .await
            .unwrap();
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].url, "http://h/missing");
        assert_eq!(summary.output.path, dir.path().join("output").join("bundle.zip"));
        assert!(summary.output.path.exists());
        assert!(!opts.staging_dir.exists());
    }

    #[tokio::test]
    async fn pdf_run_writes_one_page_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "http://h/ok/a\nhttp://h/ok/b\nhttp://h/ok/c\n", OutputFormat::Pdf);
        let summary = process_images(&opts, Arc::new(StaticFetcher), None, never())
            .await
            .unwrap();
        assert_eq!(summary.output.entries, 3);
        let doc = lopdf::Document::load(&summary.output.path).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert!(!opts.staging_dir.exists());
    }

    #[tokio::test]
    async fn empty_input_fails_with_no_input_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "\n   \n", OutputFormat::Pdf);
        let err = process_images(&opts, Arc::new(StaticFetcher), None, never())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<BatchError>(), Some(&BatchError::NoInput));
        assert!(!opts.staging_dir.exists());
        assert!(!opts.output_path().exists());
    }

    #[tokio::test]
    async fn all_failed_is_no_artifacts_and_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "http://h/missing\n", OutputFormat::Zip);
        let err = process_images(&opts, Arc::new(StaticFetcher), None, never())
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BatchError>(),
            Some(&BatchError::NoArtifacts { attempted: 1 })
        );
        assert!(!opts.staging_dir.exists());
        assert!(!opts.output_path().exists());
    }

    #[tokio::test]
    async fn interrupt_mid_run_removes_staging() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "http://h/ok/1\nhttp://h/hang/ok/2\n", OutputFormat::Zip);
        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        let err = process_images(&opts, Arc::new(StaticFetcher), None, shutdown)
            .await
            .unwrap_err();
        assert!(is_interrupted(&err));
        assert!(!opts.staging_dir.exists());
        assert!(!opts.output_path().exists());
    }

    #[tokio::test]
    async fn interrupt_during_packaging_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let urls: String = (0..60).map(|i| format!("http://h/ok/{}\n", i)).collect();
        for format in [OutputFormat::Pdf, OutputFormat::Zip] {
            let opts = options(dir.path(), &urls, format);
            let (tx, mut rx) = mpsc::channel::<BatchProgress>(64);
            let (fire, fired) = tokio::sync::oneshot::channel::<()>();
            // Signal as soon as the last item is reported, i.e. when packaging starts.
            tokio::spawn(async move {
                let mut fire = Some(fire);
                while let Some(p) = rx.recv().await {
                    if p.done == p.total {
                        if let Some(f) = fire.take() {
                            let _ = f.send(());
                        }
                    }
                }
            });
            let shutdown = async move {
                let _ = fired.await;
            };

            let err = process_images(&opts, Arc::new(StaticFetcher), Some(tx), shutdown)
                .await
                .unwrap_err();
            assert!(is_interrupted(&err));
            assert!(!opts.staging_dir.exists());
            assert!(!opts.output_path().exists());
            assert!(!package::temp_path(&opts.output_path()).exists());
        }
    }

    #[tokio::test]
    async fn unusable_staging_dir_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), "http://h/ok/1\n", OutputFormat::Zip);
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        opts.staging_dir = blocker.clone();
        let err = process_images(&opts, Arc::new(StaticFetcher), None, never())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Unavailable { .. })
        ));
        assert!(blocker.is_file());
    }

    #[tokio::test]
    async fn invalid_quality_is_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), "http://h/ok/1\n", OutputFormat::Zip);
        opts.quality = 0;
        assert!(process_images(&opts, Arc::new(StaticFetcher), None, never())
            .await
            .is_err());
        assert!(!opts.staging_dir.exists());
    }

    #[tokio::test]
    async fn progress_channel_closes_after_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "http://h/ok/1\nhttp://h/missing\n", OutputFormat::Zip);
        let (tx, mut rx) = mpsc::channel(16);
        let printer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(p) = rx.recv().await {
                seen.push(p);
            }
            seen
        });
        process_images(&opts, Arc::new(StaticFetcher), Some(tx), never())
            .await
            .unwrap();
        let seen = printer.await.unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().any(|p| p.error.is_some() && p.url == "http://h/missing"));
    }
}

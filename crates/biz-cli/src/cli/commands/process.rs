//! `biz process` – run one bundle job and print progress and a summary.

use anyhow::Result;
use biz_core::config::BizConfig;
use biz_core::fetch::CurlFetcher;
use biz_core::package::OutputFormat;
use biz_core::pipeline::{BatchProgress, SchedulePolicy};
use biz_core::process::{process_images, ProcessOptions, ProcessSummary};
use biz_core::shutdown;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Flags from `biz process`; `None` means "use the config value".
#[derive(Debug)]
pub struct ProcessArgs {
    pub input: Vec<PathBuf>,
    pub output: String,
    pub format: Option<OutputFormat>,
    pub concurrency: Option<usize>,
    pub quality: Option<u8>,
    pub schedule: Option<SchedulePolicy>,
    pub output_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
}

impl ProcessArgs {
    pub fn into_options(self, cfg: &BizConfig) -> ProcessOptions {
        let mut opts = ProcessOptions::from_config(cfg, self.input, self.output);
        if let Some(format) = self.format {
            opts.format = format;
        }
        if let Some(concurrency) = self.concurrency {
            opts.concurrency = concurrency;
        }
        if let Some(quality) = self.quality {
            opts.quality = quality;
        }
        if let Some(schedule) = self.schedule {
            opts.schedule = schedule;
        }
        if let Some(dir) = self.output_dir {
            opts.output_dir = dir;
        }
        if let Some(dir) = self.staging_dir {
            opts.staging_dir = dir;
        }
        opts
    }
}

pub async fn run_process(cfg: &BizConfig, args: ProcessArgs) -> Result<()> {
    execute(args.into_options(cfg)).await
}

/// Run `opts` with the curl fetcher, stopping on SIGINT/SIGTERM.
pub(crate) async fn execute(opts: ProcessOptions) -> Result<()> {
    tracing::info!(
        inputs = opts.input_files.len(),
        format = %opts.format,
        concurrency = opts.concurrency,
        quality = opts.quality,
        "starting run"
    );
    let fetcher = Arc::new(CurlFetcher::new(opts.fetch.clone()));

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<BatchProgress>(16);
    const PROGRESS_INTERVAL_MS: u64 = 500;
    let progress_handle = tokio::spawn(async move {
        let mut last_print = Instant::now();
        while let Some(p) = progress_rx.recv().await {
            let now = Instant::now();
            if now.duration_since(last_print).as_millis() as u64 >= PROGRESS_INTERVAL_MS
                || p.done >= p.total
            {
                println!("{}", progress_line(&p));
                last_print = now;
            }
        }
    });

    let result = process_images(&opts, fetcher, Some(progress_tx), shutdown::wait_for_signal()).await;
    let _ = progress_handle.await;

    let summary = result?;
    print_summary(&summary);
    Ok(())
}

fn progress_line(p: &BatchProgress) -> String {
    let eta = p
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  {} / {} images ({:.0}%)  {:.1} img/s  ETA {}",
        p.done,
        p.total,
        p.fraction() * 100.0,
        p.items_per_sec(),
        eta
    )
}

fn print_summary(summary: &ProcessSummary) {
    println!(
        "Processed {} of {} images.",
        summary.succeeded, summary.attempted
    );
    if !summary.failures.is_empty() {
        println!("{} image(s) skipped:", summary.failures.len());
        for f in &summary.failures {
            println!("  #{} {}: {}", f.position + 1, f.url, f.reason);
        }
    }
    println!(
        "{} created: {}",
        summary.output.format.extension().to_uppercase(),
        summary.output.path.display()
    );
}

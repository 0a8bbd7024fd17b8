//! `biz interactive` – choose URL lists and settings by answering prompts.

use anyhow::{Context, Result};
use biz_core::config::BizConfig;
use biz_core::package::OutputFormat;
use biz_core::process::ProcessOptions;
use biz_core::transcode::{MAX_QUALITY, MIN_QUALITY};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use super::process::execute;
use crate::cli::prompt::Prompter;

/// Upper bound offered for concurrency at the prompt.
const MAX_INTERACTIVE_CONCURRENCY: usize = 20;

pub async fn run_interactive(cfg: &BizConfig) -> Result<()> {
    let sources = list_url_files(&cfg.source_dir)?;
    let opts = {
        let stdin = std::io::stdin();
        let mut prompter = Prompter::new(stdin.lock(), std::io::stdout());
        ask_options(&mut prompter, cfg, &sources)?
    };
    execute(opts).await
}

/// `.txt` files directly inside `dir`, sorted by name.
pub(crate) fn list_url_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read source directory: {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_txt = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if is_txt && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        anyhow::bail!("no .txt files found in {}", dir.display());
    }
    Ok(files)
}

fn ask_options<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    cfg: &BizConfig,
    sources: &[PathBuf],
) -> Result<ProcessOptions> {
    let names: Vec<String> = sources
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();
    let picked = prompter.multi_select("Select the URL list(s) to process:", &names)?;
    let input_files: Vec<PathBuf> = picked.into_iter().map(|i| sources[i].clone()).collect();

    let formats = [OutputFormat::Pdf, OutputFormat::Zip];
    let default_format = formats.iter().position(|f| *f == cfg.format).unwrap_or(0);
    let format = formats[prompter.choose("Output format:", &["PDF", "ZIP"], default_format)?];

    let quality = prompter.number(
        "JPEG quality (1-100)",
        MIN_QUALITY..=MAX_QUALITY,
        cfg.quality.clamp(MIN_QUALITY, MAX_QUALITY),
    )?;
    let concurrency = prompter.number(
        "Concurrent downloads (1-20)",
        1..=MAX_INTERACTIVE_CONCURRENCY,
        cfg.concurrency.clamp(1, MAX_INTERACTIVE_CONCURRENCY),
    )?;
    let output_name = prompter.text("Output file name (without extension)", "output")?;

    let mut opts = ProcessOptions::from_config(cfg, input_files, output_name);
    opts.format = format;
    opts.quality = quality;
    opts.concurrency = concurrency;
    Ok(opts)
}

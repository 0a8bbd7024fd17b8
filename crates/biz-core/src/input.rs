//! URL list input: newline-delimited text files, one URL per line.
//!
//! Lines are trimmed and blank lines dropped. Each surviving line becomes a
//! [`UrlEntry`] whose position is its index among the kept lines; positions
//! continue across multiple input files.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// One URL to process, tagged with its zero-based position in the input list.
/// The position decides output order and the staged file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntry {
    pub position: usize,
    pub url: String,
}

impl UrlEntry {
    pub fn new(position: usize, url: impl Into<String>) -> Self {
        Self {
            position,
            url: url.into(),
        }
    }
}

/// Turn raw strings into entries numbered from 0 in the given order.
pub fn entries_from<I, S>(urls: I) -> Vec<UrlEntry>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    urls.into_iter()
        .enumerate()
        .map(|(position, url)| UrlEntry::new(position, url))
        .collect()
}

/// Parse newline-delimited URL text. Handles `\r\n` line endings.
pub fn parse_url_list(text: &str) -> Vec<UrlEntry> {
    entries_from(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty()),
    )
}

/// Read and concatenate URL lists from `paths`, in order.
pub fn read_url_lists<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<UrlEntry>> {
    let mut urls: Vec<String> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read URL list: {}", path.display()))?;
        let before = urls.len();
        urls.extend(parse_url_list(&text).into_iter().map(|e| e.url));
        tracing::debug!(
            path = %path.display(),
            count = urls.len() - before,
            "read URL list"
        );
    }
    Ok(entries_from(urls))
}

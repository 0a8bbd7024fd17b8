//! Packaging: bundle staged artifacts into one PDF or ZIP file.
//!
//! The bundle is written to `<output>.part` first and renamed into place once
//! complete, so a failed or interrupted run never leaves a truncated output.

mod archive;
mod pdf;

pub use archive::{entry_name, write_zip};
pub use pdf::write_pdf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pipeline::StagedArtifact;
use crate::shutdown::Interrupted;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One full-bleed page per image.
    #[default]
    Pdf,
    /// One stored entry per image.
    Zip,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Zip => "zip",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "zip" => Ok(OutputFormat::Zip),
            other => anyhow::bail!("unsupported output format '{}' (expected pdf or zip)", other),
        }
    }
}

/// Final output path: `<output_dir>/<name>.<ext>`.
pub fn output_file_path(output_dir: &Path, name: &str, format: OutputFormat) -> PathBuf {
    output_dir.join(format!("{}.{}", name, format.extension()))
}

/// Path for the temp file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// What was written by [`package`].
#[derive(Debug, Clone)]
pub struct PackageSummary {
    pub path: PathBuf,
    pub format: OutputFormat,
    /// Pages (PDF) or entries (ZIP).
    pub entries: usize,
    pub size_bytes: u64,
}

/// Fails with [`Interrupted`] once `cancel` is set.
fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Acquire) {
        return Err(anyhow::Error::new(Interrupted));
    }
    Ok(())
}

/// Bundle `artifacts`, in order, into `output` using `format`.
/// Blocking; call from `spawn_blocking` if used from async code.
///
/// `cancel` is checked between entries and before the final rename; when it
/// is set the temp file is removed and [`Interrupted`] is returned.
pub fn package(
    format: OutputFormat,
    artifacts: &[StagedArtifact],
    output: &Path,
    cancel: &AtomicBool,
) -> Result<PackageSummary> {
    if artifacts.is_empty() {
        anyhow::bail!("nothing to package");
    }
    let tmp = temp_path(output);
    let written = write_to(format, artifacts, &tmp, cancel).and_then(|n| {
        check_cancel(cancel)?;
        Ok(n)
    });
    let entries = match written {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
    };

    std::fs::rename(&tmp, output)
        .with_context(|| format!("failed to rename {} to {}", tmp.display(), output.display()))?;
    let size_bytes = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    tracing::info!(
        path = %output.display(),
        format = %format,
        entries,
        size_bytes,
        "output written"
    );
    Ok(PackageSummary {
        path: output.to_path_buf(),
        format,
        entries,
        size_bytes,
    })
}

fn write_to(
    format: OutputFormat,
    artifacts: &[StagedArtifact],
    tmp: &Path,
    cancel: &AtomicBool,
) -> Result<usize> {
    let file = File::create(tmp)
        .with_context(|| format!("failed to create output file: {}", tmp.display()))?;
    match format {
        OutputFormat::Pdf => {
            let mut out = BufWriter::new(file);
            let n = write_pdf(artifacts, &mut out, cancel)?;
            let file = out
                .into_inner()
                .map_err(|e| anyhow::anyhow!("flush {}: {}", tmp.display(), e.error()))?;
            file.sync_all().context("output sync failed")?;
            Ok(n)
        }
        OutputFormat::Zip => {
            let (n, file) = write_zip(artifacts, file, cancel)?;
            file.sync_all().context("output sync failed")?;
            Ok(n)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::StagingStore;

    #[test]
    fn format_parse_and_extension() {
        assert_eq!("pdf".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!(" ZIP ".parse::<OutputFormat>().unwrap(), OutputFormat::Zip);
        assert!("tar".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Zip.extension(), "zip");
        assert_eq!(OutputFormat::Pdf.to_string(), "pdf");
    }

    #[test]
    fn output_and_temp_paths() {
        let p = output_file_path(Path::new("/srv/output"), "book", OutputFormat::Pdf);
        assert_eq!(p, PathBuf::from("/srv/output/book.pdf"));
        assert_eq!(temp_path(&p), PathBuf::from("/srv/output/book.pdf.part"));
    }

    #[test]
    fn package_zip_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::init(&dir.path().join("temp")).unwrap();
        let artifacts = test_support::stage(&store, &[(8, 8), (9, 9)]);
        let out = dir.path().join("bundle.zip");
        let summary = package(OutputFormat::Zip, &artifacts, &out, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.entries, 2);
        assert!(out.exists());
        assert!(!temp_path(&out).exists());
        assert!(summary.size_bytes > 0);
    }

    #[test]
    fn package_refuses_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.pdf");
        assert!(package(OutputFormat::Pdf, &[], &out, &AtomicBool::new(false)).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn package_failure_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::init(&dir.path().join("temp")).unwrap();
        let artifacts = test_support::stage(&store, &[(8, 8)]);
        store.teardown();
        let out = dir.path().join("bundle.pdf");
        assert!(package(OutputFormat::Pdf, &artifacts, &out, &AtomicBool::new(false)).is_err());
        assert!(!out.exists());
        assert!(!temp_path(&out).exists());
    }

    #[test]
    fn cancelled_package_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = StagingStore::init(&dir.path().join("temp")).unwrap();
        let artifacts = test_support::stage(&store, &[(8, 8), (9, 9)]);
        for format in [OutputFormat::Pdf, OutputFormat::Zip] {
            let out = output_file_path(dir.path(), "bundle", format);
            let err = package(format, &artifacts, &out, &AtomicBool::new(true)).unwrap_err();
            assert!(crate::shutdown::is_interrupted(&err));
            assert!(!out.exists());
            assert!(!temp_path(&out).exists());
        }
    }
}

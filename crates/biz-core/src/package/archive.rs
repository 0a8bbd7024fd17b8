//! ZIP packaging: one stored (uncompressed) entry per JPEG.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Seek, Write};
use std::sync::atomic::AtomicBool;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::check_cancel;
use crate::pipeline::StagedArtifact;

/// Entry name for the artifact at `index` in the packaged list (1-based).
pub fn entry_name(index: usize) -> String {
    format!("image-{}.jpg", index + 1)
}

/// Write every artifact into a ZIP archive on `out`, numbered by list order.
/// Returns the entry count and the underlying writer. Stops with
/// `Interrupted` as soon as `cancel` is set.
pub fn write_zip<W: Write + Seek>(
    artifacts: &[StagedArtifact],
    out: W,
    cancel: &AtomicBool,
) -> Result<(usize, W)> {
    let mut zip = ZipWriter::new(out);
    // JPEG data does not shrink under deflate.
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for (index, artifact) in artifacts.iter().enumerate() {
        check_cancel(cancel)?;
        let name = entry_name(index);
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("failed to start zip entry {}", name))?;
        let mut src = File::open(&artifact.path).with_context(|| {
            format!("failed to read staged image: {}", artifact.path.display())
        })?;
        io::copy(&mut src, &mut zip).with_context(|| format!("failed to write zip entry {}", name))?;
    }

    let out = zip.finish().context("failed to finish zip archive")?;
    Ok((artifacts.len(), out))
}

//! Staging store: scratch directory for transcoded images between the
//! pipeline and packaging.
//!
//! Every artifact is named from its input position (`image-{position+1}.jpg`),
//! so concurrent writers never touch the same file. The only lock is the
//! closed flag: writes hold it shared, teardown takes it exclusively, so a
//! write never lands in a directory that is being removed.
//! The whole directory is removed by [`StagingStore::teardown`]; use
//! [`StagingGuard`] to make that happen on every exit path.

mod guard;

pub use guard::StagingGuard;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// File name prefix of staged artifacts.
pub const ARTIFACT_PREFIX: &str = "image-";
/// File extension of staged artifacts.
pub const ARTIFACT_EXT: &str = "jpg";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Scratch directory could not be created or is not usable. Fatal.
    #[error("staging directory {path} unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// One artifact could not be written. Only that item is dropped.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Staged file name for a zero-based input position.
pub fn artifact_name(position: usize) -> String {
    format!("{}{}.{}", ARTIFACT_PREFIX, position + 1, ARTIFACT_EXT)
}

fn is_artifact_name(name: &str) -> bool {
    name.strip_prefix(ARTIFACT_PREFIX)
        .and_then(|rest| rest.strip_suffix(&format!(".{}", ARTIFACT_EXT)))
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Handle to the scratch directory.
#[derive(Debug)]
pub struct StagingStore {
    root: PathBuf,
    /// Set by the first teardown; later writes are refused.
    closed: RwLock<bool>,
}

impl StagingStore {
    /// Create (or reuse) `root` as an empty scratch directory.
    ///
    /// Stale artifacts left by an earlier crashed run are removed. A directory
    /// that holds anything else is refused, since teardown removes it wholesale.
    pub fn init(root: &Path) -> Result<Self, StoreError> {
        let unavailable = |source: io::Error| StoreError::Unavailable {
            path: root.to_path_buf(),
            source,
        };

        fs::create_dir_all(root).map_err(unavailable)?;
        for entry in fs::read_dir(root).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file && is_artifact_name(&name) {
                fs::remove_file(entry.path()).map_err(unavailable)?;
                tracing::debug!(file = %name, "removed stale staged artifact");
            } else {
                return Err(unavailable(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("directory is not empty (found '{}')", name),
                )));
            }
        }

        tracing::debug!(root = %root.display(), "staging directory ready");
        Ok(Self {
            root: root.to_path_buf(),
            closed: RwLock::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the artifact for `position` is (or would be) stored at.
    pub fn artifact_path(&self, position: usize) -> PathBuf {
        self.root.join(artifact_name(position))
    }

    /// Persist `bytes` for `position`, replacing any previous content, and
    /// flush to disk. Returns the artifact path.
    ///
    /// Fails with `StoreError::Write` once the store has been torn down.
    pub fn write(&self, position: usize, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(position);
        // Held until the file is synced so teardown waits for this write.
        let closed = self.closed.read().unwrap_or_else(|e| e.into_inner());
        if *closed {
            return Err(StoreError::Write {
                path,
                source: io::Error::new(io::ErrorKind::NotFound, "staging store is closed"),
            });
        }
        let write = || -> io::Result<()> {
            let mut f = File::create(&path)?;
            f.write_all(bytes)?;
            f.sync_data()
        };
        write().map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Close the store and recursively remove the scratch directory. Waits
    /// for in-flight writes. Safe to call any number of times; never fails,
    /// problems are logged as warnings.
    pub fn teardown(&self) {
        let mut closed = self.closed.write().unwrap_or_else(|e| e.into_inner());
        *closed = true;
        match fs::remove_dir_all(&self.root) {
            Ok(()) => tracing::info!(root = %self.root.display(), "cleaned up temporary files"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                root = %self.root.display(),
                "failed to clean up temporary files: {}",
                e
            ),
        }
    }
}

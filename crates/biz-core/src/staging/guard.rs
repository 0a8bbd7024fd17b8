//! RAII guard that tears the staging store down exactly once.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{StagingStore, StoreError};

/// Owns a [`StagingStore`] for the length of one run. `release` (or drop,
/// including drop during a panic unwind) runs teardown; later calls do nothing.
#[derive(Debug)]
pub struct StagingGuard {
    store: Arc<StagingStore>,
    released: AtomicBool,
}

impl StagingGuard {
    /// Initialize the staging directory at `root` and take ownership of its lifetime.
    pub fn acquire(root: &Path) -> Result<Self, StoreError> {
        let store = StagingStore::init(root)?;
        Ok(Self {
            store: Arc::new(store),
            released: AtomicBool::new(false),
        })
    }

    /// Shared handle for pipeline workers. Workers still holding it after
    /// release get `StoreError::Write`; release waits for writes already in
    /// progress, so nothing is left behind in the directory.
    pub fn store(&self) -> Arc<StagingStore> {
        Arc::clone(&self.store)
    }

    /// Tear down now. Returns true if this call performed the teardown.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.store.teardown();
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("temp");
        {
            let guard = StagingGuard::acquire(&root).unwrap();
            guard.store().write(0, b"x").unwrap();
            assert!(root.exists());
        }
        assert!(!root.exists());
    }

    #[test]
    fn release_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("temp");
        let guard = StagingGuard::acquire(&root).unwrap();
        assert!(!guard.is_released());
        assert!(guard.release());
        assert!(guard.is_released());
        assert!(!guard.release());
        drop(guard);
        assert!(!root.exists());
    }

    #[test]
    fn release_with_concurrent_writers_leaves_nothing() {
        use std::thread;
        use std::time::Duration;

        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("temp");
            let guard = StagingGuard::acquire(&root).unwrap();

            let writers: Vec<_> = (0..4)
                .map(|w| {
                    let store = guard.store();
                    thread::spawn(move || {
                        let mut pos = w;
                        while store.write(pos, b"jpeg bytes").is_ok() {
                            pos += 4;
                        }
                    })
                })
                .collect();

            thread::sleep(Duration::from_millis(5));
            assert!(guard.release());
            assert!(!root.exists());
            for w in writers {
                w.join().unwrap();
            }
            assert!(!root.exists());
        }
    }

    #[test]
    fn panic_unwind_still_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("temp");
        let root_in = root.clone();
        let res = std::panic::catch_unwind(move || {
            let guard = StagingGuard::acquire(&root_in).unwrap();
            guard.store().write(1, b"y").unwrap();
            panic!("boom");
        });
        assert!(res.is_err());
        assert!(!root.exists());
    }
}

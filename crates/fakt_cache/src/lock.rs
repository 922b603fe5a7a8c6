//! Write serialization for shared signature stores.
//!
//! Every mutation of a store goes through two locks: a process-global mutex
//! keyed by the store's identity, so all generation units in this process
//! targeting the same backing take turns, and an OS advisory lock on a sidecar
//! file, so concurrent build processes do too.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::CacheError;

static STORE_LOCKS: Lazy<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the process-global write lock for the store with the given identity.
///
/// Stores constructed independently over the same backing share one lock.
pub fn store_lock(identity: &str) -> Arc<Mutex<()>> {
    let mut locks = STORE_LOCKS.lock();
    Arc::clone(
        locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(()))),
    )
}

/// An exclusive OS advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
    path: PathBuf,
}

impl FileLockGuard {
    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

/// Blocks until an exclusive advisory lock on `path` is held.
///
/// The lock file is created if needed, along with its parent directories.
pub fn lock_exclusive(path: &Path) -> Result<FileLockGuard, CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| CacheError::io(path, e))?;
    fs2::FileExt::lock_exclusive(&file).map_err(|e| CacheError::io(path, e))?;
    Ok(FileLockGuard {
        file,
        path: path.to_path_buf(),
    })
}

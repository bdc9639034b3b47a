use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One mutex per target directory, so name resolution and the move that
/// claims the name never interleave with another worker in the same directory.
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, directory: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .entry(directory.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `f` while holding the lock for `directory`.
    pub fn with_lock<T>(&self, directory: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(directory);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        f()
    }
}

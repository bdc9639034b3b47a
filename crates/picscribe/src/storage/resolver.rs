use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::FileOperationError;

const DEFAULT_MAX_SUFFIX: u32 = 10_000;

/// Finds a path in a directory that nothing occupies yet.
///
/// Existence is checked with `symlink_metadata`, so broken symlinks count as taken.
/// Nothing is reserved: callers that race must still create the file with `create_new`.
#[derive(Debug, Clone, Copy)]
pub struct CollisionResolver {
    max_suffix: u32,
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self {
            max_suffix: DEFAULT_MAX_SUFFIX,
        }
    }
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_suffix(max_suffix: u32) -> Self {
        Self { max_suffix }
    }

    /// `dir/base.ext` if free, otherwise `dir/base-1.ext`, `dir/base-2.ext`, ...
    pub fn resolve(
        &self,
        directory: &Path,
        base: &str,
        extension: &str,
    ) -> Result<PathBuf, FileOperationError> {
        self.resolve_avoiding(directory, base, extension, &HashSet::new())
    }

    /// Like [`CollisionResolver::resolve`], but paths in `reserved` count as
    /// taken even though nothing exists there yet.
    pub fn resolve_avoiding(
        &self,
        directory: &Path,
        base: &str,
        extension: &str,
        reserved: &HashSet<PathBuf>,
    ) -> Result<PathBuf, FileOperationError> {
        let extension = extension.trim_start_matches('.');
        let is_available = |path: &Path| !reserved.contains(path) && is_free(path);

        let candidate = directory.join(file_name(base, None, extension));
        if is_available(&candidate) {
            return Ok(candidate);
        }

        for counter in 1..=self.max_suffix {
            let candidate = directory.join(file_name(base, Some(counter), extension));
            if is_available(&candidate) {
                return Ok(candidate);
            }
        }

        Err(FileOperationError::NoUniqueName {
            directory: directory.to_path_buf(),
            base: base.to_string(),
        })
    }
}

fn file_name(base: &str, counter: Option<u32>, extension: &str) -> String {
    let stem = match counter {
        Some(n) => format!("{}-{}", base, n),
        None => base.to_string(),
    };
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

fn is_free(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_err()
}

use std::fs::{File, FileTimes, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::config::FileOperationsConfig;
use crate::error::FileOperationError;
use crate::storage::CollisionResolver;

/// Result of a completed move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub target: PathBuf,
    pub backup: Option<PathBuf>,
    pub attempts: u32,
}

/// Relocates files by copy, verify, then delete. Never uses `rename`, so the
/// source survives any failure before the final delete.
#[derive(Debug, Clone)]
pub struct SafeFileMover {
    attempts: u32,
    delay: Duration,
    backup_directory: Option<String>,
    resolver: CollisionResolver,
}

impl SafeFileMover {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            backup_directory: None,
            resolver: CollisionResolver::new(),
        }
    }

    pub fn from_config(config: &FileOperationsConfig) -> Self {
        let mover = Self::new(config.safe_move_retries, config.retry_delay());
        if config.backup_originals {
            mover.with_backup(config.backup_directory.clone())
        } else {
            mover
        }
    }

    /// Copies each source into `<source dir>/<name>/` before moving it.
    pub fn with_backup(mut self, directory_name: impl Into<String>) -> Self {
        self.backup_directory = Some(directory_name.into());
        self
    }

    pub fn move_file(&self, source: &Path, target: &Path) -> Result<MoveOutcome, FileOperationError> {
        if std::fs::symlink_metadata(source).is_err() {
            return Err(FileOperationError::SourceMissing(source.to_path_buf()));
        }

        let backup = match &self.backup_directory {
            Some(name) => match self.backup(source, name) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Backup of {} failed, continuing: {}", source.display(), e);
                    None
                }
            },
            None => None,
        };

        let mut last_error = None;
        for attempt in 1..=self.attempts {
            if attempt > 1 && !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }

            match copy_verify_delete(source, target) {
                Ok(()) => {
                    debug!(
                        "Moved {} -> {} (attempt {})",
                        source.display(),
                        target.display(),
                        attempt
                    );
                    return Ok(MoveOutcome {
                        target: target.to_path_buf(),
                        backup,
                        attempts: attempt,
                    });
                }
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => {
                    debug!(
                        "Move attempt {}/{} for {} failed: {}",
                        attempt,
                        self.attempts,
                        source.display(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(FileOperationError::Exhausted {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            attempts: self.attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }

    fn backup(&self, source: &Path, directory_name: &str) -> Result<PathBuf, FileOperationError> {
        let parent = source.parent().unwrap_or_else(|| Path::new("."));
        let backup_dir = parent.join(directory_name);
        ensure_directory(&backup_dir)?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("original");
        let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("");
        let backup_path = self.resolver.resolve(&backup_dir, stem, extension)?;

        std::fs::copy(source, &backup_path).map_err(|e| FileOperationError::Copy {
            from: source.to_path_buf(),
            to: backup_path.clone(),
            source: e,
        })?;
        Ok(backup_path)
    }
}

fn is_retryable(error: &FileOperationError) -> bool {
    !matches!(
        error,
        FileOperationError::SourceMissing(_) | FileOperationError::TargetExists(_)
    )
}

fn ensure_directory(path: &Path) -> Result<(), FileOperationError> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| FileOperationError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// One attempt. On failure the target is removed again, so a failed attempt
/// leaves the filesystem as it found it.
fn copy_verify_delete(source: &Path, target: &Path) -> Result<(), FileOperationError> {
    let src = File::open(source).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FileOperationError::SourceMissing(source.to_path_buf()),
        _ => copy_error(source, target, e),
    })?;
    let src_meta = src.metadata().map_err(|e| copy_error(source, target, e))?;

    if let Some(parent) = target.parent() {
        ensure_directory(parent)?;
    }

    // O_EXCL: the resolver does not reserve names.
    let dst = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => FileOperationError::TargetExists(target.to_path_buf()),
            _ => copy_error(source, target, e),
        })?;

    let result = transfer(src, dst, &src_meta, source, target);

    if result.is_err() {
        if let Err(e) = std::fs::remove_file(target) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to clean up partial copy {}: {}", target.display(), e);
            }
        }
    }
    result
}

fn transfer(
    mut src: File,
    mut dst: File,
    src_meta: &std::fs::Metadata,
    source: &Path,
    target: &Path,
) -> Result<(), FileOperationError> {
    io::copy(&mut src, &mut dst).map_err(|e| copy_error(source, target, e))?;
    dst.set_permissions(src_meta.permissions())
        .map_err(|e| copy_error(source, target, e))?;
    copy_times(&dst, src_meta, target);
    dst.sync_all().map_err(|e| copy_error(source, target, e))?;
    drop(dst);

    let expected = src_meta.len();
    let actual = std::fs::metadata(target)
        .map_err(|e| copy_error(source, target, e))?
        .len();
    if actual != expected {
        return Err(FileOperationError::SizeMismatch {
            path: target.to_path_buf(),
            expected,
            actual,
        });
    }

    drop(src);
    std::fs::remove_file(source).map_err(|e| FileOperationError::RemoveSource {
        path: source.to_path_buf(),
        source: e,
    })
}

fn copy_times(dst: &File, src_meta: &std::fs::Metadata, target: &Path) {
    let mut times = FileTimes::new();
    if let Ok(modified) = src_meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = src_meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Err(e) = dst.set_times(times) {
        debug!("Could not copy timestamps to {}: {}", target.display(), e);
    }
}

fn copy_error(from: &Path, to: &Path, source: io::Error) -> FileOperationError {
    FileOperationError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mover() -> SafeFileMover {
        SafeFileMover::new(3, Duration::ZERO)
    }

    #[test]
    fn test_move_success() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("IMG_0001.jpg");
        let target = temp_dir.path().join("red-barn.jpg");
        std::fs::write(&source, b"jpeg bytes").unwrap();

        let outcome = mover().move_file(&source, &target).unwrap();

        assert!(!source.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg bytes");
        assert_eq!(outcome.target, target);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.backup.is_none());
    }

    #[test]
    fn test_move_creates_target_directory() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.png");
        let target = temp_dir.path().join("nested/dir/b.png");
        std::fs::write(&source, b"png").unwrap();

        mover().move_file(&source, &target).unwrap();
        assert!(target.exists());
        assert!(!source.exists());
    }

    #[test]
    fn test_move_preserves_modified_time() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.png");
        let target = temp_dir.path().join("b.png");
        std::fs::write(&source, b"png").unwrap();
        let old = std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(old)
            .unwrap();

        mover().move_file(&source, &target).unwrap();
        assert_eq!(std::fs::metadata(&target).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn test_missing_source_fails_without_retry() {
        let temp_dir = TempDir::new().unwrap();
        let result = mover().move_file(
            &temp_dir.path().join("gone.jpg"),
            &temp_dir.path().join("target.jpg"),
        );
        assert!(matches!(result, Err(FileOperationError::SourceMissing(_))));
        assert!(!temp_dir.path().join("target.jpg").exists());
    }

    #[test]
    fn test_existing_target_is_never_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.jpg");
        let target = temp_dir.path().join("b.jpg");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&target, b"old").unwrap();

        let result = mover().move_file(&source, &target);
        assert!(matches!(result, Err(FileOperationError::TargetExists(_))));
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert_eq!(std::fs::read(&source).unwrap(), b"new");
    }

    #[test]
    fn test_failing_every_retry_leaves_source_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.jpg");
        std::fs::write(&source, b"data").unwrap();
        // A regular file where the target's parent directory should be.
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let target = blocker.join("b.jpg");

        let result = mover().move_file(&source, &target);

        match result {
            Err(FileOperationError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(std::fs::read(&source).unwrap(), b"data");
        assert!(!target.exists());
    }

    #[test]
    fn test_backup_copy_is_made() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("IMG_1.jpg");
        let target = temp_dir.path().join("dog.jpg");
        std::fs::write(&source, b"orig").unwrap();

        let outcome = mover()
            .with_backup(".originals")
            .move_file(&source, &target)
            .unwrap();

        let backup = outcome.backup.unwrap();
        assert_eq!(backup, temp_dir.path().join(".originals/IMG_1.jpg"));
        assert_eq!(std::fs::read(&backup).unwrap(), b"orig");
        assert!(target.exists());
    }

    #[test]
    fn test_backup_failure_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("IMG_1.jpg");
        let target = temp_dir.path().join("dog.jpg");
        std::fs::write(&source, b"orig").unwrap();
        std::fs::write(temp_dir.path().join("backups"), b"not a dir").unwrap();

        let outcome = mover()
            .with_backup("backups")
            .move_file(&source, &target)
            .unwrap();

        assert!(outcome.backup.is_none());
        assert!(target.exists());
        assert!(!source.exists());
    }

    #[test]
    fn test_from_config_enables_backup() {
        let config = FileOperationsConfig {
            backup_originals: true,
            ..Default::default()
        };
        let mover = SafeFileMover::from_config(&config);
        assert_eq!(mover.backup_directory.as_deref(), Some(".originals"));
        assert_eq!(mover.attempts, 3);
    }
}

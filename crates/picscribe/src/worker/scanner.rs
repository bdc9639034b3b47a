use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use walkdir::{DirEntry, WalkDir};

use crate::config::ImagesConfig;
use crate::error::WorkerError;
use crate::worker::job::CandidateFile;

/// Finds candidate images under a root path.
///
/// A root that is a file yields exactly that file, whatever its extension, so
/// an explicit request for an unsupported file is reported rather than dropped.
pub struct DirectoryScanner {
    root: PathBuf,
    extensions: Vec<String>,
    recursive: bool,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(root: P, images: &ImagesConfig) -> Self {
        Self {
            root: absolute(root.as_ref()),
            extensions: images
                .supported_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            recursive: images.recursive,
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|s| s.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Returns candidates sorted by path. Oversize files are included; they
    /// fail validation later so the run summary reports them.
    pub fn scan(&self) -> Result<Vec<CandidateFile>, WorkerError> {
        let metadata = std::fs::metadata(&self.root)
            .map_err(|_| WorkerError::InvalidRoot(self.root.clone()))?;

        if metadata.is_file() {
            debug!("Scanning single file {}", self.root.display());
            return Ok(vec![CandidateFile::from_path(&self.root)]);
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut candidates = Vec::new();

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Unreadable subtrees are skipped; the root itself was checked above.
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.is_supported(path) {
                debug!("Found image: {}", path.display());
                candidates.push(CandidateFile::from_path(path));
            }
        }

        candidates.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            "Scanned {} images in {}",
            candidates.len(),
            self.root.display()
        );
        Ok(candidates)
    }

    /// Polls the root and calls `callback` for every new or changed supported
    /// file until `shutdown` is set.
    pub fn watch<F>(
        &self,
        callback: F,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Result<(), WorkerError>
    where
        F: Fn(PathBuf),
    {
        if !self.root.is_dir() {
            return Err(WorkerError::InvalidRoot(self.root.clone()));
        }

        // PollWatcher works on network mounts where inotify does not.
        let poll_config = NotifyConfig::default().with_poll_interval(poll_interval);

        let debouncer_config = DebouncerConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        debouncer
            .watcher()
            .watch(&self.root, mode)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching directory: {}", self.root.display());

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Watch mode shutting down...");
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let path = &event.path;
                        if !path.is_file() || self.is_hidden_below_root(path) {
                            continue;
                        }
                        if !self.recursive && path.parent() != Some(self.root.as_path()) {
                            continue;
                        }
                        if self.is_supported(path) {
                            info!("New image detected: {}", path.display());
                            callback(path.to_path_buf());
                        }
                    }
                }
                Ok(Err(errors)) => {
                    warn!("Watch error: {:?}", errors);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watch channel disconnected");
                    break;
                }
            }
        }

        Ok(())
    }

    fn is_hidden_below_root(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root)
            .map(|relative| {
                relative
                    .components()
                    .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            })
            .unwrap_or(true)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::metadata::EmbedOutcome;

use super::error::FailureKind;

/// What a successful file run changed, or would have changed in a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Described {
        description: String,
        embedded: EmbedOutcome,
    },
    Renamed {
        target: PathBuf,
        backup: Option<PathBuf>,
    },
    /// The derived name already matched the file.
    NameUnchanged,
    PlannedDescription {
        description: String,
    },
    PlannedRename {
        target: PathBuf,
    },
}

/// Terminal state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Succeeded {
        path: PathBuf,
        action: Action,
    },
    /// Already has a record and the run was not forced.
    Skipped { path: PathBuf },
    Failed {
        path: PathBuf,
        kind: FailureKind,
        message: String,
    },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Succeeded { path, .. }
            | FileOutcome::Skipped { path }
            | FileOutcome::Failed { path, .. } => path,
        }
    }

    /// Files this outcome created or rewrote.
    pub fn produced_paths(&self) -> Vec<PathBuf> {
        match self {
            FileOutcome::Succeeded { path, action } => match action {
                Action::Described { embedded, .. } => match embedded {
                    EmbedOutcome::Embedded => vec![path.clone()],
                    EmbedOutcome::Sidecar(sidecar) => vec![sidecar.clone()],
                },
                Action::Renamed { target, backup } => {
                    let mut paths = vec![target.clone()];
                    paths.extend(backup.iter().cloned());
                    paths
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Aggregate of one run, built as files finish.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailedFile>,
    pub outcomes: Vec<FileOutcome>,
    /// Set when a shutdown request stopped the run before every file finished.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn record(&mut self, outcome: FileOutcome) {
        self.attempted += 1;
        match &outcome {
            FileOutcome::Succeeded { .. } => self.succeeded += 1,
            FileOutcome::Skipped { .. } => self.skipped += 1,
            FileOutcome::Failed {
                path,
                kind,
                message,
            } => {
                self.failed += 1;
                self.failures.push(FailedFile {
                    path: path.clone(),
                    kind: *kind,
                    message: message.clone(),
                });
            }
        }
        self.outcomes.push(outcome);
    }

    /// Folds another summary in, used by watch mode across batches.
    pub fn merge(&mut self, other: RunSummary) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.failures.extend(other.failures);
        self.outcomes.extend(other.outcomes);
        self.interrupted |= other.interrupted;
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }

    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    pub fn log(&self) {
        tracing::info!(
            attempted = self.attempted,
            succeeded = self.succeeded,
            skipped = self.skipped,
            failed = self.failed,
            interrupted = self.interrupted,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Run finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(path: &str, kind: FailureKind) -> FileOutcome {
        FileOutcome::Failed {
            path: PathBuf::from(path),
            kind,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_record_counts() {
        let mut summary = RunSummary::default();
        summary.record(FileOutcome::Succeeded {
            path: PathBuf::from("/a.jpg"),
            action: Action::NameUnchanged,
        });
        summary.record(FileOutcome::Skipped {
            path: PathBuf::from("/b.jpg"),
        });
        summary.record(failed("/c.jpg", FailureKind::TooLarge));

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].path, PathBuf::from("/c.jpg"));
        assert_eq!(summary.failures_of(FailureKind::TooLarge), 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_merge() {
        let mut first = RunSummary::default();
        first.record(failed("/a.jpg", FailureKind::Timeout));
        let mut second = RunSummary::default();
        second.record(FileOutcome::Skipped {
            path: PathBuf::from("/b.jpg"),
        });
        second.interrupted = true;

        first.merge(second);
        assert_eq!(first.attempted, 2);
        assert_eq!(first.outcomes.len(), 2);
        assert!(first.interrupted);
    }

    #[test]
    fn test_produced_paths() {
        let renamed = FileOutcome::Succeeded {
            path: PathBuf::from("/in/IMG_1.jpg"),
            action: Action::Renamed {
                target: PathBuf::from("/in/cat.jpg"),
                backup: Some(PathBuf::from("/in/.originals/IMG_1.jpg")),
            },
        };
        assert_eq!(
            renamed.produced_paths(),
            vec![
                PathBuf::from("/in/cat.jpg"),
                PathBuf::from("/in/.originals/IMG_1.jpg")
            ]
        );

        let sidecar = FileOutcome::Succeeded {
            path: PathBuf::from("/in/a.gif"),
            action: Action::Described {
                description: "x".to_string(),
                embedded: EmbedOutcome::Sidecar(PathBuf::from("/in/a.gif.xmp")),
            },
        };
        assert_eq!(sidecar.produced_paths(), vec![PathBuf::from("/in/a.gif.xmp")]);
        assert!(failed("/x.jpg", FailureKind::Store).produced_paths().is_empty());
    }
}

use std::path::PathBuf;

use super::summary::FileOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Inferring,
    Persisting,
    Embedding,
    PlanningRename,
    Moving,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Validating => "validating",
            Phase::Inferring => "describing",
            Phase::Persisting => "saving",
            Phase::Embedding => "embedding metadata",
            Phase::PlanningRename => "planning rename",
            Phase::Moving => "moving",
        }
    }
}

/// Events emitted while a run progresses.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Discovery finished; `total` files will be run.
    RunStarted { total: usize },
    Phase { path: PathBuf, phase: Phase },
    Finished { outcome: FileOutcome },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for tests and quiet runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

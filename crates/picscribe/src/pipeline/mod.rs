pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod summary;

pub use config::{Mode, PipelineConfig, RunOptions};
pub use context::{redact_path, PipelineContext};
pub use error::{FailureKind, PipelineError};
pub use orchestrator::{open_store, BatchOrchestrator};
pub use progress::{NoopProgress, Phase, ProgressEvent, ProgressReporter};
pub use runner::Pipeline;
pub use summary::{Action, FailedFile, FileOutcome, RunSummary};

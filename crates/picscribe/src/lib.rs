pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod storage;
pub mod validation;
pub mod worker;

pub use config::{load_config, resolve_config, Config, ImageFormat};
pub use db::{DatabaseError, DescriptionRecord, DescriptionStore};
pub use error::{
    ConfigError, FileOperationError, MetadataError, PicscribeError, Result, ValidationError,
    WorkerError,
};
pub use inference::{InferenceClient, InferenceError, VisionBackend};
pub use metadata::{EmbedOutcome, MetadataWriter};
pub use naming::{NameDeriver, NameOptions};
pub use pipeline::{
    BatchOrchestrator, FailureKind, FileOutcome, Mode, Pipeline, PipelineConfig, RunOptions,
    RunSummary,
};
pub use storage::{CollisionResolver, SafeFileMover};
pub use worker::{CandidateFile, DirectoryScanner};

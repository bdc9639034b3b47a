use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PicscribeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Inference error: {0}")]
    Inference(#[from] crate::inference::InferenceError),

    #[error("File operation error: {0}")]
    FileOperation(#[from] FileOperationError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Cannot reach vision endpoint at {endpoint}")]
    Preflight { endpoint: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Invalid value for '{key}' from environment: {reason}")]
    EnvOverride { key: String, reason: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Local checks a file must pass before it is sent anywhere.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Image file not found: {0}")]
    Missing(PathBuf),

    #[error("Path is not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Unsupported image format '{extension}' for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Image file too large: {size} bytes (limit {limit} bytes): {path}")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Image verification failed for '{path}': {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum FileOperationError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source file disappeared: {0}")]
    SourceMissing(PathBuf),

    #[error("Target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy of '{path}' is {actual} bytes, expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to remove source '{path}': {source}")]
    RemoveSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Moving '{from}' to '{to}' failed after {attempts} attempts: {reason}")]
    Exhausted {
        from: PathBuf,
        to: PathBuf,
        attempts: u32,
        reason: String,
    },

    #[error("No free name for '{base}' in '{directory}'")]
    NoUniqueName { directory: PathBuf, base: String },
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {format} data in '{path}': {reason}")]
    Malformed {
        path: PathBuf,
        format: &'static str,
        reason: String,
    },

    #[error("Description too large for a {format} metadata block ({size} bytes)")]
    TooLarge { format: &'static str, size: usize },

    #[error("Embedding metadata is not supported for '{0}'")]
    Unsupported(PathBuf),

    #[error("Invalid XMP packet: {0}")]
    Xmp(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Path does not exist: {0}")]
    InvalidRoot(PathBuf),

    #[error("Watch error: {0}")]
    WatchError(String),
}

pub type Result<T> = std::result::Result<T, PicscribeError>;

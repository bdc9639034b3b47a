use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{FileOperationError, MetadataError, ValidationError};
use crate::inference::InferenceError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Store write failed: {0}")]
    Store(#[from] DatabaseError),

    #[error("File operation failed: {0}")]
    FileOperation(#[from] FileOperationError),

    /// The description is already in the store when this is raised.
    #[error("Description recorded but metadata embedding failed: {0}")]
    Metadata(#[from] MetadataError),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation(e) => match e {
                ValidationError::Missing(_) | ValidationError::NotAFile(_) => FailureKind::Missing,
                ValidationError::UnsupportedFormat { .. } => FailureKind::UnsupportedFormat,
                ValidationError::TooLarge { .. } => FailureKind::TooLarge,
                ValidationError::Corrupted { .. } => FailureKind::ImageCorrupted,
            },
            PipelineError::ReadImage { source, .. } => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    FailureKind::Missing
                } else {
                    FailureKind::FileOperation
                }
            }
            PipelineError::Inference(e) => match e {
                InferenceError::Unreachable { .. } => FailureKind::Unreachable,
                InferenceError::Timeout { .. } => FailureKind::Timeout,
                InferenceError::MalformedResponse(_) => FailureKind::MalformedResponse,
                InferenceError::ServerError { .. } => FailureKind::ServerError,
            },
            PipelineError::Store(_) => FailureKind::Store,
            PipelineError::FileOperation(FileOperationError::SourceMissing(_)) => {
                FailureKind::Missing
            }
            PipelineError::FileOperation(_) => FailureKind::FileOperation,
            PipelineError::Metadata(_) => FailureKind::Metadata,
        }
    }
}

/// Classification attached to every failed file in a run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    Unreachable,
    Timeout,
    MalformedResponse,
    ServerError,
    ImageCorrupted,
    UnsupportedFormat,
    TooLarge,
    Missing,
    Store,
    FileOperation,
    Metadata,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unreachable => "unreachable",
            FailureKind::Timeout => "timeout",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::ServerError => "server_error",
            FailureKind::ImageCorrupted => "image_corrupted",
            FailureKind::UnsupportedFormat => "unsupported_format",
            FailureKind::TooLarge => "too_large",
            FailureKind::Missing => "missing",
            FailureKind::Store => "store",
            FailureKind::FileOperation => "file_operation",
            FailureKind::Metadata => "metadata",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validation_kinds() {
        let too_large = PipelineError::from(ValidationError::TooLarge {
            path: PathBuf::from("/a.jpg"),
            size: 10,
            limit: 5,
        });
        assert_eq!(too_large.kind(), FailureKind::TooLarge);

        let corrupted = PipelineError::from(ValidationError::Corrupted {
            path: PathBuf::from("/a.jpg"),
            reason: "truncated".to_string(),
        });
        assert_eq!(corrupted.kind(), FailureKind::ImageCorrupted);
    }

    #[test]
    fn test_inference_kinds() {
        let timeout = PipelineError::from(InferenceError::Timeout {
            timeout: Duration::from_secs(30),
        });
        assert_eq!(timeout.kind(), FailureKind::Timeout);

        let server = PipelineError::from(InferenceError::ServerError {
            status: 503,
            body: String::new(),
        });
        assert_eq!(server.kind(), FailureKind::ServerError);
    }

    #[test]
    fn test_missing_source_at_move_time() {
        let err = PipelineError::from(FileOperationError::SourceMissing(PathBuf::from("/a.jpg")));
        assert_eq!(err.kind(), FailureKind::Missing);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(FailureKind::MalformedResponse.to_string(), "malformed_response");
        assert_eq!(FailureKind::TooLarge.to_string(), "too_large");
    }
}

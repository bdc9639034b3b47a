use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::ImageFormat;

/// A discovered file eligible for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Absolute path.
    pub path: PathBuf,
    pub size: u64,
    /// Declared by the extension; the content is checked later.
    pub format: ImageFormat,
    pub modified: Option<SystemTime>,
}

impl CandidateFile {
    /// Builds a candidate from filesystem metadata. Missing files still yield a
    /// candidate with size 0 so the pipeline can report them.
    pub fn from_path(path: &Path) -> Self {
        let metadata = std::fs::metadata(path).ok();
        Self {
            path: path.to_path_buf(),
            size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
            format: ImageFormat::from_extension(extension_of(path)),
            modified: metadata.and_then(|m| m.modified().ok()),
        }
    }

    pub fn extension(&self) -> &str {
        extension_of(&self.path)
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unknown>")
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// One unit of work handed to the pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub candidate: CandidateFile,
}

impl Job {
    pub fn new(candidate: CandidateFile) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            candidate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.candidate.path
    }
}

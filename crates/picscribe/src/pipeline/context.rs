use std::path::Path;

use crate::config::ImageFormat;
use crate::worker::job::Job;

pub struct PipelineContext<'a> {
    // Input
    pub job: &'a Job,

    // Set by the validate step
    pub format: ImageFormat,
    pub image: Vec<u8>,

    // Set by the infer step
    pub description: Option<String>,
    pub inference_attempts: u32,
}

impl<'a> PipelineContext<'a> {
    pub fn new(job: &'a Job) -> Self {
        Self {
            job,
            format: job.candidate.format,
            image: Vec::new(),
            description: None,
            inference_attempts: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.job.candidate.path
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Returns only the file name of a path, safe for span fields.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

use std::fmt;
use std::str::FromStr;

use crate::config::Config;

/// Which branch the per-file state machine takes after inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Record the description and embed it as metadata.
    #[default]
    Describe,
    /// Derive a filename from the description and move the file.
    Rename,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Describe => f.write_str("describe"),
            Mode::Rename => f.write_str("rename"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "describe" | "process" => Ok(Mode::Describe),
            "rename" => Ok(Mode::Rename),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Mode,
    pub dry_run: bool,
    pub force: bool,
    pub prompt: Option<String>,
}

pub struct PipelineConfig {
    pub mode: Mode,
    pub dry_run: bool,
    pub force: bool,
    pub prompt: String,
    pub supported_extensions: Vec<String>,
    pub max_file_size: u64,
    pub verify_images: bool,
    pub record_renames: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &Config, options: &RunOptions) -> Self {
        let default_prompt = match options.mode {
            Mode::Describe => &config.ollama.describe_prompt,
            Mode::Rename => &config.ollama.filename_prompt,
        };

        Self {
            mode: options.mode,
            dry_run: options.dry_run,
            force: options.force,
            prompt: options
                .prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| default_prompt.clone()),
            supported_extensions: config.images.supported_extensions.clone(),
            max_file_size: config.images.max_file_size_bytes(),
            verify_images: config.images.verify_before_processing,
            record_renames: config.processing.record_renames,
        }
    }
}

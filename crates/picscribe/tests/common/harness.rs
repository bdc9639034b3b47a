//! Test harness for isolated pipeline runs.
//!
//! Every harness owns a temp input directory, an in-memory description store
//! and a `Config` with all retry delays set to zero.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use picscribe::config::Config;
use picscribe::db::DescriptionStore;
use picscribe::inference::{InferenceClient, RetryPolicy};
use picscribe::pipeline::{BatchOrchestrator, NoopProgress, Pipeline, RunOptions, RunSummary};
use picscribe::worker::DirectoryScanner;

use super::fakes::FakeBackend;

pub struct TestHarness {
    temp_dir: TempDir,
    /// Canonical path, matching the keys the store records.
    pub input_dir: PathBuf,
    pub config: Config,
    pub store: DescriptionStore,
    pub backend: Arc<FakeBackend>,
}

impl TestHarness {
    pub fn new(backend: FakeBackend) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        let input_dir = input_dir.canonicalize().expect("Failed to canonicalize input dir");

        let mut config = Config::default();
        config.ollama.retry_delay = 0.0;
        config.file_operations.retry_delay = 0.0;
        config.metadata.retry_delay = 0.0;

        Self {
            temp_dir,
            input_dir,
            config,
            store: DescriptionStore::open_in_memory().expect("Failed to open store"),
            backend: Arc::new(backend),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.input_dir.join(name)
    }

    pub fn write_bytes(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Writes a small real image; the format follows the extension of `name`.
    pub fn write_image(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        image::RgbImage::from_pixel(8, 8, image::Rgb([120, 60, 30]))
            .save(&path)
            .expect("Failed to write image fixture");
        path
    }

    pub fn client(&self) -> InferenceClient {
        InferenceClient::new(
            self.backend.clone(),
            RetryPolicy::from_config(&self.config.ollama),
            self.config.ollama.model.clone(),
            self.config.ollama.timeout(),
        )
    }

    pub fn pipeline(&self, options: &RunOptions) -> Pipeline {
        Pipeline::from_config(&self.config, options, self.client(), self.store.clone())
    }

    pub fn orchestrator(&self, options: &RunOptions) -> BatchOrchestrator {
        BatchOrchestrator::new(
            Arc::new(self.pipeline(options)),
            self.config.processing.workers,
        )
    }

    pub fn scanner(&self) -> DirectoryScanner {
        DirectoryScanner::new(&self.input_dir, &self.config.images)
    }

    /// One batch over the input directory.
    pub fn run(&self, options: &RunOptions) -> RunSummary {
        self.orchestrator(options)
            .run_path(&self.scanner(), Arc::new(NoopProgress))
            .expect("scan failed")
    }

    /// Names of the regular files directly in the input directory, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.input_dir)
            .expect("Failed to read input dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

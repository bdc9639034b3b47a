use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use crate::config::DatabaseConfig;
use crate::db::{DatabaseError, DescriptionStore};
use crate::error::WorkerError;
use crate::worker::{CandidateFile, DirectoryScanner, Job, WorkerPool};

use super::progress::{ProgressEvent, ProgressReporter};
use super::runner::Pipeline;
use super::summary::RunSummary;

/// Opens the store for one run. A dry run against a database that does not
/// exist yet gets an in-memory store so nothing is left on disk.
pub fn open_store(config: &DatabaseConfig, dry_run: bool) -> Result<DescriptionStore, DatabaseError> {
    if dry_run && !config.path.exists() {
        info!(
            "Dry run: {} does not exist, using an in-memory store",
            config.path.display()
        );
        return DescriptionStore::open_in_memory();
    }
    DescriptionStore::open(&config.path)
}

/// Drives discovered files through the pipeline and aggregates the outcomes.
pub struct BatchOrchestrator {
    pipeline: Arc<Pipeline>,
    workers: usize,
    shutdown: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Arc<Pipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares an externally owned flag, typically set by a Ctrl-C handler.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Discovers files under the scanner's root and runs them.
    pub fn run_path(
        &self,
        scanner: &DirectoryScanner,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<RunSummary, WorkerError> {
        let candidates = scanner.scan()?;
        Ok(self.run(candidates, progress))
    }

    /// Runs candidates in the given order. One file's failure never stops the
    /// batch; a shutdown request stops it between files.
    pub fn run(
        &self,
        candidates: Vec<CandidateFile>,
        progress: Arc<dyn ProgressReporter>,
    ) -> RunSummary {
        let started = Instant::now();
        let total = candidates.len();
        let _run_span = info_span!("run", files = total, workers = self.workers).entered();

        progress.report(ProgressEvent::RunStarted { total });
        info!("Processing {} files", total);

        let mut summary = if self.workers > 1 && total > 1 {
            self.run_pooled(candidates, progress)
        } else {
            self.run_sequential(candidates, progress.as_ref())
        };

        if summary.attempted < total {
            summary.interrupted = true;
            warn!(
                remaining = total - summary.attempted,
                "Run interrupted before all files were processed"
            );
        }
        summary.elapsed = started.elapsed();
        summary.log();
        summary
    }

    fn run_sequential(
        &self,
        candidates: Vec<CandidateFile>,
        progress: &dyn ProgressReporter,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for candidate in candidates {
            if self.is_shutdown() {
                break;
            }
            let job = Job::new(candidate);
            summary.record(self.pipeline.run(&job, progress));
        }
        summary
    }

    fn run_pooled(
        &self,
        candidates: Vec<CandidateFile>,
        progress: Arc<dyn ProgressReporter>,
    ) -> RunSummary {
        let pool = WorkerPool::new(
            Arc::clone(&self.pipeline),
            self.workers,
            progress,
            Arc::clone(&self.shutdown),
        );

        for (index, candidate) in candidates.into_iter().enumerate() {
            if let Err(e) = pool.submit(index, Job::new(candidate)) {
                debug!("Stopped submitting jobs: {}", e);
                break;
            }
        }

        let mut results = pool.finish();
        results.sort_by_key(|(index, _)| *index);

        let mut summary = RunSummary::default();
        for (_, outcome) in results {
            summary.record(outcome);
        }
        summary
    }

    /// Runs one batch over the scanner's root, then feeds every new file to the
    /// same pipeline until shutdown. Files this session wrote are ignored.
    pub fn watch(
        &self,
        scanner: &DirectoryScanner,
        poll_interval: Duration,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<RunSummary, WorkerError> {
        let started = Instant::now();
        let mut summary = self.run_path(scanner, Arc::clone(&progress))?;
        if self.is_shutdown() {
            return Ok(summary);
        }

        let produced: RefCell<HashSet<PathBuf>> = RefCell::new(
            summary
                .outcomes
                .iter()
                .flat_map(|o| o.produced_paths())
                .collect(),
        );
        let watched = RefCell::new(RunSummary::default());

        scanner.watch(
            |path| {
                if produced.borrow().contains(&path) {
                    debug!("Ignoring file written by this session: {}", path.display());
                    return;
                }
                let job = Job::new(CandidateFile::from_path(&path));
                let outcome = self.pipeline.run(&job, progress.as_ref());
                produced.borrow_mut().extend(outcome.produced_paths());
                watched.borrow_mut().record(outcome);
            },
            Arc::clone(&self.shutdown),
            poll_interval,
        )?;

        summary.merge(watched.into_inner());
        summary.interrupted |= self.is_shutdown();
        summary.elapsed = started.elapsed();
        summary.log();
        Ok(summary)
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{FileOutcome, Pipeline, ProgressReporter};
use crate::worker::job::Job;

const POLL: Duration = Duration::from_millis(100);

/// A job tagged with its position in discovery order.
type Indexed<T> = (usize, T);

/// Bounded pool of threads running the per-file pipeline.
///
/// Results arrive in completion order, tagged with the index given at
/// submission so the caller can restore discovery order.
pub struct WorkerPool {
    job_sender: Sender<Indexed<Job>>,
    result_receiver: Receiver<Indexed<FileOutcome>>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` threads (at least one). Setting `shutdown` makes
    /// workers stop picking up new jobs.
    pub fn new(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        progress: Arc<dyn ProgressReporter>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = bounded::<Indexed<Job>>(worker_count * 2);
        let (result_sender, result_receiver) = unbounded::<Indexed<FileOutcome>>();

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);
            let worker_progress = Arc::clone(&progress);

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    job_rx,
                    result_tx,
                    shutdown_flag,
                    worker_pipeline,
                    worker_progress,
                );
            });

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        }
    }

    /// Blocks while the queue is full. Fails once shutdown is requested.
    pub fn submit(&self, index: usize, job: Job) -> Result<(), WorkerError> {
        let mut item = (index, job);
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(WorkerError::ChannelClosed);
            }
            match self.job_sender.send_timeout(item, POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => item = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(WorkerError::ChannelClosed),
            }
        }
    }

    /// Closes the queue, joins every worker and returns all results that were
    /// produced.
    pub fn finish(self) -> Vec<(usize, FileOutcome)> {
        // Dropping the sender lets idle workers exit once the queue drains.
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
        self.result_receiver.try_iter().collect()
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Indexed<Job>>,
    result_sender: Sender<Indexed<FileOutcome>>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    progress: Arc<dyn ProgressReporter>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(POLL) {
            Ok((index, job)) => {
                debug!("Worker {} processing job: {:?}", worker_id, job.path());

                let outcome = pipeline.run(&job, progress.as_ref());

                if let Err(e) = result_sender.send((index, outcome)) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

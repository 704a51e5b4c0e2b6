//! Pipeline orchestration
//!
//! [`PipelineContext`] holds everything the manager and the workers share.
//! Each field keeps its own guard and none is taken while another is held.
//! [`Pipeline`] builds the context, runs one manager thread and the worker
//! pool, joins them and produces a [`RunReport`].

use crate::config::PipelineConfig;
use crate::core::{
    BoundedQueue, CancelReason, CancellationToken, CopyStatistics, CopyTask, DrainBarrier,
    Manager, RunOutcome, RunReport, Worker, WorkerSummary,
};
use crate::error::{MirrorCopyError, Result};
use crate::progress::ProgressReporter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

/// State shared by the manager and every worker
pub struct PipelineContext {
    config: PipelineConfig,
    queue: BoundedQueue<CopyTask>,
    token: CancellationToken,
    stats: CopyStatistics,
    finished_workers: Mutex<usize>,
    barrier: Arc<DrainBarrier>,
    progress: Arc<ProgressReporter>,
}

impl PipelineContext {
    /// Create a context with a fresh token and hidden progress
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let barrier = Arc::new(DrainBarrier::new(config.workers));
        Self::from_parts(
            config,
            CancellationToken::new(),
            barrier,
            Arc::new(ProgressReporter::disabled()),
        )
    }

    fn from_parts(
        config: PipelineConfig,
        token: CancellationToken,
        barrier: Arc<DrainBarrier>,
        progress: Arc<ProgressReporter>,
    ) -> Result<Self> {
        if config.workers == 0 {
            return Err(MirrorCopyError::config("worker count must be a positive integer"));
        }
        let queue = BoundedQueue::new(config.capacity, token.clone())?;

        Ok(Self {
            config,
            queue,
            token,
            stats: CopyStatistics::new(),
            finished_workers: Mutex::new(0),
            barrier,
            progress,
        })
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The task queue
    pub fn queue(&self) -> &BoundedQueue<CopyTask> {
        &self.queue
    }

    /// The cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Shared statistics
    pub fn stats(&self) -> &CopyStatistics {
        &self.stats
    }

    /// The worker rendezvous
    pub fn barrier(&self) -> &DrainBarrier {
        &self.barrier
    }

    /// Progress reporter
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Number of workers in the pool
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Lock the finished-worker counter
    pub fn finished_workers(&self) -> MutexGuard<'_, usize> {
        self.finished_workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the pipeline, waking blocked producers and barrier waiters
    ///
    /// Idle workers keep waiting until the manager closes the queue.
    /// Returns `true` if this call performed the first cancellation.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        cancel_parts(&self.token, &self.barrier, reason)
    }
}

fn cancel_parts(token: &CancellationToken, barrier: &DrainBarrier, reason: CancelReason) -> bool {
    let first = token.cancel(reason);
    barrier.interrupt();
    first
}

/// Handle for requesting shutdown from outside the pipeline
#[derive(Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    barrier: Arc<DrainBarrier>,
}

impl ShutdownHandle {
    /// Request a shutdown; the walk stops and already queued tasks are
    /// still copied
    pub fn shutdown(&self) -> bool {
        cancel_parts(&self.token, &self.barrier, CancelReason::Interrupted)
    }

    /// Check whether the pipeline has been cancelled for any reason
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One copy run: a manager thread feeding a pool of workers
pub struct Pipeline {
    config: PipelineConfig,
    token: CancellationToken,
    barrier: Arc<DrainBarrier>,
    progress: Arc<ProgressReporter>,
}

impl Pipeline {
    /// Create a pipeline after validating its configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let barrier = Arc::new(DrainBarrier::new(config.workers));
        Ok(Self {
            config,
            token: CancellationToken::new(),
            barrier,
            progress: Arc::new(ProgressReporter::disabled()),
        })
    }

    /// Set progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Handle that cancels this pipeline from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.token.clone(),
            barrier: Arc::clone(&self.barrier),
        }
    }

    /// Run the pipeline to completion
    ///
    /// Per-entry failures and a failed copy do not make this return an
    /// error; they are reflected in the report. Errors mean the pipeline
    /// could not be set up or a thread died.
    pub fn run(self) -> Result<RunReport> {
        let context = Arc::new(PipelineContext::from_parts(
            self.config,
            self.token,
            self.barrier,
            Arc::clone(&self.progress),
        )?);

        tracing::info!(
            source = %context.config().source.display(),
            destination = %context.config().destination.display(),
            workers = context.workers(),
            capacity = context.queue().capacity(),
            "Starting copy pipeline"
        );
        self.progress.set_status("Copying...");

        let start = Instant::now();

        let manager = {
            let manager = Manager::new(Arc::clone(&context));
            thread::Builder::new()
                .name("copy-manager".to_string())
                .spawn(move || manager.run())
                .map_err(|e| MirrorCopyError::ThreadPoolError(e.to_string()))?
        };

        let mut workers = Vec::with_capacity(context.workers());
        for worker_id in 0..context.workers() {
            let worker = Worker::new(worker_id, Arc::clone(&context));
            let spawned = thread::Builder::new()
                .name(format!("copy-worker-{}", worker_id))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // The barrier can never fill; release whoever already started.
                    context.cancel(CancelReason::Failed);
                    join_all(manager, workers)?;
                    return Err(MirrorCopyError::ThreadPoolError(format!(
                        "failed to spawn worker {}: {}",
                        worker_id, e
                    )));
                }
            }
        }

        let summaries = join_all(manager, workers)?;
        let elapsed = start.elapsed();
        let rendezvous = summaries.iter().filter(|s| s.rendezvous).count();
        tracing::debug!(
            rendezvous,
            workers = summaries.len(),
            "Worker pool joined"
        );

        let outcome = RunOutcome::from_reason(context.token().reason());
        let report = RunReport {
            workers: context.workers(),
            capacity: context.queue().capacity(),
            stats: context.stats().snapshot(),
            elapsed,
            outcome,
        };

        match outcome {
            RunOutcome::Completed => self.progress.finish_success("Copy complete"),
            RunOutcome::Interrupted => self.progress.finish_error("Copy interrupted"),
            RunOutcome::Failed => self.progress.finish_error("Copy failed"),
        }

        tracing::info!(
            files = report.stats.files_copied,
            bytes = report.stats.total_bytes,
            outcome = ?report.outcome,
            "Copy pipeline finished in {:.2?}",
            elapsed
        );

        Ok(report)
    }
}

fn join_all(
    manager: thread::JoinHandle<()>,
    workers: Vec<thread::JoinHandle<WorkerSummary>>,
) -> Result<Vec<WorkerSummary>> {
    let mut panicked = Vec::new();
    let mut summaries = Vec::with_capacity(workers.len());

    if manager.join().is_err() {
        panicked.push("copy-manager".to_string());
    }
    for (worker_id, handle) in workers.into_iter().enumerate() {
        match handle.join() {
            Ok(summary) => summaries.push(summary),
            Err(_) => panicked.push(format!("copy-worker-{}", worker_id)),
        }
    }

    if panicked.is_empty() {
        Ok(summaries)
    } else {
        Err(MirrorCopyError::ThreadPoolError(format!(
            "thread(s) panicked: {}",
            panicked.join(", ")
        )))
    }
}

/// Copy `source` into `destination` with the given pool shape
pub fn mirror_directory(
    source: impl Into<std::path::PathBuf>,
    destination: impl Into<std::path::PathBuf>,
    capacity: usize,
    workers: usize,
) -> Result<RunReport> {
    let config = PipelineConfig::new(source, destination)
        .with_capacity(capacity)
        .with_workers(workers);
    Pipeline::new(config)?.run()
}

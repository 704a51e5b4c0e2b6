//! The consumer side of the pipeline
//!
//! Each worker repeatedly takes a task from the queue, streams the source
//! into the destination through its own buffer and credits the result. A
//! failed copy aborts the whole pipeline; after an abort, queued tasks are
//! released without copying until the queue is closed and drained. An
//! exhausted or interrupted run still copies everything already queued.
//!
//! A FIFO source is read until the first empty or would-block read, so its
//! copy holds whatever the writer had produced by then.

use crate::core::{BarrierWait, CancelReason, CopyTask, PipelineContext};
use crate::fs::{copy_stream, EntryKind, StreamCopyError};
use std::sync::Arc;

/// What a single worker did over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Tasks copied to completion
    pub copied: u64,
    /// Bytes credited by this worker
    pub bytes: u64,
    /// Tasks dropped without a completed copy
    pub abandoned: u64,
    /// Whether this worker took part in the drain rendezvous
    pub rendezvous: bool,
}

/// Fails the pipeline if a worker unwinds
struct FailOnPanic<'a> {
    context: &'a PipelineContext,
}

impl Drop for FailOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.context.cancel(CancelReason::Failed);
        }
    }
}

/// A copy worker
pub struct Worker {
    id: usize,
    context: Arc<PipelineContext>,
    buffer: Vec<u8>,
    summary: WorkerSummary,
}

impl Worker {
    /// Create a worker for the given pipeline
    pub fn new(id: usize, context: Arc<PipelineContext>) -> Self {
        let buffer = vec![0u8; context.config().chunk_size.max(1)];
        Self {
            id,
            context,
            buffer,
            summary: WorkerSummary::default(),
        }
    }

    /// Consume tasks until the queue is closed and drained
    pub fn run(mut self) -> WorkerSummary {
        let context = Arc::clone(&self.context);
        let _guard = FailOnPanic { context: &context };
        tracing::debug!(worker = self.id, "Worker started");

        while let Some(task) = self.context.queue().dequeue() {
            if self.process(task) {
                self.drain_gate();
            }
        }

        *self.context.finished_workers() += 1;

        tracing::debug!(
            worker = self.id,
            copied = self.summary.copied,
            bytes = self.summary.bytes,
            abandoned = self.summary.abandoned,
            "Worker shutting down"
        );
        self.summary
    }

    /// Handle one task; returns `true` if a copy was attempted
    fn process(&mut self, task: CopyTask) -> bool {
        if self.context.token().is_aborted() {
            tracing::debug!(
                worker = self.id,
                path = %task.source_path.display(),
                "Releasing queued task after abort"
            );
            self.abandon();
            return false;
        }

        let id = task.id;
        let kind = task.kind;
        let source_path = task.source_path.clone();
        let dest_path = task.dest_path.clone();
        self.context
            .progress()
            .set_current_file(&source_path.to_string_lossy());

        match self.copy(task) {
            Ok(bytes) => {
                self.context.stats().record_copy(bytes);
                self.context.progress().record_copy(bytes);
                self.summary.copied += 1;
                self.summary.bytes += bytes;
                tracing::info!(
                    worker = self.id,
                    task = id,
                    "Copied {} to {}, {} bytes",
                    source_path.display(),
                    dest_path.display(),
                    bytes
                );
                if kind == EntryKind::Fifo {
                    tracing::debug!(
                        worker = self.id,
                        task = id,
                        path = %source_path.display(),
                        "FIFO copy stopped at the first empty read"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    worker = self.id,
                    task = id,
                    source = %source_path.display(),
                    destination = %dest_path.display(),
                    "Copy failed, cancelling pipeline: {}",
                    e
                );
                self.abandon();
                self.context.cancel(CancelReason::Failed);
            }
        }
        true
    }

    /// Stream one task; both handles are closed when this returns
    fn copy(&mut self, task: CopyTask) -> Result<u64, StreamCopyError> {
        let CopyTask {
            mut source,
            mut dest,
            ..
        } = task;
        copy_stream(&mut source, &mut dest, &mut self.buffer)
    }

    fn abandon(&mut self) {
        self.context.stats().record_abandoned();
        self.summary.abandoned += 1;
    }

    /// Join the pool-wide rendezvous once the backlog no longer covers
    /// every active worker
    fn drain_gate(&mut self) {
        let eligible = {
            let finished = self.context.finished_workers();
            let active = self.context.workers().saturating_sub(*finished);
            let queue = self.context.queue();

            *finished == 0
                && self.context.barrier().is_open()
                && queue.len() + active <= queue.capacity()
        };

        if !eligible {
            return;
        }

        tracing::debug!(worker = self.id, "Waiting at drain barrier");
        let outcome = self.context.barrier().wait();
        self.summary.rendezvous |= matches!(outcome, BarrierWait::Leader | BarrierWait::Follower);
        if outcome == BarrierWait::Leader {
            tracing::debug!(
                worker = self.id,
                parties = self.context.barrier().parties(),
                "All workers reached the drain barrier"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::fs::{create_destination, open_source, EntryKind};
    use std::fs::{self, File, OpenOptions};
    use std::path::Path;
    use std::thread;
    use tempfile::TempDir;

    fn context(dir: &Path, capacity: usize, workers: usize) -> Arc<PipelineContext> {
        let config = PipelineConfig::new(dir, dir.join("out"))
            .with_capacity(capacity)
            .with_workers(workers)
            .with_chunk_size(3);
        Arc::new(PipelineContext::new(config).unwrap())
    }

    fn task(id: u64, dir: &Path, name: &str, contents: &[u8]) -> CopyTask {
        let source_path = dir.join(name);
        fs::write(&source_path, contents).unwrap();
        let dest_path = dir.join(format!("{}.copy", name));
        CopyTask::new(
            id,
            EntryKind::Regular,
            source_path.clone(),
            dest_path.clone(),
            open_source(&source_path, EntryKind::Regular).unwrap(),
            create_destination(&dest_path).unwrap(),
        )
    }

    /// A task whose destination handle rejects every write
    fn unwritable_task(id: u64, dir: &Path) -> CopyTask {
        let mut task = task(id, dir, "doomed", b"will never land");
        task.dest = File::open(&task.dest_path).unwrap();
        task
    }

    /// A task whose source handle rejects every read
    fn unreadable_task(id: u64, dir: &Path) -> CopyTask {
        let mut task = task(id, dir, "sealed", b"never read back");
        task.source = OpenOptions::new().write(true).open(&task.source_path).unwrap();
        task
    }

    /// End production the way the manager does on its way out
    fn finish(ctx: &PipelineContext, reason: CancelReason) {
        ctx.cancel(reason);
        ctx.queue().close();
    }

    #[test]
    fn test_worker_copies_until_drained() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 4, 1);
        ctx.queue().enqueue(task(0, tmp.path(), "a", b"hello")).unwrap();
        ctx.queue().enqueue(task(1, tmp.path(), "b", b"abc")).unwrap();
        finish(&ctx, CancelReason::Exhausted);

        let summary = Worker::new(0, Arc::clone(&ctx)).run();

        assert_eq!(summary.copied, 2);
        assert_eq!(summary.bytes, 8);
        assert_eq!(fs::read(tmp.path().join("a.copy")).unwrap(), b"hello");
        assert_eq!(fs::read(tmp.path().join("b.copy")).unwrap(), b"abc");
        assert_eq!(ctx.stats().snapshot().total_bytes, 8);
        assert_eq!(*ctx.finished_workers(), 1);
    }

    #[test]
    fn test_write_failure_cancels_and_drains() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 4, 2);
        ctx.queue().enqueue(unwritable_task(0, tmp.path())).unwrap();
        ctx.queue().enqueue(task(1, tmp.path(), "later", b"queued")).unwrap();
        ctx.queue().close();

        let workers: Vec<_> = (0..2)
            .map(|id| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || Worker::new(id, ctx).run())
            })
            .collect();
        let summaries: Vec<WorkerSummary> =
            workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_eq!(ctx.token().reason(), Some(CancelReason::Failed));
        assert!(ctx.queue().is_empty());
        assert_eq!(*ctx.finished_workers(), 2);

        let stats = ctx.stats().snapshot();
        assert_eq!(stats.total_bytes, summaries.iter().map(|s| s.bytes).sum::<u64>());
        assert_eq!(stats.files_copied + stats.abandoned, 2);
        assert!(stats.abandoned >= 1);
        assert_eq!(fs::read(tmp.path().join("doomed.copy")).unwrap(), b"");
    }

    #[test]
    fn test_failed_task_is_not_credited() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 2, 1);
        ctx.queue().enqueue(unwritable_task(0, tmp.path())).unwrap();
        ctx.queue().enqueue(task(1, tmp.path(), "next", b"skipped")).unwrap();
        ctx.queue().close();

        let summary = Worker::new(0, Arc::clone(&ctx)).run();

        assert_eq!(summary.copied, 0);
        assert_eq!(summary.abandoned, 2);
        let stats = ctx.stats().snapshot();
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.abandoned, 2);
        // The second task was released, not copied
        assert_eq!(fs::read(tmp.path().join("next.copy")).unwrap(), b"");
    }

    #[test]
    fn test_read_failure_cancels_without_credit() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 4, 3);
        ctx.queue().enqueue(unreadable_task(0, tmp.path())).unwrap();
        for i in 1..4 {
            ctx.queue()
                .enqueue(task(i, tmp.path(), &format!("f{}", i), b"payload"))
                .unwrap();
        }
        ctx.queue().close();

        let workers: Vec<_> = (0..3)
            .map(|id| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || Worker::new(id, ctx).run())
            })
            .collect();
        let summaries: Vec<WorkerSummary> =
            workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_eq!(ctx.token().reason(), Some(CancelReason::Failed));
        assert_eq!(*ctx.finished_workers(), 3);

        let stats = ctx.stats().snapshot();
        assert!(stats.abandoned >= 1);
        assert_eq!(stats.files_copied + stats.abandoned, 4);
        assert_eq!(stats.total_bytes, summaries.iter().map(|s| s.bytes).sum::<u64>());
        assert_eq!(stats.total_bytes, stats.files_copied * 7);
        assert_eq!(fs::read(tmp.path().join("sealed.copy")).unwrap(), b"");
    }

    #[test]
    fn test_interrupt_still_copies_queued_tasks() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 3, 1);
        for i in 0..3 {
            ctx.queue()
                .enqueue(task(i, tmp.path(), &format!("f{}", i), b"data"))
                .unwrap();
        }
        finish(&ctx, CancelReason::Interrupted);

        let summary = Worker::new(0, Arc::clone(&ctx)).run();
        assert_eq!(summary.copied, 3);
        assert_eq!(summary.abandoned, 0);
        for i in 0..3 {
            assert_eq!(fs::read(tmp.path().join(format!("f{}.copy", i))).unwrap(), b"data");
        }
        assert_eq!(ctx.token().reason(), Some(CancelReason::Interrupted));
    }

    #[test]
    fn test_fifo_copy_ends_at_empty_read() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 2, 1);
        let mut fifo = task(0, tmp.path(), "pipe", b"buffered");
        fifo.kind = EntryKind::Fifo;
        ctx.queue().enqueue(fifo).unwrap();
        finish(&ctx, CancelReason::Exhausted);

        let summary = Worker::new(0, Arc::clone(&ctx)).run();
        assert_eq!(summary.copied, 1);
        assert_eq!(fs::read(tmp.path().join("pipe.copy")).unwrap(), b"buffered");
    }

    #[test]
    fn test_single_worker_passes_barrier_alone() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 2, 1);
        let worker = {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || Worker::new(0, ctx).run())
        };
        ctx.queue().enqueue(task(0, tmp.path(), "only", b"x")).unwrap();

        while !ctx.barrier().is_released() {
            thread::yield_now();
        }
        finish(&ctx, CancelReason::Exhausted);

        let summary = worker.join().unwrap();
        assert!(summary.rendezvous);
        assert_eq!(summary.copied, 1);
    }

    #[test]
    fn test_cancellation_closes_the_barrier() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 2, 1);
        ctx.queue().enqueue(task(0, tmp.path(), "only", b"x")).unwrap();
        finish(&ctx, CancelReason::Exhausted);

        // The rendezvous can no longer happen once the run is cancelled
        let summary = Worker::new(0, Arc::clone(&ctx)).run();
        assert!(!summary.rendezvous);
        assert_eq!(summary.copied, 1);
        assert!(!ctx.barrier().is_released());
    }

    #[test]
    fn test_pool_rendezvous_when_backlog_is_short() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path(), 4, 2);
        ctx.queue().enqueue(task(0, tmp.path(), "a", b"aaaa")).unwrap();
        ctx.queue().enqueue(task(1, tmp.path(), "b", b"bbbb")).unwrap();

        let workers: Vec<_> = (0..2)
            .map(|id| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || Worker::new(id, ctx).run())
            })
            .collect();

        // Both tasks fit under the gate; the workers meet before the
        // manager closes the queue and lets them exit.
        while !ctx.barrier().is_released() {
            thread::yield_now();
        }
        finish(&ctx, CancelReason::Exhausted);

        let summaries: Vec<WorkerSummary> =
            workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert!(summaries.iter().all(|s| s.rendezvous));
        assert_eq!(summaries.iter().map(|s| s.copied).sum::<u64>(), 2);
    }
}

//! The producer side of the pipeline
//!
//! The manager walks the source tree depth-first, mirrors directories into
//! the destination, opens both ends of every other entry and queues the
//! resulting tasks. Whatever way the walk ends, it cancels the token and
//! closes the queue on the way out so that the workers can drain and exit.

use crate::core::{CancelReason, CopyTask, PipelineContext};
use crate::fs::{create_destination, ensure_directory, open_source, EntryKind};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Cancels the pipeline and closes the queue when dropped, even while unwinding
struct CancelOnExit<'a> {
    context: &'a PipelineContext,
}

impl Drop for CancelOnExit<'_> {
    fn drop(&mut self) {
        let reason = if std::thread::panicking() {
            CancelReason::Failed
        } else {
            CancelReason::Exhausted
        };
        self.context.cancel(reason);
        self.context.queue().close();
    }
}

/// Tree walker and task producer
pub struct Manager {
    context: Arc<PipelineContext>,
    next_id: u64,
}

impl Manager {
    /// Create a manager for the given pipeline
    pub fn new(context: Arc<PipelineContext>) -> Self {
        Self { context, next_id: 0 }
    }

    /// Walk the whole tree, then cancel the pipeline and close the queue
    pub fn run(mut self) {
        let context = Arc::clone(&self.context);
        let _exit = CancelOnExit { context: &context };

        self.walk();

        tracing::debug!(tasks = self.next_id, "Manager finished producing");
    }

    fn walk(&mut self) {
        let source = self.context.config().source.clone();
        let destination = self.context.config().destination.clone();

        if self.context.token().is_cancelled() {
            tracing::debug!("Cancelled before traversal started");
            return;
        }
        if let Err(e) = ensure_directory(&destination) {
            tracing::warn!(
                path = %destination.display(),
                "Failed to create destination directory: {}",
                e
            );
            return;
        }

        let mut entries = WalkDir::new(&source)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            if self.context.token().is_cancelled() {
                tracing::debug!("Cancellation observed, stopping traversal");
                return;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let relative = match entry.path().strip_prefix(&source) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let dest_path = destination.join(relative);

            if entry.file_type().is_dir() {
                self.context.stats().record_directory();
                if let Err(e) = ensure_directory(&dest_path) {
                    tracing::warn!(
                        path = %dest_path.display(),
                        "Failed to create directory, skipping subtree: {}",
                        e
                    );
                    entries.skip_current_dir();
                }
                continue;
            }

            let kind = EntryKind::from_file_type(entry.file_type());
            if self.produce(entry.path(), dest_path, kind).is_break() {
                return;
            }
        }
    }

    /// Open both ends of one entry and queue the task
    fn produce(&mut self, source_path: &Path, dest_path: PathBuf, kind: EntryKind) -> ControlFlow<()> {
        let source = match open_source(source_path, kind) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    path = %source_path.display(),
                    "Failed to open source file for reading: {}",
                    e
                );
                self.context.stats().record_skipped();
                return ControlFlow::Continue(());
            }
        };

        let dest = match create_destination(&dest_path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    path = %dest_path.display(),
                    "Failed to open destination file for writing: {}",
                    e
                );
                self.context.stats().record_skipped();
                return ControlFlow::Continue(());
            }
        };

        let task = CopyTask::new(
            self.next_id,
            kind,
            source_path.to_path_buf(),
            dest_path,
            source,
            dest,
        );

        match self.context.queue().enqueue(task) {
            Ok(()) => {
                self.next_id += 1;
                self.context.stats().record_entry(kind);
                self.context.progress().increment_queued();
                ControlFlow::Continue(())
            }
            Err(rejected) => {
                let task = rejected.into_inner();
                tracing::debug!(
                    path = %task.source_path.display(),
                    "Queue closed by cancellation, releasing task"
                );
                // Nothing will ever fill the file we just created
                let dest_path = task.dest_path.clone();
                drop(task);
                if let Err(e) = std::fs::remove_file(&dest_path) {
                    tracing::debug!(
                        path = %dest_path.display(),
                        "Failed to remove unused destination: {}",
                        e
                    );
                }
                ControlFlow::Break(())
            }
        }
    }
}

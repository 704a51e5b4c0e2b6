//! End-of-run report

use crate::core::{CancelReason, StatsSnapshot};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// The whole tree was walked and every queued task copied
    Completed,
    /// An external shutdown request stopped the run
    Interrupted,
    /// A copy failed and aborted the run
    Failed,
}

impl RunOutcome {
    /// Map the token's final reason to an outcome
    pub fn from_reason(reason: Option<CancelReason>) -> Self {
        match reason {
            None | Some(CancelReason::Exhausted) => Self::Completed,
            Some(CancelReason::Interrupted) => Self::Interrupted,
            Some(CancelReason::Failed) => Self::Failed,
        }
    }

    /// Process exit code for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Failed => 1,
            Self::Interrupted => 130,
        }
    }
}

/// Final statistics of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Worker threads in the pool
    pub workers: usize,
    /// Queue capacity
    pub capacity: usize,
    /// Counters read after every thread joined
    pub stats: StatsSnapshot,
    /// Wall time from start to join
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// How the run ended
    pub outcome: RunOutcome,
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

impl RunReport {
    /// Whether the run completed without interruption or failure
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Average bytes per second over the run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.total_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Human-readable statistics block
    pub fn render_text(&self) -> String {
        let stats = &self.stats;

        let losses = if stats.skipped > 0 || stats.abandoned > 0 {
            format!("Skipped: {} - Abandoned: {}\n", stats.skipped, stats.abandoned)
        } else {
            String::new()
        };
        let ending = match self.outcome {
            RunOutcome::Completed => "",
            RunOutcome::Interrupted => "Run interrupted before completion\n",
            RunOutcome::Failed => "Run aborted after a copy failure\n",
        };

        format!(
            "\n---------------STATISTICS--------------------\n\
             Consumers: {} - Buffer Size: {}\n\
             Number of Regular Files: {}\n\
             Number of FIFO Files: {}\n\
             Number of Directories: {}\n\
             Number of Other Files: {}\n\
             Files Copied: {} of {}\n\
             TOTAL BYTES COPIED: {}\n\
             TOTAL TIME: {} (min:sec.millis)\n\
             {}Throughput: {}/s\n\
             {}",
            self.workers,
            self.capacity,
            stats.regular_files,
            stats.fifo_files,
            stats.directories,
            stats.other_files,
            stats.files_copied,
            stats.enqueued(),
            stats.total_bytes,
            format_elapsed(self.elapsed),
            losses,
            humansize::format_size(self.throughput() as u64, humansize::BINARY),
            ending,
        )
    }

    /// Print the statistics block to stdout
    pub fn print_summary(&self) {
        print!("{}", self.render_text());
    }

    /// Serialize the report as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Format a duration as `mm:ss.mmm`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
}

//! Progress reporter implementation
//!
//! Uses indicatif for live feedback while the pipeline runs:
//! - Files queued versus files copied
//! - Bytes copied with throughput
//! - A status line for the current file

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress reporter for copy operations
///
/// The total is not known up front: the manager grows the files bar as it
/// queues entries and the workers advance it.
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Byte counter with throughput
    bytes_bar: ProgressBar,
    /// Copied versus queued files
    files_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter drawing to stderr
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            status.set_style(style);
        }

        let files_bar = multi.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} files")
        {
            files_bar.set_style(style.progress_chars("=> "));
        }
        files_bar.set_prefix("Files");

        let bytes_bar = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {bytes} copied ({bytes_per_sec})")
        {
            bytes_bar.set_style(style);
        }
        bytes_bar.set_prefix("Data ");

        Self {
            multi,
            bytes_bar,
            files_bar,
            status,
        }
    }

    /// Create a disabled progress reporter (for quiet mode and tests)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Record a task handed to the workers
    pub fn increment_queued(&self) {
        self.files_bar.inc_length(1);
    }

    /// Record a completed copy
    pub fn record_copy(&self, bytes: u64) {
        self.files_bar.inc(1);
        self.bytes_bar.inc(bytes);
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.status.set_message(msg.to_string());
    }

    /// Set current file being copied
    pub fn set_current_file(&self, path: &str) {
        // Truncate long paths on a char boundary
        let chars: Vec<char> = path.chars().collect();
        let display = if chars.len() > 60 {
            format!("...{}", chars[chars.len() - 57..].iter().collect::<String>())
        } else {
            path.to_string()
        };
        self.status.set_message(display);
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.files_bar.finish();
        self.bytes_bar.finish();
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.files_bar.abandon();
        self.bytes_bar.abandon();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

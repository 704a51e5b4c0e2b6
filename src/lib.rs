//! # MirrorCopy - Parallel Recursive Directory Copy
//!
//! MirrorCopy mirrors a directory tree with one producer and a pool of
//! copy workers. A manager thread walks the source depth-first, recreates
//! directories in the destination, opens a source/destination pair for
//! every other entry and queues it. Workers take tasks from a bounded
//! queue and stream the bytes across in fixed-size chunks.
//!
//! ## Features
//!
//! - **Bounded hand-off**: the producer blocks once `capacity` tasks wait
//! - **Fail-fast copies**: one read or write error cancels the whole run
//! - **Graceful shutdown**: termination signals drain the pool cleanly
//! - **Aggregate statistics**: per-kind entry counts and total bytes
//!
//! ## Quick Start
//!
//! ```no_run
//! use mirrorcopy::core::mirror_directory;
//!
//! let report = mirror_directory("/source", "/destination", 16, 4).unwrap();
//! report.print_summary();
//! ```
//!
//! ## Cancelling a Run
//!
//! ```no_run
//! use mirrorcopy::config::PipelineConfig;
//! use mirrorcopy::core::Pipeline;
//! use mirrorcopy::progress::ProgressReporter;
//!
//! let config = PipelineConfig::new("/source", "/destination")
//!     .with_capacity(32)
//!     .with_workers(8);
//!
//! let pipeline = Pipeline::new(config)
//!     .unwrap()
//!     .with_progress(ProgressReporter::new());
//! let shutdown = pipeline.shutdown_handle();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     shutdown.shutdown();
//! });
//!
//! let report = pipeline.run().unwrap();
//! println!("{}", report.to_json().unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod progress;
pub mod system;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use core::{mirror_directory, Pipeline, RunOutcome, RunReport};
pub use error::{MirrorCopyError, Result};
pub use progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use mirrorcopy::prelude::*;
    //! ```

    pub use crate::config::{parse_size, PipelineConfig};
    pub use crate::core::{
        mirror_directory, CancelReason, CancellationToken, Pipeline, RunOutcome, RunReport,
        ShutdownHandle, StatsSnapshot,
    };
    pub use crate::error::{MirrorCopyError, Result};
    pub use crate::fs::{copy_stream, EntryKind};
    pub use crate::progress::ProgressReporter;
    pub use crate::system::install_shutdown_handler;
}

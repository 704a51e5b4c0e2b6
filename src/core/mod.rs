//! Core copy engine module
//!
//! Provides the bounded task queue, cancellation, statistics, the
//! producing manager, the worker pool and the pipeline that ties them
//! together.

mod barrier;
mod cancel;
mod manager;
mod pipeline;
mod queue;
mod report;
mod stats;
mod task;
mod worker;

pub use barrier::*;
pub use cancel::*;
pub use manager::*;
pub use pipeline::*;
pub use queue::*;
pub use report::*;
pub use stats::*;
pub use task::*;
pub use worker::*;

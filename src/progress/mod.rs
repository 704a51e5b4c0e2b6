//! Progress reporting module
//!
//! Provides live progress visualization for a running copy pipeline.

mod reporter;

pub use reporter::*;

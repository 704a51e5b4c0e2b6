//! File system operations module
//!
//! Entry classification, handle acquisition and the chunked copy loop
//! used by the workers.

mod operations;

pub use operations::*;

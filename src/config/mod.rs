//! Configuration module for MirrorCopy
//!
//! Provides CLI arguments and the runtime pipeline configuration.

mod settings;

pub use settings::*;

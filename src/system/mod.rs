//! Operating system integration
//!
//! Maps termination signals onto pipeline shutdown requests.

mod signals;

pub use signals::*;

//! Copy tasks
//!
//! A task owns both open handles of one copy. Dropping it closes them, so
//! whichever component holds the task last is the one that releases it.

use crate::fs::EntryKind;
use std::fs::File;
use std::path::PathBuf;

/// A single file copy with both ends already open
#[derive(Debug)]
pub struct CopyTask {
    /// Sequence number assigned by the manager
    pub id: u64,
    /// Kind of the source entry
    pub kind: EntryKind,
    /// Source path
    pub source_path: PathBuf,
    /// Destination path
    pub dest_path: PathBuf,
    /// Source handle, opened read-only
    pub source: File,
    /// Destination handle, opened for writing
    pub dest: File,
}

impl CopyTask {
    /// Create a new copy task
    pub fn new(
        id: u64,
        kind: EntryKind,
        source_path: PathBuf,
        dest_path: PathBuf,
        source: File,
        dest: File,
    ) -> Self {
        Self {
            id,
            kind,
            source_path,
            dest_path,
            source,
            dest,
        }
    }
}

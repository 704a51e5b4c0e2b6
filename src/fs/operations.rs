//! File operations used by the copy pipeline
//!
//! Entry classification, handle acquisition and the chunked stream copy.

use std::fs::{File, FileType, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Permission bits for created files
pub const FILE_MODE: u32 = 0o644;

/// Permission bits for created directories
pub const DIR_MODE: u32 = 0o755;

/// Kind of a non-directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    Regular,
    /// Named pipe
    Fifo,
    /// Anything else: symlinks, sockets, device nodes
    Other,
}

impl EntryKind {
    /// Classify from an entry's own file type (links are not followed)
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_file() {
            return Self::Regular;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if file_type.is_fifo() {
                return Self::Fifo;
            }
        }

        Self::Other
    }
}

/// Open a source entry read-only
///
/// FIFOs are opened non-blocking so that a pipe without a writer cannot
/// stall the caller. Sources that resolve to a directory are refused.
pub fn open_source(path: &Path, kind: EntryKind) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if kind == EntryKind::Fifo {
            options.custom_flags(libc::O_NONBLOCK);
        }
    }
    #[cfg(not(unix))]
    let _ = kind;

    let file = options.open(path)?;
    if file.metadata()?.is_dir() {
        return Err(io::Error::new(
            ErrorKind::Other,
            "source resolves to a directory",
        ));
    }
    Ok(file)
}

/// Create or truncate a destination file for writing
pub fn create_destination(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }

    options.open(path)
}

/// Create a directory unless something already exists at `path`
///
/// Returns `true` when the directory was created by this call.
pub fn ensure_directory(path: &Path) -> io::Result<bool> {
    if std::fs::symlink_metadata(path).is_ok() {
        return Ok(false);
    }

    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    match builder.create(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

/// Which side of a stream copy failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStage {
    /// Reading the source
    Read,
    /// Writing the destination
    Write,
}

impl std::fmt::Display for CopyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// A stream copy that stopped on an I/O error
#[derive(Debug, Error)]
#[error("{stage} failed after {bytes_written} bytes: {source}")]
pub struct StreamCopyError {
    /// Failing side
    pub stage: CopyStage,
    /// Bytes fully written before the failure
    pub bytes_written: u64,
    /// Underlying error
    #[source]
    pub source: io::Error,
}

/// Copy `reader` into `writer` through `buffer`, one chunk at a time
///
/// Each chunk is written with repeated `write` calls until it is fully
/// flushed, so short writes are absorbed. `Interrupted` is retried on both
/// sides. `WouldBlock` on the read side ends the stream: it only occurs for
/// FIFOs opened non-blocking with no data pending.
pub fn copy_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut [u8],
) -> Result<u64, StreamCopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut total = 0u64;

    loop {
        let read = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => {
                return Err(StreamCopyError {
                    stage: CopyStage::Read,
                    bytes_written: total,
                    source: e,
                })
            }
        };

        let mut written = 0;
        while written < read {
            match writer.write(&buffer[written..read]) {
                Ok(0) => {
                    return Err(StreamCopyError {
                        stage: CopyStage::Write,
                        bytes_written: total + written as u64,
                        source: io::Error::new(ErrorKind::WriteZero, "destination accepted no bytes"),
                    })
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(StreamCopyError {
                        stage: CopyStage::Write,
                        bytes_written: total + written as u64,
                        source: e,
                    })
                }
            }
        }
        total += read as u64;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Accepts at most `max` bytes per call
    struct ShortWriter {
        inner: Vec<u8>,
        max: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.max);
            self.inner.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Fails once `limit` bytes have been accepted
    struct FailingWriter {
        accepted: usize,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted >= self.limit {
                return Err(io::Error::new(ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.limit - self.accepted);
            self.accepted += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::Other, "bad sector"))
        }
    }

    #[test]
    fn test_copy_stream_handles_short_writes() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = Cursor::new(data.clone());
        let mut writer = ShortWriter {
            inner: Vec::new(),
            max: 7,
        };
        let mut buffer = vec![0u8; 1024];

        let copied = copy_stream(&mut reader, &mut writer, &mut buffer).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(writer.inner, data);
    }

    #[test]
    fn test_copy_stream_reports_write_failure() {
        let mut reader = Cursor::new(vec![1u8; 4096]);
        let mut writer = FailingWriter {
            accepted: 0,
            limit: 1500,
        };
        let mut buffer = vec![0u8; 1024];

        let err = copy_stream(&mut reader, &mut writer, &mut buffer).unwrap_err();
        assert_eq!(err.stage, CopyStage::Write);
        assert_eq!(err.bytes_written, 1500);
    }

    #[test]
    fn test_copy_stream_reports_read_failure() {
        let mut writer = Vec::new();
        let mut buffer = vec![0u8; 64];
        let err = copy_stream(&mut FailingReader, &mut writer, &mut buffer).unwrap_err();
        assert_eq!(err.stage, CopyStage::Read);
        assert_eq!(err.bytes_written, 0);
        assert_eq!(err.to_string(), "read failed after 0 bytes: bad sector");
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(cause.to_string(), "bad sector");
    }

    #[test]
    fn test_create_destination_truncates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");
        std::fs::write(&path, b"previous contents").unwrap();

        let mut file = create_destination(&path).unwrap();
        file.write_all(b"new").unwrap();
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), b"new");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::remove_file(&path).unwrap();
            drop(create_destination(&path).unwrap());
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            // Never more permissive than 0644, whatever the umask
            assert_eq!(mode & !FILE_MODE, 0);
        }
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("sub");
        assert!(ensure_directory(&dir).unwrap());
        assert!(!ensure_directory(&dir).unwrap());
        assert!(dir.is_dir());
        assert!(ensure_directory(&tmp.path().join("missing/parent")).is_err());
    }

    #[test]
    fn test_open_source_refuses_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(open_source(tmp.path(), EntryKind::Other).is_err());

        let file = tmp.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        assert!(open_source(&file, EntryKind::Regular).is_ok());
    }

    #[test]
    fn test_classify_entries() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let ft = std::fs::symlink_metadata(&file).unwrap().file_type();
        assert_eq!(EntryKind::from_file_type(ft), EntryKind::Regular);

        #[cfg(unix)]
        {
            let link = tmp.path().join("link");
            std::os::unix::fs::symlink(&file, &link).unwrap();
            let ft = std::fs::symlink_metadata(&link).unwrap().file_type();
            assert_eq!(EntryKind::from_file_type(ft), EntryKind::Other);

            let fifo = tmp.path().join("pipe");
            nix::unistd::mkfifo(&fifo, nix::sys::stat::Mode::from_bits_truncate(0o644)).unwrap();
            let ft = std::fs::symlink_metadata(&fifo).unwrap().file_type();
            assert_eq!(EntryKind::from_file_type(ft), EntryKind::Fifo);
        }
    }
}

//! Configuration settings for MirrorCopy
//!
//! Defines the CLI arguments, the runtime pipeline configuration and its
//! validation rules.

use crate::error::{IoResultExt, MirrorCopyError, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default read/write chunk size used by workers
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// MirrorCopy - parallel recursive directory copy
#[derive(Parser, Debug, Clone)]
#[command(name = "mirrorcopy")]
#[command(author = "MirrorCopy Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parallel recursive directory copy with a bounded task queue")]
#[command(long_about = r#"
MirrorCopy walks SOURCE on a single manager thread, opens every entry and
hands the open file pairs to a pool of worker threads through a queue that
holds at most CAPACITY tasks.

Examples:
  mirrorcopy 16 4 /data/src /data/dst             # 4 workers, 16 queued tasks
  mirrorcopy 8 2 ./src ./dst --progress           # With progress bars
  mirrorcopy 64 8 /src /dst --output-format json  # JSON summary
"#)]
pub struct CliArgs {
    /// Maximum number of tasks waiting in the queue
    #[arg(value_name = "CAPACITY", value_parser = clap::value_parser!(u32).range(1..))]
    pub capacity: u32,

    /// Number of worker threads
    #[arg(value_name = "WORKERS", value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: u32,

    /// Source directory
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Destination directory (created if missing)
    #[arg(value_name = "DESTINATION")]
    pub destination: PathBuf,

    /// Read/write chunk size per worker (e.g., 64K, 1M)
    #[arg(long, default_value = "64K", value_name = "SIZE")]
    pub chunk_size: String,

    /// Show progress bars
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress the summary)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Output format for the final summary
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Log file path
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Emit log records as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Runtime configuration of a copy pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source root
    pub source: PathBuf,
    /// Destination root
    pub destination: PathBuf,
    /// Queue capacity
    pub capacity: usize,
    /// Worker thread count
    pub workers: usize,
    /// Chunk size in bytes
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = num_cpus::get().max(1);
        Self {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            capacity: workers * 4,
            workers,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration for the given roots with default tuning
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            ..Default::default()
        }
    }

    /// Set queue capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let chunk_size = parse_size(&args.chunk_size)
            .map_err(|e| MirrorCopyError::config(format!("Invalid chunk size: {}", e)))?;

        Ok(Self {
            source: args.source.clone(),
            destination: args.destination.clone(),
            capacity: args.capacity as usize,
            workers: args.workers as usize,
            chunk_size: chunk_size as usize,
        })
    }

    /// Check the configuration before any thread is started
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MirrorCopyError::config("queue capacity must be a positive integer"));
        }
        if self.workers == 0 {
            return Err(MirrorCopyError::config("worker count must be a positive integer"));
        }
        if self.chunk_size == 0 {
            return Err(MirrorCopyError::config("chunk size must be at least one byte"));
        }

        if !self.source.exists() {
            return Err(MirrorCopyError::NotFound(self.source.clone()));
        }
        if !self.source.is_dir() {
            return Err(MirrorCopyError::InvalidPath(format!(
                "source is not a directory: {}",
                self.source.display()
            )));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(MirrorCopyError::InvalidPath("empty destination path".to_string()));
        }

        let source = self.source.canonicalize().with_path(&self.source)?;
        let destination = resolve_destination(&self.destination);
        if destination.starts_with(&source) {
            return Err(MirrorCopyError::SameSourceAndDestination(self.destination.clone()));
        }

        Ok(())
    }
}

/// Canonicalize the longest existing prefix of a path that may not exist yet
fn resolve_destination(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(|c| c == 'G' || c == 'B'), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(|c| c == 'M' || c == 'B'), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(|c| c == 'K' || c == 'B'), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        // Assume bytes if no suffix
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    if num < 0.0 {
        return Err(format!("Negative size: {}", num_str));
    }

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("64KB").unwrap(), 64 * 1024);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1.5G").unwrap(), (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
    }

    #[test]
    fn test_cli_positional_arguments() {
        let args = CliArgs::try_parse_from(["mirrorcopy", "10", "4", "/src", "/dst"]).unwrap();
        assert_eq!(args.capacity, 10);
        assert_eq!(args.workers, 4);
        assert_eq!(args.source, PathBuf::from("/src"));

        let config = PipelineConfig::from_cli(&args).unwrap();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.workers, 4);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_cli_rejects_zero_and_missing() {
        assert!(CliArgs::try_parse_from(["mirrorcopy", "0", "4", "/src", "/dst"]).is_err());
        assert!(CliArgs::try_parse_from(["mirrorcopy", "4", "0", "/src", "/dst"]).is_err());
        assert!(CliArgs::try_parse_from(["mirrorcopy", "-3", "4", "/src", "/dst"]).is_err());
        assert!(CliArgs::try_parse_from(["mirrorcopy", "4", "4", "/src"]).is_err());
    }

    #[test]
    fn test_validate_source_must_be_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        let config = PipelineConfig::new(&file, tmp.path().join("out"));
        assert!(matches!(config.validate(), Err(MirrorCopyError::InvalidPath(_))));

        let config = PipelineConfig::new(tmp.path().join("missing"), tmp.path().join("out"));
        assert!(matches!(config.validate(), Err(MirrorCopyError::NotFound(_))));
    }

    #[test]
    fn test_validate_rejects_destination_inside_source() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig::new(tmp.path(), tmp.path().join("nested/out"));
        assert!(matches!(
            config.validate(),
            Err(MirrorCopyError::SameSourceAndDestination(_))
        ));

        let config = PipelineConfig::new(tmp.path(), tmp.path());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_sibling_destination() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let config = PipelineConfig::new(src.path(), dst.path().join("copy"))
            .with_capacity(2)
            .with_workers(2);
        assert!(config.validate().is_ok());

        assert!(config.clone().with_capacity(0).validate().is_err());
        assert!(config.with_chunk_size(0).validate().is_err());
    }
}

//! MirrorCopy CLI - parallel recursive directory copy
//!
//! `mirrorcopy <CAPACITY> <WORKERS> <SOURCE> <DESTINATION>`

use clap::Parser;
use mirrorcopy::config::{CliArgs, OutputFormat, PipelineConfig};
use mirrorcopy::core::{Pipeline, RunReport};
use mirrorcopy::error::{IoResultExt, Result};
use mirrorcopy::progress::ProgressReporter;
use mirrorcopy::system::install_shutdown_handler;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments; usage errors exit with status 2
    let args = CliArgs::parse();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    match run(&args) {
        Ok(report) => std::process::exit(report.outcome.exit_code()),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_logging(args: &CliArgs) -> Result<()> {
    // RUST_LOG wins over the verbosity flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if args.quiet {
            "mirrorcopy=error"
        } else {
            match args.verbose {
                0 => "mirrorcopy=info,warn",
                1 => "mirrorcopy=debug,warn",
                _ => "mirrorcopy=trace,info",
            }
        };
        EnvFilter::new(level)
    });

    let (writer, ansi) = match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_path(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(args.verbose > 0)
        .with_ansi(ansi)
        .with_writer(writer);

    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

fn run(args: &CliArgs) -> Result<RunReport> {
    let config = PipelineConfig::from_cli(args)?;

    if args.verbose > 0 {
        print_config(&config);
    }

    let progress = if args.progress && !args.quiet {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    };

    let pipeline = Pipeline::new(config)?.with_progress(progress);
    let signals = install_shutdown_handler(pipeline.shutdown_handle())?;

    let report = pipeline.run()?;
    signals.close();

    if !args.quiet {
        match args.output_format {
            OutputFormat::Text => report.print_summary(),
            OutputFormat::Json => match report.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!("Failed to serialize report: {}", e),
            },
        }
    }

    Ok(report)
}

fn print_config(config: &PipelineConfig) {
    eprintln!("=== Configuration ===");
    eprintln!("Source:      {}", config.source.display());
    eprintln!("Destination: {}", config.destination.display());
    eprintln!("Workers:     {}", config.workers);
    eprintln!("Capacity:    {}", config.capacity);
    eprintln!(
        "Chunk size:  {}",
        humansize::format_size(config.chunk_size as u64, humansize::BINARY)
    );
    eprintln!();
}

//! CLI tool to run a batch job described by a TOML config file.
//!
//! Usage:
//!   etl-run <job.toml>
//!   etl-run <job.toml> --input in.csv --output out.xml --chunk-size 100
//!
//! Set `RUST_LOG` for finer control over log output.

use clap::Parser;
use flatfile_etl::{JobConfig, RunStatus, run_job};
use std::path::PathBuf;
use std::process;

/// Run a chunked flat-file ETL job.
#[derive(Parser)]
#[command(name = "etl-run")]
struct Cli {
    /// Job configuration file (.toml)
    config: PathBuf,

    /// Read records from this file instead of the configured input-path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write output to this file instead of the configured output-path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Records per committed chunk
    #[arg(short, long)]
    chunk_size: Option<usize>,

    /// Log chunk commits and file handling
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = match JobConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading job '{}': {e}", cli.config.display());
            process::exit(1);
        }
    };
    if let Some(input) = cli.input {
        config.input_path = input;
    }
    if let Some(output) = cli.output {
        config.output_path = output;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }

    let report = run_job(&config, |report| match &report.status {
        RunStatus::Completed => log::info!("Job completed!"),
        RunStatus::Failed(e) => log::error!("Job failed: {e}"),
    });

    match report.status {
        RunStatus::Completed => {
            eprintln!(
                "Processed {} -> {} records in {} chunks, output: {}",
                report.read_count,
                report.write_count,
                report.commit_count,
                config.output_path.display()
            );
        }
        RunStatus::Failed(e) => {
            eprintln!("Job error: {e}");
            process::exit(1);
        }
    }
}

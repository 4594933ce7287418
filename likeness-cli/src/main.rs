//! Likeness CLI - image similarity screening tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "likeness")]
#[command(author, version, about = "Image similarity screening", long_about = None)]
#[command(after_help = exit_codes::HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

/// Output format for command results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the perceptual fingerprint of an image
    Fingerprint {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Compare two images by fingerprint distance
    Compare {
        /// First image
        #[arg(value_name = "A")]
        a: PathBuf,

        /// Second image
        #[arg(value_name = "B")]
        b: PathBuf,

        /// Maximum Hamming distance counted as a match
        #[arg(long)]
        threshold: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Fingerprint and embed every image in a directory
    Index {
        /// Directory of reference images
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Use mock oracles instead of the configured HTTP oracle (for testing)
        #[arg(long)]
        mock: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Assess a target image against a collection directory
    Assess(AssessArgs),
}

#[derive(Args)]
pub struct AssessArgs {
    /// Image to assess
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Directory of reference images
    #[arg(short, long, value_name = "DIR")]
    pub collection: PathBuf,

    /// Use mock oracles instead of the configured HTTP oracle (for testing)
    #[arg(long)]
    pub mock: bool,

    /// Maximum candidates sent to verification
    #[arg(long)]
    pub cap: Option<usize>,

    /// Maximum Hamming distance counted as a fingerprint match
    #[arg(long)]
    pub threshold: Option<u32>,

    /// Concurrent verification calls per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "likeness_core=debug,likeness=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Fingerprint { file, format } => commands::fingerprint::execute(file, format, quiet),
        Commands::Compare {
            a,
            b,
            threshold,
            format,
        } => commands::compare::execute(a, b, threshold, format, quiet),
        Commands::Index { dir, mock, format } => {
            commands::index::execute(dir, mock, format, quiet).await
        }
        Commands::Assess(args) => commands::assess::execute(args, quiet).await,
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                std::process::ExitCode::from(exit_codes::USAGE_ERROR as u8)
            } else {
                std::process::ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::success().report(),
        Err(e) => ExitCode::from_anyhow(&e).report(),
    }
}

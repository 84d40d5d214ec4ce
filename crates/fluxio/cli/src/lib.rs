//! Fluxio CLI - Command-line interface for the Fluxio state machine compiler
//!
//! This CLI lets developers:
//! - Compile `.sfn` sources into Amazon States Language documents
//! - Check sources for unsupported constructs without writing output
//! - Inspect the resource decorator registry

use clap::{Parser, Subcommand};
use fluxio_compiler::Compiler;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;

use commands::{check, compile, decorators};
pub use config::CliConfig;
pub use error::{CliError, CliResult};
pub use output::OutputFormat;

/// Fluxio CLI application
#[derive(Parser)]
#[command(name = "fluxio")]
#[command(about = "Fluxio - compile Python-shaped workflows to AWS Step Functions", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FLUXIO_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (table, json, yaml); defaults to the config file's, then table
    #[arg(short, long)]
    output: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Compile source files into state machine documents
    Compile(compile::CompileArgs),

    /// Compile source files and report failures only
    Check(check::CheckArgs),

    /// List resource decorators and their options
    Decorators,
}

/// Run using the current process arguments.
pub async fn run() -> CliResult<ExitCode> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok();

    let config = CliConfig::load(cli.config.as_deref())?;
    let format = cli.output.or(config.output).unwrap_or_default();
    let compiler = Compiler::new(config.compiler);

    match cli.command {
        Commands::Compile(args) => compile::execute(args, &compiler, format).await,
        Commands::Check(args) => check::execute(args, &compiler, format).await,
        Commands::Decorators => decorators::execute(format).map(|()| ExitCode::SUCCESS),
    }
}

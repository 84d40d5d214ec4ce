//! `fluxio check`: compile without emitting documents

use super::{collect_sources, compile_files, failure_lines, FileReport};
use crate::error::CliResult;
use crate::output::{self, print_error, print_success, OutputFormat};
use clap::Args;
use fluxio_compiler::{Compiler, FunctionFailure};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Arguments of the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Source files, or directories to scan for .sfn files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Check outcome of one file
#[derive(Debug, Serialize)]
struct CheckResult<'r> {
    path: &'r PathBuf,
    machines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    syntax_error: Option<&'r String>,
    failures: &'r [FunctionFailure],
}

impl<'r> From<&'r FileReport> for CheckResult<'r> {
    fn from(report: &'r FileReport) -> Self {
        Self {
            path: &report.path,
            machines: report.machines.len(),
            syntax_error: report.syntax_error.as_ref(),
            failures: &report.failures,
        }
    }
}

/// Execute check command
pub async fn execute(args: CheckArgs, compiler: &Compiler, format: OutputFormat) -> CliResult<ExitCode> {
    let files = collect_sources(&args.paths)?;
    let reports = compile_files(compiler, files).await?;
    let success = reports.iter().all(FileReport::is_success);

    match format {
        OutputFormat::Table => {
            for report in &reports {
                if report.is_success() {
                    print_success(&format!(
                        "{}: {} machine(s)",
                        report.path.display(),
                        report.machines.len()
                    ));
                } else {
                    for line in failure_lines(report) {
                        print_error(&line);
                    }
                }
            }
        }
        _ => {
            let results: Vec<CheckResult<'_>> = reports.iter().map(CheckResult::from).collect();
            output::print_single(&results, format)?;
        }
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

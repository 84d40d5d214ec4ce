//! `fluxio compile`: source files to ASL documents

use super::{collect_sources, compile_files, failure_lines, FileReport};
use crate::error::CliResult;
use crate::output::{self, print_error, print_success, OutputFormat};
use clap::Args;
use colored::Colorize;
use fluxio_compiler::Compiler;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tabled::Tabled;

/// Arguments of the compile command
#[derive(Args)]
pub struct CompileArgs {
    /// Source files, or directories to scan for .sfn files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Write one <file>.<machine>.asl.json document per machine into this directory
    #[arg(short = 'd', long)]
    pub out_dir: Option<PathBuf>,
}

/// Table row for a compiled machine
#[derive(Debug, Serialize, Tabled)]
struct MachineRow {
    /// Source file
    file: String,
    /// Function name
    machine: String,
    /// Start state
    start_at: String,
    /// Number of top-level states
    states: usize,
    /// Decorators applied
    decorators: String,
}

/// Execute compile command
pub async fn execute(args: CompileArgs, compiler: &Compiler, format: OutputFormat) -> CliResult<ExitCode> {
    let files = collect_sources(&args.paths)?;
    let reports = compile_files(compiler, files).await?;

    match &args.out_dir {
        Some(out_dir) => write_documents(&reports, out_dir)?,
        None => {
            let rows: Vec<MachineRow> = reports.iter().flat_map(machine_rows).collect();
            output::print_output(rows, &reports, format)?;
        }
    }

    let mut success = true;
    for report in reports.iter().filter(|r| !r.is_success()) {
        success = false;
        for line in failure_lines(report) {
            print_error(&line);
        }
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn machine_rows(report: &FileReport) -> Vec<MachineRow> {
    let file = report.path.display().to_string();
    report
        .machines
        .iter()
        .map(|machine| {
            let decorators: Vec<&str> = machine.effects.iter().map(|e| e.decorator.as_str()).collect();
            MachineRow {
                file: file.clone(),
                machine: machine.name.clone(),
                start_at: machine.definition.start_at.clone(),
                states: machine.definition.states.len(),
                decorators: decorators.join(", "),
            }
        })
        .collect()
}

/// Write `<stem>.<machine>.asl.json`, plus `<stem>.<machine>.effects.json`
/// when the machine carries decorator effects
fn write_documents(reports: &[FileReport], out_dir: &Path) -> CliResult<()> {
    std::fs::create_dir_all(out_dir)?;

    for report in reports {
        let stem = report.stem();
        for machine in &report.machines {
            let path = out_dir.join(format!("{}.{}.asl.json", stem, machine.name));
            std::fs::write(&path, serde_json::to_string_pretty(&machine.definition)?)?;

            if !machine.effects.is_empty() {
                let effects = out_dir.join(format!("{}.{}.effects.json", stem, machine.name));
                std::fs::write(&effects, serde_json::to_string_pretty(&machine.effects)?)?;
            }

            tracing::debug!(path = %path.display(), "Wrote state machine");
            print_success(&format!("{} {}", "Wrote".bold(), path.display()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxio_compiler::CompilerConfig;

    #[tokio::test]
    async fn test_write_documents() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("orders.sfn");
        std::fs::write(
            &source,
            "@export\ndef main(data):\n    data[\"a\"] = 1\n\ndef side(data):\n    return data\n",
        )
        .unwrap();
        let out_dir = dir.path().join("out");

        let args = CompileArgs {
            paths: vec![source],
            out_dir: Some(out_dir.clone()),
        };
        let code = execute(args, &Compiler::new(CompilerConfig::default()), OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let main: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out_dir.join("orders.main.asl.json")).unwrap()).unwrap();
        assert_eq!(main["StartAt"], "Pass-L3C5");
        assert!(out_dir.join("orders.main.effects.json").exists());
        assert!(out_dir.join("orders.side.asl.json").exists());
        assert!(!out_dir.join("orders.side.effects.json").exists());
    }
}

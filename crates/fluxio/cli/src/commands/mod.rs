//! CLI command implementations

pub mod check;
pub mod compile;
pub mod decorators;

use crate::error::{CliError, CliResult};
use fluxio_compiler::{CompileError, CompiledStateMachine, Compiler, FunctionFailure};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Source file extension
pub const SOURCE_EXTENSION: &str = "sfn";

/// The result of compiling one source file
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Set when the file did not parse; nothing else was compiled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_error: Option<String>,
    pub machines: Vec<CompiledStateMachine>,
    pub failures: Vec<FunctionFailure>,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        self.syntax_error.is_none() && self.failures.is_empty()
    }

    /// File name without its extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Expand paths into source files: files as given, directories scanned
pub fn collect_sources(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            scan_dir(path, &mut sources)?;
        } else if path.is_file() {
            sources.push(path.clone());
        } else {
            return Err(CliError::NotFound(path.display().to_string()));
        }
    }

    sources.sort();
    sources.dedup();
    if sources.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "No .{} source files found",
            SOURCE_EXTENSION
        )));
    }
    Ok(sources)
}

fn scan_dir(dir: &Path, sources: &mut Vec<PathBuf>) -> CliResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan_dir(&path, sources)?;
        } else if path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
            sources.push(path);
        }
    }
    Ok(())
}

/// Compile every file on its own blocking task; reports keep input order
pub async fn compile_files(compiler: &Compiler, files: Vec<PathBuf>) -> CliResult<Vec<FileReport>> {
    let tasks = files.into_iter().map(|path| {
        let compiler = compiler.clone();
        tokio::task::spawn_blocking(move || compile_file(&compiler, path))
    });

    let mut reports = Vec::new();
    for joined in futures::future::join_all(tasks).await {
        reports.push(joined??);
    }
    Ok(reports)
}

fn compile_file(compiler: &Compiler, path: PathBuf) -> CliResult<FileReport> {
    let source = std::fs::read_to_string(&path)?;
    let report = match compiler.compile_source(&source) {
        Ok(output) => FileReport {
            path,
            syntax_error: None,
            machines: output.machines,
            failures: output.failures,
        },
        Err(CompileError::Syntax(error)) => {
            tracing::warn!(path = %path.display(), "Source failed to parse: {}", error);
            FileReport {
                path,
                syntax_error: Some(error.to_string()),
                machines: Vec::new(),
                failures: Vec::new(),
            }
        }
        Err(other) => return Err(other.into()),
    };
    Ok(report)
}

/// Human-readable failure lines of a report
pub fn failure_lines(report: &FileReport) -> Vec<String> {
    let path = report.path.display();
    let mut lines = Vec::new();
    if let Some(error) = &report.syntax_error {
        lines.push(format!("{}: {}", path, error));
    }
    for failure in &report.failures {
        lines.push(format!(
            "{}:{}:{}: {}: {}",
            path,
            failure.error.position.line,
            failure.error.position.column,
            failure.function,
            failure.error.message
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_sources_scans_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.sfn"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("a.sfn"), "").unwrap();

        let sources = collect_sources(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(
            sources,
            vec![dir.path().join("b.sfn"), dir.path().join("nested").join("a.sfn")]
        );
    }

    #[test]
    fn test_collect_sources_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            collect_sources(&[dir.path().to_path_buf()]),
            Err(CliError::InvalidInput(_))
        ));
        assert!(matches!(
            collect_sources(&[dir.path().join("missing.sfn")]),
            Err(CliError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_compile_files_keeps_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.sfn");
        let broken = dir.path().join("broken.sfn");
        std::fs::write(&good, "def main(data):\n    data[\"a\"] = 1\n").unwrap();
        std::fs::write(&broken, "def main(data):\n    while True:\n        pass\n").unwrap();

        let reports = compile_files(&Compiler::default(), vec![good.clone(), broken.clone()])
            .await
            .unwrap();
        assert_eq!(reports[0].path, good);
        assert!(reports[0].is_success());
        assert_eq!(reports[0].machines.len(), 1);
        assert_eq!(reports[1].path, broken);
        assert!(reports[1].syntax_error.is_some());
        assert_eq!(failure_lines(&reports[1]).len(), 1);
    }
}

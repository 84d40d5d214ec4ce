use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

const ORDERS: &str = r#"@export
@schedule(expression="rate(1 day)")
def main(data):
    """Nightly settlement"""
    data["batch"] = load_batch()
    data["settled"] = map(_settle, data["batch"], max_concurrency=5)

def _settle(data):
    data["receipt"] = charge(data)
"#;

const BROKEN: &str = "def main(data):\n    data[\"Result\"] = 1\n";

fn fluxio(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fluxio").unwrap();
    // Keep the user's real config file out of the tests
    cmd.env("FLUXIO_CONFIG", config_dir.join("config.toml"));
    cmd
}

#[test]
fn compile_prints_json_documents() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("orders.sfn");
    std::fs::write(&source, ORDERS)?;

    let output = fluxio(dir.path())
        .args(["--output", "json", "compile"])
        .arg(&source)
        .output()?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let reports: Value = serde_json::from_slice(&output.stdout)?;
    let machine = &reports[0]["machines"][0];
    assert_eq!(machine["name"], "main");
    assert_eq!(machine["definition"]["Comment"], "Nightly settlement");
    assert_eq!(
        machine["definition"]["States"]["Map-L6C5"]["Iterator"]["StartAt"],
        "Task-L9C5"
    );
    assert_eq!(machine["effects"][1]["decorator"], "schedule");
    assert_eq!(reports[0]["machines"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn compile_writes_documents_to_out_dir() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let sources = dir.path().join("src");
    std::fs::create_dir(&sources)?;
    std::fs::write(sources.join("orders.sfn"), ORDERS)?;
    let out_dir = dir.path().join("build");

    fluxio(dir.path())
        .arg("compile")
        .arg(&sources)
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("orders.main.asl.json"));

    let document: Value = serde_json::from_str(&std::fs::read_to_string(out_dir.join("orders.main.asl.json"))?)?;
    assert_eq!(document["StartAt"], "Task-L5C5");
    assert!(out_dir.join("orders.main.effects.json").exists());
    Ok(())
}

#[test]
fn compile_fails_on_unsupported_code() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("broken.sfn");
    std::fs::write(&source, BROKEN)?;

    fluxio(dir.path())
        .arg("compile")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.sfn:2:5: main: Result path $['Result'] is invalid"));
    Ok(())
}

#[test]
fn check_reports_each_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("orders.sfn"), ORDERS)?;
    std::fs::write(dir.path().join("broken.sfn"), BROKEN)?;

    let output = fluxio(dir.path())
        .args(["--output", "json", "check"])
        .arg(dir.path())
        .output()?;
    assert!(!output.status.success());

    let results: Value = serde_json::from_slice(&output.stdout)?;
    // Sorted by path: broken.sfn first
    assert_eq!(results[0]["machines"], 0);
    assert_eq!(results[0]["failures"][0]["function"], "main");
    assert_eq!(results[0]["failures"][0]["error"]["position"]["line"], 2);
    assert_eq!(results[1]["machines"], 1);
    assert_eq!(results[1]["failures"], serde_json::json!([]));
    Ok(())
}

#[test]
fn check_reports_syntax_errors() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("loop.sfn");
    std::fs::write(&source, "def main(data):\n    while True:\n        pass\n")?;

    fluxio(dir.path())
        .arg("check")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("while"));
    Ok(())
}

#[test]
fn config_file_sets_resource_template() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("config.toml"),
        "output = \"json\"\n\n[compiler]\ntask_resource_template = \"arn:aws:lambda:{name}\"\n",
    )?;
    let source = dir.path().join("orders.sfn");
    std::fs::write(&source, ORDERS)?;

    let output = fluxio(dir.path()).arg("compile").arg(&source).output()?;
    assert!(output.status.success());
    let reports: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        reports[0]["machines"][0]["definition"]["States"]["Task-L5C5"]["Resource"],
        "arn:aws:lambda:load_batch"
    );
    Ok(())
}

#[test]
fn decorators_lists_registry() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    fluxio(dir.path())
        .arg("decorators")
        .assert()
        .success()
        .stdout(predicate::str::contains("subscribe"))
        .stdout(predicate::str::contains("topic_arn_import_value"));

    let output = fluxio(dir.path()).args(["-o", "yaml", "decorators"]).output()?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("name: schedule"));
    Ok(())
}

#[test]
fn missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fluxio(dir.path())
        .arg("compile")
        .arg(dir.path().join("nowhere.sfn"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

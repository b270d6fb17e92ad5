use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn gtsuite<I, S>(args: I, cwd: &Path) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_gtsuite"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("gtsuite should start")
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directories should be created");
    }
    fs::write(path, content).expect("file should be written");
}

#[test]
fn combinations_command_prints_numbered_subsets() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = gtsuite(["combinations", "-seed 100", "-mintsd 5"], temp.path());

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "1 -seed 100\n2 -mintsd 5\n3 -seed 100 -mintsd 5\n"
    );
}

#[test]
fn combinations_command_requires_fragments() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = gtsuite(["combinations"], temp.path());

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INPUT.CLI_USAGE"));
}

#[test]
fn list_command_filters_by_keyword() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = gtsuite(["list", "--keywords", "gt_repfind extend"], temp.path());

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2, "stdout: {}", stdout);
    assert!(lines[0].ends_with("gt repfind extend at1MB [extend gt_repfind]"));
    assert!(lines[1].ends_with("gt repfind extend self vs query [extend gt_repfind]"));
}

#[test]
fn list_command_includes_gttestdata_cases_only_when_configured() {
    let temp = TempDir::new().expect("tempdir should be created");
    let without = gtsuite(["list", "--name", "*yeast*"], temp.path());
    assert!(without.status.success());
    assert!(String::from_utf8_lossy(&without.stdout).is_empty());

    let with = gtsuite(
        ["list", "--name", "*yeast*", "--gttestdata", "gttestdata"],
        temp.path(),
    );
    assert!(with.status.success());
    assert_eq!(String::from_utf8_lossy(&with.stdout).lines().count(), 34);
}

#[test]
fn malformed_dataset_table_is_an_input_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_file(&temp.path().join("datasets.json"), "{ \"ltrharvest\": [ }");

    let output = gtsuite(["list", "--datasets", "datasets.json"], temp.path());
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INPUT.DATASET_TABLE"));
}

#[test]
fn run_command_reports_failures_and_exits_non_zero() {
    let temp = TempDir::new().expect("tempdir should be created");
    // No gt binary exists under the default bin directory, so the single
    // selected case cannot start its subject step.
    let output = gtsuite(
        [
            "run",
            "--name",
            "gt ltrharvest missing index",
            "--report",
            "out/report.json",
        ],
        temp.path(),
    );

    assert_eq!(
        output.status.code(),
        Some(1),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Suite status: FAIL"), "stdout: {}", stdout);
    assert!(stdout.contains("Cases: 1 total (0 passed, 1 failed)"));

    let report_path = temp.path().join("out/report.json");
    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("report should be readable"))
            .expect("report JSON should parse");
    assert_eq!(parsed["passed"], Value::Bool(false));
    assert_eq!(parsed["cases"][0]["name"], "gt ltrharvest missing index");
    assert_eq!(
        parsed["cases"][0]["outcome"]["failure"]["kind"],
        "expected_failure_mismatch"
    );
    assert!(temp.path().join("work/test1").is_dir());
}

#[test]
fn run_command_rejects_empty_selection() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = gtsuite(["run", "--name", "no such case"], temp.path());

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no cases match"));
}

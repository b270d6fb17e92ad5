use crate::config::SuiteConfig;
use crate::domain::{FailureKind, SuiteError, SuiteResult};
use crate::orchestrator::{CaseOutcome, prepare_working_dir, run_case};
use crate::process::ProcessRunner;
use crate::suites::CaseDescriptor;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize)]
pub struct SuiteRunReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub bin_dir: String,
    pub work_root: String,
    pub case_count: usize,
    pub passed_case_count: usize,
    pub failed_case_count: usize,
    /// Failed cases per failure kind.
    pub failure_kinds: BTreeMap<String, usize>,
    pub cases: Vec<CaseRunReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseRunReport {
    pub number: usize,
    pub name: String,
    pub keywords: Vec<String>,
    pub working_dir: String,
    pub outcome: CaseOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory '{}': {source}", path.display())]
    ReportDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report '{}': {source}", path.display())]
    SerializeReport {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write report '{}': {source}", path.display())]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ReportError> for SuiteError {
    fn from(error: ReportError) -> Self {
        let message = error.to_string();
        match error {
            ReportError::ReportDirectory { .. } | ReportError::WriteReport { .. } => {
                SuiteError::io_system("IO.SUITE_REPORT", message)
            }
            ReportError::SerializeReport { .. } => {
                SuiteError::internal("SYS.SUITE_REPORT", message)
            }
        }
    }
}

/// Runs the given cases one after another, each in a fresh
/// `<work_root>/test<N>` directory, and writes the JSON report. A failing
/// case is recorded and the run moves on.
pub fn run_suite<R>(
    config: &SuiteConfig,
    descriptors: &[&CaseDescriptor],
    runner: &R,
) -> SuiteResult<SuiteRunReport>
where
    R: ProcessRunner + ?Sized,
{
    let mut cases = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let working_dir = config.case_work_dir(descriptor.number);
        prepare_working_dir(&working_dir)?;
        let outcome = run_case(&descriptor.case, runner, &working_dir)?;
        cases.push(CaseRunReport {
            number: descriptor.number,
            name: descriptor.name().to_string(),
            keywords: descriptor.keywords().map(str::to_string).collect(),
            working_dir: normalize_path(&working_dir),
            outcome,
        });
    }

    let case_count = cases.len();
    let passed_case_count = cases.iter().filter(|case| case.outcome.passed).count();
    let failed_case_count = case_count.saturating_sub(passed_case_count);
    let mut failure_kinds = BTreeMap::new();
    for failure in cases.iter().filter_map(|case| case.outcome.failure.as_ref()) {
        *failure_kinds
            .entry(failure_kind_key(failure.kind))
            .or_insert(0) += 1;
    }

    let report = SuiteRunReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        passed: failed_case_count == 0,
        bin_dir: normalize_path(&config.bin_dir),
        work_root: normalize_path(&config.work_root),
        case_count,
        passed_case_count,
        failed_case_count,
        failure_kinds,
        cases,
    };

    write_report_file(&config.report_path, &report)?;
    Ok(report)
}

pub fn render_human_summary(report: &SuiteRunReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Suite status: {}", status));
    lines.push(format!(
        "Cases: {} total ({} passed, {} failed)",
        report.case_count, report.passed_case_count, report.failed_case_count
    ));
    if !report.failure_kinds.is_empty() {
        let kinds = report
            .failure_kinds
            .iter()
            .map(|(kind, count)| format!("{}={}", kind, count))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Failure kinds: {}", kinds));
    }

    for case in report.cases.iter().filter(|case| !case.outcome.passed) {
        lines.push(format!("Case {} '{}': FAIL", case.number, case.name));
        if let Some(failure) = &case.outcome.failure {
            lines.push(format!("  first failure: {}", failure.headline()));
            if let Some(detail) = &failure.detail {
                for detail_line in detail.lines() {
                    lines.push(format!("    {}", detail_line));
                }
            }
        }
    }

    lines.join("\n")
}

fn failure_kind_key(kind: FailureKind) -> String {
    kind.as_str().to_string()
}

fn write_report_file(report_path: &Path, report: &SuiteRunReport) -> Result<(), ReportError> {
    if let Some(parent_dir) = report_path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| ReportError::ReportDirectory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let report_json =
        serde_json::to_string_pretty(report).map_err(|source| ReportError::SerializeReport {
            path: report_path.to_path_buf(),
            source,
        })?;
    fs::write(report_path, report_json).map_err(|source| ReportError::WriteReport {
        path: report_path.to_path_buf(),
        source,
    })
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

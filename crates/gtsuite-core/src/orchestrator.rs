use crate::case::{
    ArtifactAssertion, Assertion, ByteSource, ComparisonAssertion, LinePatternAssertion,
    PipelineStep, PipelineTestCase, SourceSpec,
};
use crate::compare::{ComparisonOutcome, compare_bytes};
use crate::domain::{
    ComparisonStatus, FailureKind, ProcessStatus, RootCause, StepRole, SuiteError, SuiteResult,
};
use crate::process::{Invocation, ProcessRunner};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub label: String,
    pub role: StepRole,
    pub command: String,
    pub expected_exit: i32,
    pub status: ProcessStatus,
    pub elapsed_ms: u64,
    pub stdout_bytes: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssertionReport {
    pub index: usize,
    pub description: String,
    pub expected_status: ComparisonStatus,
    pub observed_status: ComparisonStatus,
    pub passed: bool,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailedItem {
    Step { index: usize, label: String },
    Assertion { index: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseFailure {
    pub kind: FailureKind,
    pub root_cause: RootCause,
    pub item: FailedItem,
    /// The rendered command, or the assertion description.
    pub command: String,
    pub expected: String,
    pub observed: String,
    pub detail: Option<String>,
}

impl CaseFailure {
    pub fn headline(&self) -> String {
        let location = match &self.item {
            FailedItem::Step { index, label } => format!("step {} '{}'", index + 1, label),
            FailedItem::Assertion { index } => format!("assertion {}", index + 1),
        };
        format!(
            "{} at {}: expected {}, observed {} [{}]",
            self.kind, location, self.expected, self.observed, self.command
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub passed: bool,
    pub elapsed_ms: u64,
    pub steps: Vec<StepReport>,
    pub assertions: Vec<AssertionReport>,
    pub failure: Option<CaseFailure>,
}

/// Wipes and recreates a case working directory.
pub fn prepare_working_dir(path: &Path) -> SuiteResult<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|source| {
            SuiteError::io_system(
                "IO.CASE_WORKDIR",
                format!(
                    "failed to clear case directory '{}': {}",
                    path.display(),
                    source
                ),
            )
        })?;
    }
    fs::create_dir_all(path).map_err(|source| {
        SuiteError::io_system(
            "IO.CASE_WORKDIR",
            format!(
                "failed to create case directory '{}': {}",
                path.display(),
                source
            ),
        )
    })
}

/// Executes one case in `working_dir`, which must already exist.
///
/// Steps run strictly in order and the first unmet expectation aborts the
/// case. Assertions only run once every step met its expected exit code.
pub fn run_case<R>(
    case: &PipelineTestCase,
    runner: &R,
    working_dir: &Path,
) -> SuiteResult<CaseOutcome>
where
    R: ProcessRunner + ?Sized,
{
    let started = Instant::now();
    info!(case = %case.name, "running case");

    let mut stdouts: HashMap<&str, Vec<u8>> = HashMap::new();
    let mut step_reports = Vec::with_capacity(case.steps.len());
    let mut assertion_reports = Vec::with_capacity(case.assertions.len());
    let mut failure = None;

    for (index, step) in case.steps.iter().enumerate() {
        debug!(
            case = %case.name,
            step = %step.label,
            budget_ms = step.time_budget.map(|budget| budget.as_millis() as u64),
            "{}",
            step.command_line()
        );
        let output = runner.run(&Invocation {
            program: &step.program,
            args: &step.args,
            working_dir,
            time_budget: step.time_budget,
        });
        persist_stdout(working_dir, &step.label, &output.stdout)?;

        let step_failure = evaluate_step(index, step, &output.status);
        step_reports.push(StepReport {
            index,
            label: step.label.clone(),
            role: step.role,
            command: step.command_line(),
            expected_exit: step.expected_exit,
            status: output.status.clone(),
            elapsed_ms: output.elapsed.as_millis() as u64,
            stdout_bytes: output.stdout.len(),
            passed: step_failure.is_none(),
        });
        stdouts.insert(step.label.as_str(), output.stdout);

        if let Some(step_failure) = step_failure {
            if !output.stderr.is_empty() {
                debug!(
                    case = %case.name,
                    step = %step.label,
                    "stderr: {}",
                    String::from_utf8_lossy(&output.stderr).trim_end()
                );
            }
            failure = Some(step_failure);
            break;
        }
    }

    if failure.is_none() {
        for (index, assertion) in case.assertions.iter().enumerate() {
            let (report, assertion_failure) = match assertion {
                Assertion::Compare(comparison) => {
                    evaluate_comparison(index, comparison, &stdouts, working_dir)
                }
                Assertion::LinePattern(pattern) => {
                    evaluate_line_pattern(index, pattern, &stdouts, working_dir)
                }
                Assertion::Artifact(artifact) => evaluate_artifact(index, artifact, working_dir),
            };
            assertion_reports.push(report);
            if assertion_failure.is_some() {
                failure = assertion_failure;
                break;
            }
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &failure {
        None => info!(case = %case.name, elapsed_ms, "case passed"),
        Some(failure) => warn!(
            case = %case.name,
            elapsed_ms,
            root_cause = %failure.root_cause,
            "case failed: {}",
            failure.headline()
        ),
    }

    Ok(CaseOutcome {
        passed: failure.is_none(),
        elapsed_ms,
        steps: step_reports,
        assertions: assertion_reports,
        failure,
    })
}

fn evaluate_step(index: usize, step: &PipelineStep, status: &ProcessStatus) -> Option<CaseFailure> {
    if status.exit_code() == Some(step.expected_exit) {
        return None;
    }

    let role_kind = match step.role {
        StepRole::Setup => FailureKind::SetupFailure,
        StepRole::Subject | StepRole::Validate => FailureKind::SubjectFailure,
    };
    let (kind, root_cause) = if status.is_timeout() {
        (role_kind, RootCause::Resource)
    } else if step.expected_exit != 0 {
        (FailureKind::ExpectedFailureMismatch, RootCause::Functional)
    } else {
        (role_kind, RootCause::Functional)
    };

    Some(CaseFailure {
        kind,
        root_cause,
        item: FailedItem::Step {
            index,
            label: step.label.clone(),
        },
        command: step.command_line(),
        expected: format!("exit code {}", step.expected_exit),
        observed: status.to_string(),
        detail: None,
    })
}

fn evaluate_comparison(
    index: usize,
    assertion: &ComparisonAssertion,
    stdouts: &HashMap<&str, Vec<u8>>,
    working_dir: &Path,
) -> (AssertionReport, Option<CaseFailure>) {
    let outcome = match (
        load_source(&assertion.actual, stdouts, working_dir),
        load_source(&assertion.expected, stdouts, working_dir),
    ) {
        (Ok(actual), Ok(expected)) => compare_bytes(assertion.mode, &actual, &expected),
        (Err(reason), _) | (_, Err(reason)) => ComparisonOutcome::trouble(reason),
    };
    let description = assertion.describe();
    let passed = outcome.status == assertion.expected_status;
    debug!(
        assertion = %description,
        "comparison {}",
        outcome.status
    );

    let failure = (!passed).then(|| {
        let kind = if assertion.expected_status == ComparisonStatus::Identical {
            FailureKind::ContentMismatch
        } else {
            FailureKind::ExpectedFailureMismatch
        };
        CaseFailure {
            kind,
            root_cause: RootCause::Semantic,
            item: FailedItem::Assertion { index },
            command: description.clone(),
            expected: assertion.expected_status.to_string(),
            observed: outcome.status.to_string(),
            detail: outcome.summary.clone(),
        }
    });

    (
        AssertionReport {
            index,
            description,
            expected_status: assertion.expected_status,
            observed_status: outcome.status,
            passed,
            summary: outcome.summary,
        },
        failure,
    )
}

fn evaluate_line_pattern(
    index: usize,
    assertion: &LinePatternAssertion,
    stdouts: &HashMap<&str, Vec<u8>>,
    working_dir: &Path,
) -> (AssertionReport, Option<CaseFailure>) {
    let description = assertion.describe();
    let (observed_status, summary) = match load_source(&assertion.source, stdouts, working_dir) {
        Err(reason) => (ComparisonStatus::Trouble, Some(reason)),
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => (
            ComparisonStatus::Differ,
            Some(format!(
                "{} has no lines to match /{}/",
                assertion.source.source, assertion.pattern
            )),
        ),
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            match text
                .lines()
                .enumerate()
                .find(|(_, line)| !assertion.pattern.is_match(line))
            {
                Some((line_index, line)) => (
                    ComparisonStatus::Differ,
                    Some(format!(
                        "line {} does not match /{}/: {}",
                        line_index + 1,
                        assertion.pattern,
                        line
                    )),
                ),
                None => (ComparisonStatus::Identical, None),
            }
        }
    };
    let passed = observed_status == ComparisonStatus::Identical;

    let failure = (!passed).then(|| CaseFailure {
        kind: FailureKind::ContentMismatch,
        root_cause: RootCause::Semantic,
        item: FailedItem::Assertion { index },
        command: description.clone(),
        expected: ComparisonStatus::Identical.to_string(),
        observed: observed_status.to_string(),
        detail: summary.clone(),
    });

    (
        AssertionReport {
            index,
            description,
            expected_status: ComparisonStatus::Identical,
            observed_status,
            passed,
            summary,
        },
        failure,
    )
}

fn evaluate_artifact(
    index: usize,
    assertion: &ArtifactAssertion,
    working_dir: &Path,
) -> (AssertionReport, Option<CaseFailure>) {
    let description = assertion.describe();
    let present = resolve_path(working_dir, &assertion.path).exists();
    let passed = present == assertion.present;
    let observed_status = if passed {
        ComparisonStatus::Identical
    } else {
        ComparisonStatus::Differ
    };
    let observed = if present { "file present" } else { "file missing" };
    debug!(assertion = %description, "{}", observed);

    // A missing file that should exist is a content regression; a file that
    // should be missing breaks a declared degenerate-case expectation.
    let failure = (!passed).then(|| CaseFailure {
        kind: if assertion.present {
            FailureKind::ContentMismatch
        } else {
            FailureKind::ExpectedFailureMismatch
        },
        root_cause: RootCause::Semantic,
        item: FailedItem::Assertion { index },
        command: description.clone(),
        expected: if assertion.present { "file present" } else { "file missing" }.to_string(),
        observed: observed.to_string(),
        detail: None,
    });

    (
        AssertionReport {
            index,
            description,
            expected_status: ComparisonStatus::Identical,
            observed_status,
            passed,
            summary: (!passed).then(|| observed.to_string()),
        },
        failure,
    )
}

fn load_source(
    spec: &SourceSpec,
    stdouts: &HashMap<&str, Vec<u8>>,
    working_dir: &Path,
) -> Result<Vec<u8>, String> {
    let raw = match &spec.source {
        ByteSource::Stdout { step } => stdouts
            .get(step.as_str())
            .cloned()
            .ok_or_else(|| format!("no captured stdout for step '{}'", step))?,
        ByteSource::File { path } => {
            let resolved = resolve_path(working_dir, path);
            fs::read(&resolved)
                .map_err(|source| format!("cannot read '{}': {}", resolved.display(), source))?
        }
    };
    Ok(spec.normalization.apply(&raw).into_owned())
}

fn resolve_path(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

fn persist_stdout(working_dir: &Path, label: &str, stdout: &[u8]) -> SuiteResult<()> {
    let path = working_dir.join(format!("{}.stdout", label));
    fs::write(&path, stdout).map_err(|source| {
        SuiteError::io_system(
            "IO.CASE_STDOUT",
            format!(
                "failed to persist stdout to '{}': {}",
                path.display(),
                source
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{FailedItem, prepare_working_dir, run_case};
    use crate::case::{ByteSource, ComparisonAssertion, PipelineStep, PipelineTestCase};
    use crate::compare::ComparisonMode;
    use crate::domain::{ComparisonStatus, FailureKind, ProcessStatus, RootCause, StepRole};
    use crate::process::{Invocation, ProcessOutput, ProcessRunner};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Replays canned outcomes keyed by the first argument.
    #[derive(Default)]
    struct ScriptedRunner {
        outcomes: HashMap<String, (ProcessStatus, Vec<u8>)>,
        invoked: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        fn with(mut self, tool: &str, status: ProcessStatus, stdout: &[u8]) -> Self {
            self.outcomes
                .insert(tool.to_string(), (status, stdout.to_vec()));
            self
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation<'_>) -> ProcessOutput {
            let tool = invocation.args.first().cloned().unwrap_or_default();
            self.invoked.borrow_mut().push(tool.clone());
            match self.outcomes.get(&tool) {
                Some((status, stdout)) => ProcessOutput {
                    status: status.clone(),
                    stdout: stdout.clone(),
                    stderr: Vec::new(),
                    elapsed: Duration::from_millis(1),
                },
                None => ProcessOutput::not_started("unscripted tool"),
            }
        }
    }

    fn exited(code: i32) -> ProcessStatus {
        ProcessStatus::Exited { code }
    }

    fn index_then_search(reference: &std::path::Path) -> PipelineTestCase {
        PipelineTestCase::builder("gt repfind sample")
            .tag("gt_repfind")
            .step(
                PipelineStep::new("index", StepRole::Setup, "gt", ["suffixerator"])
                    .producing("sfx")
                    .with_time_budget(320),
            )
            .step(
                PipelineStep::new("search", StepRole::Subject, "gt", ["repfind"])
                    .consuming("sfx")
                    .with_time_budget(600),
            )
            .compare(ComparisonAssertion::new(
                ByteSource::stdout("search"),
                ByteSource::file(reference),
                ComparisonMode::Exact,
            ))
            .build()
            .expect("case should be valid")
    }

    #[test]
    fn passing_case_runs_every_step_and_assertion() {
        let temp = TempDir::new().expect("tempdir should be created");
        let reference = temp.path().join("expected.result");
        fs::write(&reference, "8 0 10 F 8 0 40\n").expect("reference should be written");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");

        let runner = ScriptedRunner::default()
            .with("suffixerator", exited(0), b"")
            .with("repfind", exited(0), b"8 0 10 F 8 0 40\n");
        let case = index_then_search(&reference);
        let outcome = run_case(&case, &runner, &workdir).expect("case should execute");

        assert!(outcome.passed, "{:?}", outcome.failure);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.assertions.len(), 1);
        assert_eq!(
            fs::read(workdir.join("search.stdout")).expect("stdout persisted"),
            b"8 0 10 F 8 0 40\n"
        );
    }

    #[test]
    fn failed_setup_never_runs_subject() {
        let temp = TempDir::new().expect("tempdir should be created");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");

        let runner = ScriptedRunner::default()
            .with("suffixerator", exited(1), b"")
            .with("repfind", exited(0), b"");
        let case = index_then_search(&temp.path().join("expected.result"));
        let outcome = run_case(&case, &runner, &workdir).expect("case should execute");

        assert!(!outcome.passed);
        assert_eq!(*runner.invoked.borrow(), vec!["suffixerator".to_string()]);
        let failure = outcome.failure.expect("failure recorded");
        assert_eq!(failure.kind, FailureKind::SetupFailure);
        assert_eq!(failure.root_cause, RootCause::Functional);
        assert_eq!(
            failure.item,
            FailedItem::Step {
                index: 0,
                label: "index".to_string()
            }
        );
        assert!(outcome.assertions.is_empty());
    }

    #[test]
    fn timeout_is_distinct_from_wrong_exit_code() {
        let temp = TempDir::new().expect("tempdir should be created");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");

        let runner = ScriptedRunner::default()
            .with("suffixerator", exited(0), b"")
            .with(
                "repfind",
                ProcessStatus::timed_out(Duration::from_secs(600)),
                b"",
            );
        let case = index_then_search(&temp.path().join("expected.result"));
        let failure = run_case(&case, &runner, &workdir)
            .expect("case should execute")
            .failure
            .expect("failure recorded");

        assert_eq!(failure.kind, FailureKind::SubjectFailure);
        assert_eq!(failure.root_cause, RootCause::Resource);
        assert_eq!(failure.observed, "time budget of 600s exceeded");
    }

    #[test]
    fn content_mismatch_carries_diff_summary() {
        let temp = TempDir::new().expect("tempdir should be created");
        let reference = temp.path().join("expected.result");
        fs::write(&reference, "8 0 10 F 8 0 40\n").expect("reference should be written");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");

        let runner = ScriptedRunner::default()
            .with("suffixerator", exited(0), b"")
            .with("repfind", exited(0), b"8 0 11 F 8 0 40\n");
        let case = index_then_search(&reference);
        let failure = run_case(&case, &runner, &workdir)
            .expect("case should execute")
            .failure
            .expect("failure recorded");

        assert_eq!(failure.kind, FailureKind::ContentMismatch);
        assert_eq!(failure.root_cause, RootCause::Semantic);
        assert_eq!(failure.item, FailedItem::Assertion { index: 0 });
        let detail = failure.detail.expect("summary");
        assert!(detail.contains("line 1"));
    }

    #[test]
    fn declared_failure_codes_pass_when_observed() {
        let temp = TempDir::new().expect("tempdir should be created");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");

        let case = PipelineTestCase::builder("gt ltrharvest test chr11 yeast")
            .step(PipelineStep::new("check", StepRole::Validate, "gt", ["gff3", "chr11.gff3"]).expect_exit(1))
            .compare(
                ComparisonAssertion::new(
                    ByteSource::file("chr11.gff3"),
                    ByteSource::file(temp.path().join("absent/chr11.gff3")),
                    ComparisonMode::Exact,
                )
                .expect_status(ComparisonStatus::Trouble),
            )
            .build()
            .expect("case should be valid");

        let runner = ScriptedRunner::default().with("gff3", exited(1), b"");
        let outcome = run_case(&case, &runner, &workdir).expect("case should execute");
        assert!(outcome.passed, "{:?}", outcome.failure);
        assert_eq!(
            outcome.assertions[0].observed_status,
            ComparisonStatus::Trouble
        );

        let runner = ScriptedRunner::default().with("gff3", exited(0), b"");
        let failure = run_case(&case, &runner, &workdir)
            .expect("case should execute")
            .failure
            .expect("failure recorded");
        assert_eq!(failure.kind, FailureKind::ExpectedFailureMismatch);
    }

    #[test]
    fn rerun_yields_same_outcome() {
        let temp = TempDir::new().expect("tempdir should be created");
        let reference = temp.path().join("expected.result");
        fs::write(&reference, "x\n").expect("reference should be written");
        let workdir = temp.path().join("test1");

        let runner = ScriptedRunner::default()
            .with("suffixerator", exited(0), b"")
            .with("repfind", exited(0), b"y\n");
        let case = index_then_search(&reference);

        let mut verdicts = Vec::new();
        for _ in 0..2 {
            prepare_working_dir(&workdir).expect("workdir");
            let outcome = run_case(&case, &runner, &workdir).expect("case should execute");
            verdicts.push((outcome.passed, outcome.failure.map(|failure| failure.kind)));
        }
        assert_eq!(verdicts[0], verdicts[1]);
    }

    fn degenerate_annotation_case(temp: &TempDir) -> PipelineTestCase {
        PipelineTestCase::builder("gt ltrharvest test chr11 yeast")
            .step(PipelineStep::new("check", StepRole::Validate, "gt", ["gff3", "chr11.gff3"]).expect_exit(1))
            .compare(
                ComparisonAssertion::new(
                    ByteSource::file("chr11.gff3"),
                    ByteSource::file(temp.path().join("absent/chr11.gff3")),
                    ComparisonMode::Exact,
                )
                .expect_status(ComparisonStatus::Trouble),
            )
            .artifact_absent("chr11.gff3")
            .build()
            .expect("case should be valid")
    }

    #[test]
    fn degenerate_dataset_passes_without_annotation() {
        let temp = TempDir::new().expect("tempdir should be created");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");

        let runner = ScriptedRunner::default().with("gff3", exited(1), b"");
        let outcome = run_case(&degenerate_annotation_case(&temp), &runner, &workdir)
            .expect("case should execute");
        assert!(outcome.passed, "{:?}", outcome.failure);
        assert_eq!(outcome.assertions.len(), 2);
    }

    #[test]
    fn unexpected_annotation_breaks_degenerate_expectation() {
        let temp = TempDir::new().expect("tempdir should be created");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");
        fs::write(workdir.join("chr11.gff3"), "not gff3\n").expect("annotation should be written");

        let runner = ScriptedRunner::default().with("gff3", exited(1), b"");
        let failure = run_case(&degenerate_annotation_case(&temp), &runner, &workdir)
            .expect("case should execute")
            .failure
            .expect("failure recorded");

        assert_eq!(failure.kind, FailureKind::ExpectedFailureMismatch);
        assert_eq!(failure.item, FailedItem::Assertion { index: 1 });
        assert_eq!(failure.observed, "file present");
    }

    #[test]
    fn line_pattern_rejects_empty_output() {
        let temp = TempDir::new().expect("tempdir should be created");
        let workdir = temp.path().join("test1");
        prepare_working_dir(&workdir).expect("workdir");

        let case = PipelineTestCase::builder("gt repfind extend self vs query")
            .step(PipelineStep::new("search", StepRole::Subject, "gt", ["repfind"]))
            .lines_match(ByteSource::stdout("search"), r"^\d+ \d+ \d+ [FRCP] \d+ \d+ \d+")
            .build()
            .expect("case should be valid");

        let runner = ScriptedRunner::default().with("repfind", exited(0), b"");
        let failure = run_case(&case, &runner, &workdir)
            .expect("case should execute")
            .failure
            .expect("failure recorded");
        assert_eq!(failure.kind, FailureKind::ContentMismatch);
        assert!(failure.detail.expect("summary").contains("no lines"));

        let runner = ScriptedRunner::default().with("repfind", exited(0), b"8 0 10 F 8 0 40\n");
        let outcome = run_case(&case, &runner, &workdir).expect("case should execute");
        assert!(outcome.passed, "{:?}", outcome.failure);
    }
}

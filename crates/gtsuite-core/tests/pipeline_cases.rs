#![cfg(unix)]

use gtsuite_core::case::{
    ByteSource, ComparisonAssertion, PipelineStep, PipelineTestCase, SourceSpec,
};
use gtsuite_core::compare::{ComparisonMode, Normalization};
use gtsuite_core::domain::{FailureKind, RootCause, StepRole};
use gtsuite_core::orchestrator::{prepare_working_dir, run_case};
use gtsuite_core::process::SystemProcessRunner;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn shell(label: &str, role: StepRole, script: &str) -> PipelineStep {
    PipelineStep::new(label, role, "sh", ["-c", script])
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directories should be created");
    }
    fs::write(path, content).expect("file should be written");
}

#[test]
fn later_steps_observe_artifacts_of_earlier_steps() {
    let temp = TempDir::new().expect("tempdir should be created");
    let expected = temp.path().join("expected/matches.txt");
    write_file(&expected, "12 0 5 F 12 0 40\n");

    let case = PipelineTestCase::builder("artifact handoff")
        .step(shell("index", StepRole::Setup, "printf '12 0 5 F 12 0 40\\n' > sfx").producing("sfx"))
        .step(shell("search", StepRole::Subject, "printf '# header\\n'; cat sfx").consuming("sfx"))
        .compare(ComparisonAssertion::new(
            SourceSpec::new(ByteSource::stdout("search"), Normalization::without_comments()),
            ByteSource::file(&expected),
            ComparisonMode::Exact,
        ))
        .build()
        .expect("case should be valid");

    let work = temp.path().join("work/test1");
    prepare_working_dir(&work).expect("work dir should be prepared");
    let outcome = run_case(&case, &SystemProcessRunner, &work).expect("case should run");

    assert!(outcome.passed, "failure: {:?}", outcome.failure);
    assert_eq!(
        fs::read_to_string(work.join("search.stdout")).expect("stdout persisted"),
        "# header\n12 0 5 F 12 0 40\n"
    );
}

#[test]
fn exceeded_budget_is_reported_as_resource_failure() {
    let temp = TempDir::new().expect("tempdir should be created");
    let case = PipelineTestCase::builder("slow subject")
        .step(shell("slow", StepRole::Subject, "exec sleep 5").with_time_budget(1))
        .step(shell("never", StepRole::Validate, "exit 0"))
        .build()
        .expect("case should be valid");

    let outcome = run_case(&case, &SystemProcessRunner, temp.path()).expect("case should run");
    let failure = outcome.failure.expect("timeout should fail the case");
    assert_eq!(failure.kind, FailureKind::SubjectFailure);
    assert_eq!(failure.root_cause, RootCause::Resource);
    assert!(failure.observed.contains("time budget of 1s exceeded"));
    assert_eq!(outcome.steps.len(), 1);
}

#[test]
fn exchanged_directions_compare_equal_after_column_reordering() {
    let temp = TempDir::new().expect("tempdir should be created");
    let forward_columns = Normalization::columns_sorted(vec![1, 3, 4, 5, 7]);
    let backward_columns = Normalization::columns_sorted(vec![5, 7, 4, 1, 3]);

    let symmetric = |name: &str, backward_second_line: &str| {
        PipelineTestCase::builder(name)
            .step(shell(
                "forward",
                StepRole::Subject,
                "printf '30 0 100 F 30 0 900\\n25 0 10 F 25 0 400\\n'",
            ))
            .step(shell(
                "backward",
                StepRole::Subject,
                &format!("printf '25 0 400 F 25 0 10\\n{}\\n'", backward_second_line),
            ))
            .compare(ComparisonAssertion::new(
                SourceSpec::new(ByteSource::stdout("backward"), backward_columns.clone()),
                SourceSpec::new(ByteSource::stdout("forward"), forward_columns.clone()),
                ComparisonMode::Exact,
            ))
            .build()
            .expect("case should be valid")
    };

    let agreeing = symmetric("symmetric", "30 0 900 F 30 0 100");
    let outcome = run_case(&agreeing, &SystemProcessRunner, temp.path()).expect("case should run");
    assert!(outcome.passed, "failure: {:?}", outcome.failure);

    let disagreeing = symmetric("asymmetric", "30 0 901 F 30 0 100");
    let outcome =
        run_case(&disagreeing, &SystemProcessRunner, temp.path()).expect("case should run");
    let failure = outcome.failure.expect("asymmetry should fail");
    assert_eq!(failure.kind, FailureKind::ContentMismatch);
    assert_eq!(failure.root_cause, RootCause::Semantic);
    assert!(
        failure
            .detail
            .as_deref()
            .is_some_and(|detail| detail.contains("first difference at line 2")),
        "detail: {:?}",
        failure.detail
    );
}

#[test]
fn line_pattern_reports_first_offending_line() {
    let temp = TempDir::new().expect("tempdir should be created");
    let case = PipelineTestCase::builder("format check")
        .step(shell(
            "matches",
            StepRole::Subject,
            "printf '40 0 12 F 40 88 0 1e-12 97.50\\n40 0 12 F 40 x 0 1e-12 97.50\\n'",
        ))
        .lines_match(
            ByteSource::stdout("matches"),
            r"^\d+ \d+ \d+ . \d+ \d+ \d+ \S+ \d+\.\d+$",
        )
        .build()
        .expect("case should be valid");

    let outcome = run_case(&case, &SystemProcessRunner, temp.path()).expect("case should run");
    let failure = outcome.failure.expect("second line should not match");
    assert_eq!(failure.kind, FailureKind::ContentMismatch);
    assert!(
        failure
            .detail
            .as_deref()
            .is_some_and(|detail| detail.starts_with("line 2 does not match")),
        "detail: {:?}",
        failure.detail
    );
}

#[test]
fn timed_out_subject_leaves_no_late_writes() {
    let temp = TempDir::new().expect("tempdir should be created");
    let case = PipelineTestCase::builder("slow pipeline")
        .step(
            shell("slow", StepRole::Subject, "sh -c 'sleep 2; touch late_write' & wait")
                .with_time_budget(1),
        )
        .build()
        .expect("case should be valid");

    let outcome = run_case(&case, &SystemProcessRunner, temp.path()).expect("case should run");
    let failure = outcome.failure.expect("timeout should fail the case");
    assert_eq!(failure.root_cause, RootCause::Resource);

    std::thread::sleep(std::time::Duration::from_secs(3));
    assert!(!temp.path().join("late_write").exists());
}

#[test]
fn empty_output_fails_the_line_format_check() {
    let temp = TempDir::new().expect("tempdir should be created");
    let case = PipelineTestCase::builder("silent search")
        .step(shell("matches", StepRole::Subject, "true"))
        .lines_match(ByteSource::stdout("matches"), r"^\d+ \d+ \d+ . \d+ \d+ \d+")
        .build()
        .expect("case should be valid");

    let outcome = run_case(&case, &SystemProcessRunner, temp.path()).expect("case should run");
    let failure = outcome.failure.expect("empty output should not pass");
    assert_eq!(failure.kind, FailureKind::ContentMismatch);
    assert_eq!(outcome.assertions[0].observed_status.code(), 1);
}

//! Declarative description of one pipeline test case.

use crate::compare::{ComparisonMode, Normalization};
use crate::domain::{ComparisonStatus, StepRole, SuiteError};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// A single subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub label: String,
    pub role: StepRole,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub time_budget: Option<Duration>,
    pub expected_exit: i32,
    /// Working-directory artifacts this step creates.
    pub produces: Vec<String>,
    /// Working-directory artifacts this step reads.
    pub consumes: Vec<String>,
}

impl PipelineStep {
    pub fn new<I, S>(
        label: impl Into<String>,
        role: StepRole,
        program: impl Into<PathBuf>,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            role,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            time_budget: None,
            expected_exit: 0,
            produces: Vec::new(),
            consumes: Vec::new(),
        }
    }

    /// Budget in seconds.
    pub fn with_time_budget(mut self, seconds: u64) -> Self {
        self.time_budget = Some(Duration::from_secs(seconds));
        self
    }

    pub fn expect_exit(mut self, code: i32) -> Self {
        self.expected_exit = code;
        self
    }

    pub fn producing(mut self, artifact: impl Into<String>) -> Self {
        self.produces.push(artifact.into());
        self
    }

    pub fn consuming(mut self, artifact: impl Into<String>) -> Self {
        self.consumes.push(artifact.into());
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Splits a flat argument string on whitespace. Option strings in this
/// suite never carry quoted values.
pub fn split_arguments(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSource {
    /// Captured standard output of an earlier step.
    Stdout { step: String },
    /// A file; relative paths resolve against the case working directory.
    File { path: PathBuf },
}

impl ByteSource {
    pub fn stdout(step: impl Into<String>) -> Self {
        Self::Stdout { step: step.into() }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }
}

impl Display for ByteSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout { step } => write!(f, "stdout({})", step),
            Self::File { path } => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub source: ByteSource,
    pub normalization: Normalization,
}

impl SourceSpec {
    pub fn new(source: ByteSource, normalization: Normalization) -> Self {
        Self {
            source,
            normalization,
        }
    }
}

impl From<ByteSource> for SourceSpec {
    fn from(source: ByteSource) -> Self {
        Self::new(source, Normalization::none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonAssertion {
    pub actual: SourceSpec,
    pub expected: SourceSpec,
    pub mode: ComparisonMode,
    /// Degenerate datasets declare a non-identical status here.
    pub expected_status: ComparisonStatus,
}

impl ComparisonAssertion {
    pub fn new(
        actual: impl Into<SourceSpec>,
        expected: impl Into<SourceSpec>,
        mode: ComparisonMode,
    ) -> Self {
        Self {
            actual: actual.into(),
            expected: expected.into(),
            mode,
            expected_status: ComparisonStatus::Identical,
        }
    }

    pub fn expect_status(mut self, status: ComparisonStatus) -> Self {
        self.expected_status = status;
        self
    }

    pub fn describe(&self) -> String {
        format!(
            "compare {} with {} ({:?})",
            self.actual.source, self.expected.source, self.mode
        )
    }
}

/// Every line of the source must match the pattern.
#[derive(Debug, Clone)]
pub struct LinePatternAssertion {
    pub source: SourceSpec,
    pub pattern: Regex,
}

impl LinePatternAssertion {
    pub fn describe(&self) -> String {
        format!("match lines of {} against /{}/", self.source.source, self.pattern)
    }
}

/// A produced file must exist, or must be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactAssertion {
    pub path: PathBuf,
    pub present: bool,
}

impl ArtifactAssertion {
    pub fn describe(&self) -> String {
        let expectation = if self.present { "exists" } else { "is absent" };
        format!("{} {}", self.path.display(), expectation)
    }
}

#[derive(Debug, Clone)]
pub enum Assertion {
    Compare(ComparisonAssertion),
    LinePattern(LinePatternAssertion),
    Artifact(ArtifactAssertion),
}

impl Assertion {
    pub fn describe(&self) -> String {
        match self {
            Self::Compare(assertion) => assertion.describe(),
            Self::LinePattern(assertion) => assertion.describe(),
            Self::Artifact(assertion) => assertion.describe(),
        }
    }

    fn sources(&self) -> Vec<&ByteSource> {
        match self {
            Self::Compare(assertion) => vec![&assertion.actual.source, &assertion.expected.source],
            Self::LinePattern(assertion) => vec![&assertion.source.source],
            Self::Artifact(_) => Vec::new(),
        }
    }
}

/// Steps run first, strictly in order; assertions run after every step
/// succeeded.
#[derive(Debug, Clone)]
pub struct PipelineTestCase {
    pub name: String,
    pub tags: BTreeSet<String>,
    pub steps: Vec<PipelineStep>,
    pub assertions: Vec<Assertion>,
}

impl PipelineTestCase {
    pub fn builder(name: impl Into<String>) -> CaseBuilder {
        CaseBuilder {
            name: name.into(),
            tags: BTreeSet::new(),
            steps: Vec::new(),
            assertions: Vec::new(),
            pending_error: None,
        }
    }

    pub fn step(&self, label: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|step| step.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseDefinitionError {
    #[error("case '{case}' declares no steps")]
    NoSteps { case: String },
    #[error("case '{case}' repeats step label '{label}'")]
    DuplicateStepLabel { case: String, label: String },
    #[error("case '{case}': step '{step}' consumes '{artifact}' before any step produces it")]
    UnproducedArtifact {
        case: String,
        step: String,
        artifact: String,
    },
    #[error("case '{case}': assertion {index} reads stdout of unknown step '{step}'")]
    UnknownStep {
        case: String,
        index: usize,
        step: String,
    },
    #[error("case '{case}': invalid line pattern '{pattern}': {message}")]
    InvalidPattern {
        case: String,
        pattern: String,
        message: String,
    },
}

impl From<CaseDefinitionError> for SuiteError {
    fn from(error: CaseDefinitionError) -> Self {
        SuiteError::input_validation("INPUT.CASE_DEFINITION", error.to_string())
    }
}

#[derive(Debug)]
pub struct CaseBuilder {
    name: String,
    tags: BTreeSet<String>,
    steps: Vec<PipelineStep>,
    assertions: Vec<Assertion>,
    pending_error: Option<CaseDefinitionError>,
}

impl CaseBuilder {
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn compare(mut self, assertion: ComparisonAssertion) -> Self {
        self.assertions.push(Assertion::Compare(assertion));
        self
    }

    pub fn artifact_absent(mut self, path: impl Into<PathBuf>) -> Self {
        self.assertions.push(Assertion::Artifact(ArtifactAssertion {
            path: path.into(),
            present: false,
        }));
        self
    }

    pub fn lines_match(mut self, source: impl Into<SourceSpec>, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(pattern) => self
                .assertions
                .push(Assertion::LinePattern(LinePatternAssertion {
                    source: source.into(),
                    pattern,
                })),
            Err(error) => {
                if self.pending_error.is_none() {
                    self.pending_error = Some(CaseDefinitionError::InvalidPattern {
                        case: self.name.clone(),
                        pattern: pattern.to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }
        self
    }

    pub fn build(self) -> Result<PipelineTestCase, CaseDefinitionError> {
        if let Some(error) = self.pending_error {
            return Err(error);
        }
        if self.steps.is_empty() {
            return Err(CaseDefinitionError::NoSteps { case: self.name });
        }

        let mut labels = HashSet::new();
        let mut produced = HashSet::new();
        for step in &self.steps {
            if !labels.insert(step.label.as_str()) {
                return Err(CaseDefinitionError::DuplicateStepLabel {
                    case: self.name.clone(),
                    label: step.label.clone(),
                });
            }
            if let Some(artifact) = step
                .consumes
                .iter()
                .find(|artifact| !produced.contains(artifact.as_str()))
            {
                return Err(CaseDefinitionError::UnproducedArtifact {
                    case: self.name.clone(),
                    step: step.label.clone(),
                    artifact: artifact.clone(),
                });
            }
            produced.extend(step.produces.iter().map(String::as_str));
        }

        for (index, assertion) in self.assertions.iter().enumerate() {
            for source in assertion.sources() {
                if let ByteSource::Stdout { step } = source {
                    if !labels.contains(step.as_str()) {
                        return Err(CaseDefinitionError::UnknownStep {
                            case: self.name.clone(),
                            index,
                            step: step.clone(),
                        });
                    }
                }
            }
        }

        Ok(PipelineTestCase {
            name: self.name,
            tags: self.tags,
            steps: self.steps,
            assertions: self.assertions,
        })
    }
}

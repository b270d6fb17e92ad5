pub mod errors;

pub use errors::{ErrorCategory, SuiteError, SuiteResult};

use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// Builds an artifact (usually an index) consumed by later steps.
    Setup,
    /// Runs the tool under test.
    Subject,
    /// Feeds a produced artifact into a downstream format checker.
    Validate,
}

impl StepRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Subject => "subject",
            Self::Validate => "validate",
        }
    }
}

impl Display for StepRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// How a subprocess ended, as observed by the process substrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessStatus {
    Exited { code: i32 },
    Signaled { signal: i32 },
    TimedOut { budget_ms: u64 },
    NotStarted { reason: String },
}

impl ProcessStatus {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited { code } => Some(*code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub fn timed_out(budget: Duration) -> Self {
        Self::TimedOut {
            budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl Display for ProcessStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exit code {}", code),
            Self::Signaled { signal } => write!(f, "terminated by signal {}", signal),
            Self::TimedOut { budget_ms } if budget_ms % 1000 == 0 => {
                write!(f, "time budget of {}s exceeded", budget_ms / 1000)
            }
            Self::TimedOut { budget_ms } => {
                write!(f, "time budget of {}ms exceeded", budget_ms)
            }
            Self::NotStarted { reason } => write!(f, "not started: {}", reason),
        }
    }
}

/// Outcome of a byte comparison, numbered like `diff`/`cmp` exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Identical,
    Differ,
    Trouble,
}

impl ComparisonStatus {
    pub const fn code(self) -> i32 {
        match self {
            Self::Identical => 0,
            Self::Differ => 1,
            Self::Trouble => 2,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Identical),
            1 => Some(Self::Differ),
            2 => Some(Self::Trouble),
            _ => None,
        }
    }
}

impl Display for ComparisonStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Identical => "identical",
            Self::Differ => "differ",
            Self::Trouble => "trouble",
        };
        write!(f, "{} (status {})", label, self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SetupFailure,
    SubjectFailure,
    ContentMismatch,
    ExpectedFailureMismatch,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetupFailure => "SetupFailure",
            Self::SubjectFailure => "SubjectFailure",
            Self::ContentMismatch => "ContentMismatch",
            Self::ExpectedFailureMismatch => "ExpectedFailureMismatch",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Which kind of regression a failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    /// A time budget was exceeded.
    Resource,
    /// A process ended with the wrong status.
    Functional,
    /// Produced bytes did not compare as declared.
    Semantic,
}

impl Display for RootCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Resource => "resource",
            Self::Functional => "functional",
            Self::Semantic => "semantic",
        })
    }
}

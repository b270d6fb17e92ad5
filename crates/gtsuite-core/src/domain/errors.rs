use std::fmt::{Display, Formatter};

pub type SuiteResult<T> = Result<T, SuiteError>;

/// What went wrong with the harness itself; each maps to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad command line, dataset table, case definition or selection.
    Input,
    /// The filesystem refused a read or write the harness needed.
    Io,
    Internal,
}

impl ErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Input => 2,
            Self::Io => 3,
            Self::Internal => 4,
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Io => "io",
            Self::Internal => "internal",
        })
    }
}

/// Harness malfunction. Case failures are reported as data, never as this.
///
/// `code` is a stable dotted identifier (`IO.CASE_WORKDIR`) that scripts can
/// match on regardless of the message wording.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{category} error [{code}] {message}")]
pub struct SuiteError {
    category: ErrorCategory,
    code: &'static str,
    message: String,
}

impl SuiteError {
    fn new(category: ErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Input, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Io, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// The two stderr lines printed before the process exits.
    pub fn diagnostic_lines(&self) -> [String; 2] {
        [
            format!("ERROR: [{}] {}", self.code, self.message),
            format!("FATAL EXIT CODE: {}", self.exit_code()),
        ]
    }
}

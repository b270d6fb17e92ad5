//! Declarative pipeline test cases for the `gt` sequence analysis tools:
//! option-subset generation, subprocess orchestration with time budgets,
//! byte-level comparison against reference fixtures, and suite reporting.

pub mod case;
pub mod combinations;
pub mod compare;
pub mod config;
pub mod datasets;
pub mod domain;
pub mod orchestrator;
pub mod process;
pub mod report;
pub mod suites;

pub use case::{ByteSource, ComparisonAssertion, PipelineStep, PipelineTestCase};
pub use config::SuiteConfig;
pub use domain::{SuiteError, SuiteResult};
pub use orchestrator::{CaseOutcome, run_case};
pub use report::{SuiteRunReport, render_human_summary, run_suite};

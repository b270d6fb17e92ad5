mod commands;
mod helpers;

use clap::Parser;
use gtsuite_core::domain::SuiteError;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "gtsuite_core=info,gtsuite=info";

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let suite_error = error.as_suite_error();
            for line in suite_error.diagnostic_lines() {
                eprintln!("{}", line);
            }
            suite_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("gtsuite".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();

    match Cli::try_parse_from(&full_args) {
        Ok(cli) => {
            init_tracing(cli.log_level.as_deref());
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "gtsuite", about = "Declarative pipeline tests for the gt tools", version)]
struct Cli {
    /// Log filter directive; falls back to RUST_LOG, then to crate-level info
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run the selected cases and write a JSON report
    Run(commands::RunArgs),
    /// List the selected cases without running them
    List(commands::ListArgs),
    /// Print every non-empty subset of the given option fragments
    Combinations(commands::CombinationsArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_suite_command(args),
        CliCommand::List(args) => commands::run_list_command(args),
        CliCommand::Combinations(args) => commands::run_combinations_command(args),
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    // stdout carries listings and the summary only.
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Suite(SuiteError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SuiteError> for CliError {
    fn from(error: SuiteError) -> Self {
        Self::Suite(error)
    }
}

impl CliError {
    fn as_suite_error(&self) -> SuiteError {
        match self {
            Self::Usage(message) => SuiteError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Suite(error) => error.clone(),
            Self::Internal(error) => SuiteError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

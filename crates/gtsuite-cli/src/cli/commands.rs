use super::CliError;
use super::helpers::*;
use gtsuite_core::combinations::{OptionFragment, combinations};
use gtsuite_core::config::SuiteConfig;
use gtsuite_core::process::SystemProcessRunner;
use gtsuite_core::report::{render_human_summary, run_suite};
use gtsuite_core::suites::{CaseSelection, build_suite};
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct LayoutArgs {
    /// Directory holding the gt binary under test
    #[arg(long, default_value = "bin")]
    bin_dir: PathBuf,

    /// Small test inputs shipped with the sources
    #[arg(long, default_value = "testdata")]
    testdata: PathBuf,

    /// Large external test inputs; cases needing them are skipped when unset
    #[arg(long)]
    gttestdata: Option<PathBuf>,

    /// Helper scripts used to generate inputs
    #[arg(long, default_value = "scripts")]
    scripts: PathBuf,

    /// Parent of the per-case working directories
    #[arg(long, default_value = "work")]
    work_root: PathBuf,

    /// Dataset table replacing the built-in one
    #[arg(long)]
    datasets: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct SelectionArgs {
    /// Only cases carrying all of these whitespace-separated keywords
    #[arg(long)]
    keywords: Option<String>,

    /// Only the case with this number; repeatable
    #[arg(long = "select", value_name = "NUMBER")]
    numbers: Vec<usize>,

    /// Only cases whose name matches this glob
    #[arg(long = "name", value_name = "GLOB")]
    name: Option<String>,
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    #[command(flatten)]
    layout: LayoutArgs,

    #[command(flatten)]
    selection: SelectionArgs,

    /// JSON report output path
    #[arg(long, default_value = "reports/gtsuite-report.json")]
    report: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct ListArgs {
    #[command(flatten)]
    layout: LayoutArgs,

    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(clap::Args)]
pub(super) struct CombinationsArgs {
    /// Option fragments, e.g. "-seed 100"
    #[arg(required = true, allow_hyphen_values = true)]
    fragments: Vec<String>,
}

impl LayoutArgs {
    fn into_config(self, report_path: PathBuf) -> SuiteConfig {
        SuiteConfig {
            bin_dir: self.bin_dir,
            testdata_dir: self.testdata,
            gttestdata_dir: self.gttestdata,
            scripts_dir: self.scripts,
            work_root: self.work_root,
            report_path,
            datasets_path: self.datasets,
        }
    }
}

impl SelectionArgs {
    fn into_selection(self) -> Result<CaseSelection, CliError> {
        let mut selection = CaseSelection::all().with_numbers(self.numbers);
        if let Some(keywords) = &self.keywords {
            selection = selection.with_keywords(keywords);
        }
        if let Some(pattern) = &self.name {
            selection = selection.with_name_glob(pattern)?;
        }
        Ok(selection)
    }
}

pub(super) fn run_suite_command(args: RunArgs) -> Result<i32, CliError> {
    let config = resolve_config_paths(args.layout.into_config(args.report), &current_working_dir()?);
    let selection = args.selection.into_selection()?;
    let table = load_dataset_table(&config)?;
    let suite = build_suite(&config, &table)?;
    let selected = selection.apply(&suite);
    if selected.is_empty() {
        return Err(CliError::Usage(
            "no cases match the given selection".to_string(),
        ));
    }

    let report = run_suite(&config, &selected, &SystemProcessRunner)?;
    println!("{}", render_human_summary(&report));
    println!("JSON report: {}", config.report_path.display());

    if report.passed { Ok(0) } else { Ok(1) }
}

pub(super) fn run_list_command(args: ListArgs) -> Result<i32, CliError> {
    let config = resolve_config_paths(
        args.layout.into_config(SuiteConfig::default().report_path),
        &current_working_dir()?,
    );
    let selection = args.selection.into_selection()?;
    let table = load_dataset_table(&config)?;
    let suite = build_suite(&config, &table)?;

    for descriptor in selection.apply(&suite) {
        let keywords = descriptor.keywords().collect::<Vec<_>>().join(" ");
        println!("{} {} [{}]", descriptor.number, descriptor.name(), keywords);
    }
    Ok(0)
}

pub(super) fn run_combinations_command(args: CombinationsArgs) -> Result<i32, CliError> {
    let fragments = args
        .fragments
        .into_iter()
        .map(OptionFragment::new)
        .collect::<Vec<_>>();
    for (index, combination) in combinations(&fragments).enumerate() {
        println!("{} {}", index + 1, combination.render(&fragments));
    }
    Ok(0)
}

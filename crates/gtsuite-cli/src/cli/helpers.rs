use super::CliError;
use anyhow::Context;
use gtsuite_core::config::SuiteConfig;
use gtsuite_core::datasets::DatasetTable;
use gtsuite_core::domain::SuiteError;
use std::path::{Path, PathBuf};

pub(super) fn current_working_dir() -> Result<PathBuf, CliError> {
    let working_dir =
        std::env::current_dir().context("failed to read current working directory")?;
    Ok(working_dir)
}

/// Cases run inside their own working directories, so every configured
/// location is made absolute against the invocation directory first.
pub(super) fn resolve_config_paths(mut config: SuiteConfig, working_dir: &Path) -> SuiteConfig {
    config.bin_dir = resolve_cli_path(working_dir, &config.bin_dir);
    config.testdata_dir = resolve_cli_path(working_dir, &config.testdata_dir);
    config.gttestdata_dir = config
        .gttestdata_dir
        .map(|path| resolve_cli_path(working_dir, &path));
    config.scripts_dir = resolve_cli_path(working_dir, &config.scripts_dir);
    config.work_root = resolve_cli_path(working_dir, &config.work_root);
    config.report_path = resolve_cli_path(working_dir, &config.report_path);
    config.datasets_path = config
        .datasets_path
        .map(|path| resolve_cli_path(working_dir, &path));
    config
}

pub(super) fn resolve_cli_path(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

pub(super) fn load_dataset_table(config: &SuiteConfig) -> Result<DatasetTable, CliError> {
    let table = match &config.datasets_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading dataset table");
            DatasetTable::load(path)
        }
        None => DatasetTable::builtin(),
    };
    table.map_err(|error| CliError::Suite(SuiteError::from(error)))
}

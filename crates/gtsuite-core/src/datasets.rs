//! Static dataset tables driving the per-dataset cases.
//!
//! Adding a dataset, or a dataset with no expected hits, is a table edit;
//! the suite builders never branch on dataset identity.

use crate::domain::{ComparisonStatus, SuiteError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const BUILTIN_TABLE: &str = include_str!("../data/dataset-table.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRoot {
    /// Small inputs shipped with the tool sources.
    Testdata,
    /// Large external inputs; optional.
    Gttestdata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Normal,
    Long,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputVariant {
    pub mode: OutputMode,
    pub time_budget: u64,
}

/// Declared behavior for an input known to yield zero hits: no annotation
/// file is written, the format checker fails, and the reference comparison
/// reports trouble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoHitsPolicy {
    pub checker_exit_code: i32,
    pub comparison_exit_code: i32,
}

impl NoHitsPolicy {
    pub fn comparison_status(&self) -> Option<ComparisonStatus> {
        ComparisonStatus::from_code(self.comparison_exit_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LtrharvestDataset {
    pub key: String,
    pub source: String,
    #[serde(default)]
    pub seed_length: Option<u32>,
    #[serde(default)]
    pub no_hits: Option<NoHitsPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LtrharvestCollection {
    pub id: String,
    /// `{key}` is replaced by the dataset key.
    pub case_name: String,
    pub root: DataRoot,
    pub directory: String,
    pub seed_length: u32,
    pub parameters: String,
    #[serde(default)]
    pub fasta_outputs: bool,
    pub index_time_budget: u64,
    pub variants: Vec<OutputVariant>,
    pub datasets: Vec<LtrharvestDataset>,
}

impl LtrharvestCollection {
    pub fn case_name_for(&self, dataset: &LtrharvestDataset) -> String {
        self.case_name.replace("{key}", &dataset.key)
    }

    pub fn seed_length_for(&self, dataset: &LtrharvestDataset) -> u32 {
        dataset.seed_length.unwrap_or(self.seed_length)
    }

    /// Datasets in key order.
    pub fn sorted_datasets(&self) -> Vec<&LtrharvestDataset> {
        let mut datasets = self.datasets.iter().collect::<Vec<_>>();
        datasets.sort_by(|a, b| a.key.cmp(&b.key));
        datasets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepfindDataset {
    pub file: String,
    pub root: DataRoot,
    #[serde(default)]
    pub directory: String,
    pub result_root: DataRoot,
    pub min_length: u32,
    /// Reference for the greedy-extension run; `None` skips that check.
    #[serde(default)]
    pub greedy_result: Option<String>,
}

impl RepfindDataset {
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.directory).join(&self.file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatasetTable {
    #[serde(default)]
    pub ltrharvest: Vec<LtrharvestCollection>,
    #[serde(default)]
    pub repfind: Vec<RepfindDataset>,
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetTableError {
    #[error("failed to read dataset table '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse dataset table '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("dataset table repeats key '{key}' in '{scope}'")]
    DuplicateKey { scope: String, key: String },
    #[error("dataset '{key}' declares an invalid no-hits policy: {message}")]
    InvalidNoHitsPolicy { key: String, message: String },
    #[error("collection '{collection}' declares no output variants")]
    NoVariants { collection: String },
}

impl From<DatasetTableError> for SuiteError {
    fn from(error: DatasetTableError) -> Self {
        let message = error.to_string();
        match error {
            DatasetTableError::Read { .. } => SuiteError::io_system("IO.DATASET_TABLE", message),
            DatasetTableError::Parse { .. }
            | DatasetTableError::DuplicateKey { .. }
            | DatasetTableError::InvalidNoHitsPolicy { .. }
            | DatasetTableError::NoVariants { .. } => {
                SuiteError::input_validation("INPUT.DATASET_TABLE", message)
            }
        }
    }
}

impl DatasetTable {
    pub fn builtin() -> Result<Self, DatasetTableError> {
        Self::from_json(BUILTIN_TABLE, Path::new("<builtin>"))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetTableError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DatasetTableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content, path)
    }

    pub fn from_json(content: &str, origin: &Path) -> Result<Self, DatasetTableError> {
        let table: Self =
            serde_json::from_str(content).map_err(|source| DatasetTableError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), DatasetTableError> {
        for collection in &self.ltrharvest {
            if collection.variants.is_empty() {
                return Err(DatasetTableError::NoVariants {
                    collection: collection.id.clone(),
                });
            }

            let mut keys = HashSet::new();
            for dataset in &collection.datasets {
                if !keys.insert(dataset.key.as_str()) {
                    return Err(DatasetTableError::DuplicateKey {
                        scope: collection.id.clone(),
                        key: dataset.key.clone(),
                    });
                }
                if let Some(policy) = dataset.no_hits {
                    validate_no_hits_policy(&dataset.key, policy)?;
                }
            }
        }

        let mut files = HashSet::new();
        for dataset in &self.repfind {
            if !files.insert(dataset.file.as_str()) {
                return Err(DatasetTableError::DuplicateKey {
                    scope: "repfind".to_string(),
                    key: dataset.file.clone(),
                });
            }
        }
        Ok(())
    }
}

fn validate_no_hits_policy(key: &str, policy: NoHitsPolicy) -> Result<(), DatasetTableError> {
    if policy.checker_exit_code == 0 {
        return Err(DatasetTableError::InvalidNoHitsPolicy {
            key: key.to_string(),
            message: "checkerExitCode must be non-zero".to_string(),
        });
    }
    match policy.comparison_status() {
        Some(ComparisonStatus::Identical) | None => Err(DatasetTableError::InvalidNoHitsPolicy {
            key: key.to_string(),
            message: format!(
                "comparisonExitCode {} is not a differing comparison status",
                policy.comparison_exit_code
            ),
        }),
        Some(_) => Ok(()),
    }
}

use crate::datasets::DataRoot;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteConfig {
    /// Directory holding the `gt` binary under test.
    pub bin_dir: PathBuf,
    pub testdata_dir: PathBuf,
    /// Large external inputs. Cases that need them are only registered
    /// when this is set.
    pub gttestdata_dir: Option<PathBuf>,
    /// Data-generation and comparison helper scripts.
    pub scripts_dir: PathBuf,
    /// Parent of the per-case `test<N>` working directories.
    pub work_root: PathBuf,
    pub report_path: PathBuf,
    /// Replaces the built-in dataset table.
    pub datasets_path: Option<PathBuf>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("bin"),
            testdata_dir: PathBuf::from("testdata"),
            gttestdata_dir: None,
            scripts_dir: PathBuf::from("scripts"),
            work_root: PathBuf::from("work"),
            report_path: PathBuf::from("reports/gtsuite-report.json"),
            datasets_path: None,
        }
    }
}

impl SuiteConfig {
    pub fn gt_binary(&self) -> PathBuf {
        self.bin_dir.join("gt")
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    pub fn testdata(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.testdata_dir.join(relative)
    }

    pub fn data_root(&self, root: DataRoot) -> Option<&Path> {
        match root {
            DataRoot::Testdata => Some(self.testdata_dir.as_path()),
            DataRoot::Gttestdata => self.gttestdata_dir.as_deref(),
        }
    }

    pub fn case_work_dir(&self, number: usize) -> PathBuf {
        self.work_root.join(format!("test{}", number))
    }
}

//! Case registration: turns the configured data layout and dataset table
//! into numbered, keyworded case descriptors.

mod ltrharvest;
mod repfind;

use crate::case::{CaseDefinitionError, PipelineTestCase};
use crate::config::SuiteConfig;
use crate::datasets::DatasetTable;
use crate::domain::{SuiteError, SuiteResult};
use globset::{Glob, GlobMatcher};
use std::collections::BTreeSet;
use std::path::Path;

pub const LTRHARVEST_KEYWORD: &str = "gt_ltrharvest";
pub const REPFIND_KEYWORD: &str = "gt_repfind";
pub const EXTEND_KEYWORD: &str = "extend";

/// A registered case: its run number and the declarative body.
#[derive(Debug, Clone)]
pub struct CaseDescriptor {
    pub number: usize,
    pub case: PipelineTestCase,
}

impl CaseDescriptor {
    pub fn name(&self) -> &str {
        &self.case.name
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.case.tags.iter().map(String::as_str)
    }
}

/// Builds every case the configuration can support, numbered 1..N in
/// registration order.
pub fn build_suite(config: &SuiteConfig, table: &DatasetTable) -> SuiteResult<Vec<CaseDescriptor>> {
    let mut registry = CaseRegistry::default();
    ltrharvest::register(config, table, &mut registry)?;
    repfind::register(config, table, &mut registry)?;

    let descriptors = registry
        .cases
        .into_iter()
        .enumerate()
        .map(|(index, case)| CaseDescriptor {
            number: index + 1,
            case,
        })
        .collect::<Vec<_>>();
    tracing::debug!(cases = descriptors.len(), "registered suite cases");
    Ok(descriptors)
}

#[derive(Debug, Default)]
pub(crate) struct CaseRegistry {
    cases: Vec<PipelineTestCase>,
}

impl CaseRegistry {
    pub(crate) fn add(
        &mut self,
        case: Result<PipelineTestCase, CaseDefinitionError>,
    ) -> SuiteResult<()> {
        self.cases.push(case.map_err(SuiteError::from)?);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn into_cases(self) -> Vec<PipelineTestCase> {
        self.cases
    }
}

/// Filters applied before running or listing. Empty filters select
/// everything; a case must satisfy every filter that is set.
#[derive(Debug, Clone, Default)]
pub struct CaseSelection {
    keywords: BTreeSet<String>,
    numbers: BTreeSet<usize>,
    name: Option<GlobMatcher>,
}

impl CaseSelection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Whitespace-separated keywords; a case must carry all of them.
    pub fn with_keywords(mut self, keywords: &str) -> Self {
        self.keywords
            .extend(keywords.split_whitespace().map(str::to_string));
        self
    }

    pub fn with_numbers(mut self, numbers: impl IntoIterator<Item = usize>) -> Self {
        self.numbers.extend(numbers);
        self
    }

    pub fn with_name_glob(mut self, pattern: &str) -> SuiteResult<Self> {
        let glob = Glob::new(pattern).map_err(|error| {
            SuiteError::input_validation(
                "INPUT.CASE_SELECTION",
                format!("invalid case name pattern '{}': {}", pattern, error),
            )
        })?;
        self.name = Some(glob.compile_matcher());
        Ok(self)
    }

    pub fn matches(&self, descriptor: &CaseDescriptor) -> bool {
        if !self.numbers.is_empty() && !self.numbers.contains(&descriptor.number) {
            return false;
        }
        if !self
            .keywords
            .iter()
            .all(|keyword| descriptor.case.tags.contains(keyword))
        {
            return false;
        }
        match &self.name {
            Some(matcher) => matcher.is_match(Path::new(descriptor.name())),
            None => true,
        }
    }

    pub fn apply<'a>(&self, descriptors: &'a [CaseDescriptor]) -> Vec<&'a CaseDescriptor> {
        descriptors
            .iter()
            .filter(|descriptor| self.matches(descriptor))
            .collect()
    }
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

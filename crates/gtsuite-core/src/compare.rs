use crate::domain::ComparisonStatus;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

const SUMMARY_LINE_LIMIT: usize = 120;

/// Declared per assertion; never inferred from the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Byte equality (`cmp -s`, plain `diff`).
    Exact,
    /// Line-wise equality with all whitespace removed (`diff -w`).
    IgnoreWhitespace,
    /// Equality of the line multisets, for tools without stable output order.
    Unordered,
}

/// Rewrites applied to one side before comparing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalization {
    /// Drop lines starting with `#`.
    #[serde(default)]
    pub drop_comment_lines: bool,
    /// 1-based fields to keep, in output order. Runs of whitespace count as
    /// one separator, so unlike `cut -d ' '` a double space never yields an
    /// empty field; missing fields render as empty.
    #[serde(default)]
    pub columns: Option<Vec<usize>>,
    #[serde(default)]
    pub sort_lines: bool,
}

impl Normalization {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn without_comments() -> Self {
        Self {
            drop_comment_lines: true,
            ..Self::default()
        }
    }

    pub fn columns_sorted(columns: impl Into<Vec<usize>>) -> Self {
        Self {
            drop_comment_lines: false,
            columns: Some(columns.into()),
            sort_lines: true,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.drop_comment_lines && self.columns.is_none() && !self.sort_lines
    }

    pub fn apply<'a>(&self, bytes: &'a [u8]) -> Cow<'a, [u8]> {
        if self.is_identity() {
            return Cow::Borrowed(bytes);
        }

        let mut lines = split_lines(bytes)
            .into_iter()
            .filter(|line| !(self.drop_comment_lines && line.first() == Some(&b'#')))
            .map(|line| match &self.columns {
                Some(columns) => select_columns(line, columns),
                None => line.to_vec(),
            })
            .collect::<Vec<_>>();

        if self.sort_lines {
            lines.sort();
        }

        Cow::Owned(join_lines(&lines))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonMetrics {
    pub actual_bytes: usize,
    pub expected_bytes: usize,
    pub first_mismatch_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonOutcome {
    pub status: ComparisonStatus,
    pub summary: Option<String>,
    pub metrics: ComparisonMetrics,
}

impl ComparisonOutcome {
    pub fn trouble(reason: impl Into<String>) -> Self {
        Self {
            status: ComparisonStatus::Trouble,
            summary: Some(reason.into()),
            metrics: ComparisonMetrics {
                actual_bytes: 0,
                expected_bytes: 0,
                first_mismatch_line: None,
            },
        }
    }
}

pub fn compare_bytes(mode: ComparisonMode, actual: &[u8], expected: &[u8]) -> ComparisonOutcome {
    let actual_lines = split_lines(actual);
    let expected_lines = split_lines(expected);

    let mismatch = match mode {
        ComparisonMode::Exact => {
            if actual == expected {
                None
            } else {
                Some(first_mismatch_line(&actual_lines, &expected_lines, |line| {
                    Cow::Borrowed(line)
                }))
            }
        }
        ComparisonMode::IgnoreWhitespace => {
            let differs = actual_lines.len() != expected_lines.len()
                || actual_lines
                    .iter()
                    .zip(&expected_lines)
                    .any(|(left, right)| squeeze_whitespace(left) != squeeze_whitespace(right));
            differs.then(|| {
                first_mismatch_line(&actual_lines, &expected_lines, squeeze_whitespace)
            })
        }
        ComparisonMode::Unordered => {
            let mut actual_sorted = actual_lines.clone();
            let mut expected_sorted = expected_lines.clone();
            actual_sorted.sort();
            expected_sorted.sort();
            (actual_sorted != expected_sorted).then(|| {
                first_mismatch_line(&actual_sorted, &expected_sorted, |line| {
                    Cow::Borrowed(line)
                })
            })
        }
    };

    let metrics = ComparisonMetrics {
        actual_bytes: actual.len(),
        expected_bytes: expected.len(),
        first_mismatch_line: mismatch.as_ref().map(|(line, _)| *line),
    };

    match mismatch {
        None => ComparisonOutcome {
            status: ComparisonStatus::Identical,
            summary: None,
            metrics,
        },
        Some((_, summary)) => ComparisonOutcome {
            status: ComparisonStatus::Differ,
            summary: Some(summary),
            metrics,
        },
    }
}

/// Locates the first differing line and renders a short diff-style summary.
fn first_mismatch_line<'a, F>(
    actual: &[&'a [u8]],
    expected: &[&'a [u8]],
    key: F,
) -> (usize, String)
where
    F: Fn(&'a [u8]) -> Cow<'a, [u8]>,
{
    let line_count = actual.len().max(expected.len());
    for index in 0..line_count {
        let left = actual.get(index).copied();
        let right = expected.get(index).copied();
        let same = match (left, right) {
            (Some(left), Some(right)) => key(left) == key(right),
            _ => false,
        };
        if !same {
            let summary = format!(
                "first difference at line {} (actual {} lines, expected {} lines)\n< {}\n> {}",
                index + 1,
                actual.len(),
                expected.len(),
                render_summary_line(left),
                render_summary_line(right)
            );
            return (index + 1, summary);
        }
    }

    // Same lines but different bytes: only line terminators can differ.
    (
        line_count.max(1),
        format!(
            "contents differ only in line terminators (actual {} lines, expected {} lines)",
            actual.len(),
            expected.len()
        ),
    )
}

fn squeeze_whitespace(line: &[u8]) -> Cow<'_, [u8]> {
    Cow::Owned(
        line.iter()
            .copied()
            .filter(|byte| !byte.is_ascii_whitespace())
            .collect(),
    )
}

fn render_summary_line(line: Option<&[u8]>) -> String {
    match line {
        None => "<end of input>".to_string(),
        Some(line) => {
            let text = String::from_utf8_lossy(line);
            if text.chars().count() > SUMMARY_LINE_LIMIT {
                let truncated = text.chars().take(SUMMARY_LINE_LIMIT).collect::<String>();
                format!("{}...", truncated)
            } else {
                text.into_owned()
            }
        }
    }
}

fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let trimmed = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    trimmed.split(|byte| *byte == b'\n').collect()
}

fn join_lines(lines: &[Vec<u8>]) -> Vec<u8> {
    let mut joined = Vec::with_capacity(lines.iter().map(|line| line.len() + 1).sum());
    for line in lines {
        joined.extend_from_slice(line);
        joined.push(b'\n');
    }
    joined
}

/// Fields are split on whitespace runs and rejoined with single spaces.
fn select_columns(line: &[u8], columns: &[usize]) -> Vec<u8> {
    let fields = line
        .split(|byte| byte.is_ascii_whitespace())
        .filter(|field| !field.is_empty())
        .collect::<Vec<_>>();

    let mut selected = Vec::with_capacity(line.len());
    for (position, column) in columns.iter().enumerate() {
        if position > 0 {
            selected.push(b' ');
        }
        if let Some(field) = column.checked_sub(1).and_then(|index| fields.get(index)) {
            selected.extend_from_slice(field);
        }
    }
    selected
}

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue tracker key such as `JI-1234`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IssueKey(String);

impl IssueKey {
    pub fn new(key: impl Into<String>) -> Self {
        IssueKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IssueKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Upstream JSON field whose type varies between records and that is never
/// inspected beyond "is it a string".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseField {
    #[default]
    Absent,
    Text(String),
    Structured(IgnoredAny),
}

impl LooseField {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            LooseField::Text(text) => Some(text),
            LooseField::Absent | LooseField::Structured(_) => None,
        }
    }
}

/// One executed pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub name: String,
    pub counter: u64,
    /// Human readable label, used as the release version.
    pub label: String,
    /// Scheduled time in epoch milliseconds.
    pub scheduled_date: i64,
    /// Free text attached when the run was triggered manually.
    pub comment: Option<String>,
}

impl PipelineRun {
    /// Calendar day (UTC) the run was scheduled on.
    pub fn scheduled_day(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.scheduled_date / 1000, 0).map(|dt| dt.date_naive())
    }
}

/// Source changes between run `counter - 1` and run `counter`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineComparison {
    pub pipeline_name: String,
    pub from_counter: u64,
    pub to_counter: u64,
    pub changes: Vec<MaterialChange>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialChange {
    pub material_type: String,
    pub material_name: String,
    pub revisions: Vec<Revision>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Revision {
    pub revision: String,
    pub modified_by: String,
    /// Empty for dependency materials, which carry no commit.
    pub commit_message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub key: IssueKey,
    pub issue_type: String,
    pub release_notes: String,
}

/// Named bucket of note lines taken from one issue.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub bullet_points: Vec<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Group {
            name: name.into(),
            bullet_points: Vec::new(),
        }
    }
}

/// Release notes merged across issues, keyed by group name in the order the
/// groups were first seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notes {
    pub(crate) groups: IndexMap<String, Vec<String>>,
}

impl Notes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn get(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups
            .iter()
            .map(|(name, bullets)| (name.as_str(), bullets.as_slice()))
    }
}

impl<N, B> FromIterator<(N, B)> for Notes
where
    N: Into<String>,
    B: IntoIterator,
    B::Item: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, B)>>(iter: I) -> Self {
        Notes {
            groups: iter
                .into_iter()
                .map(|(name, bullets)| (name.into(), bullets.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }
}

/// Wiki page created for a set of release notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPage {
    pub id: String,
    pub r#type: String,
    pub status: String,
    pub title: String,
}

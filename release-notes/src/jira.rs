//! Jira issue gateway.

use crate::context::RequestContext;
use crate::errors::{ReleaseNotesError, Result, Upstream};
use crate::types::{Issue, IssueKey, LooseField};
use crate::upstream::{endpoint, read_json};
use async_trait::async_trait;
use indexmap::IndexSet;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn fetch_issue(&self, ctx: &RequestContext, key: &IssueKey) -> Result<Issue>;
}

/// Drops repeated keys, keeping the first occurrence of each.
pub fn unique(keys: &[IssueKey]) -> Vec<IssueKey> {
    keys.iter().cloned().collect::<IndexSet<_>>().into_iter().collect()
}

/// Fetches every distinct issue in `keys`, one after the other.
///
/// Stops at the first failure; no partial result is returned.
pub async fn fetch_unique_issues<S>(
    source: &S,
    ctx: &RequestContext,
    keys: &[IssueKey],
) -> Result<Vec<Issue>>
where
    S: IssueSource + ?Sized,
{
    let keys = unique(keys);
    let mut issues = Vec::with_capacity(keys.len());

    for key in &keys {
        issues.push(source.fetch_issue(ctx, key).await?);
    }

    Ok(issues)
}

pub struct JiraClient {
    client: reqwest::Client,
    base: Url,
    user: String,
    api_key: SecretString,
    release_notes_field: String,
}

impl JiraClient {
    pub fn new(
        client: reqwest::Client,
        base: Url,
        user: impl Into<String>,
        api_key: SecretString,
        release_notes_field: impl Into<String>,
    ) -> Self {
        JiraClient {
            client,
            base,
            user: user.into(),
            api_key,
            release_notes_field: release_notes_field.into(),
        }
    }
}

#[async_trait]
impl IssueSource for JiraClient {
    async fn fetch_issue(&self, ctx: &RequestContext, key: &IssueKey) -> Result<Issue> {
        let url = endpoint(Upstream::Jira, &self.base, &["issue", key.as_str()])?;
        tracing::debug!(request_id = %ctx, %url, "calling Jira");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(self.api_key.expose_secret()))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(ReleaseNotesError::transport(Upstream::Jira))?;

        let issue: JiraIssue = read_json(Upstream::Jira, response).await?;
        Ok(issue.into_issue(&self.release_notes_field))
    }
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    issuetype: IssueType,
    // Custom fields are named per Jira site, so they are kept by name.
    #[serde(flatten)]
    other: HashMap<String, LooseField>,
}

#[derive(Debug, Default, Deserialize)]
struct IssueType {
    #[serde(default)]
    name: String,
}

impl JiraIssue {
    fn into_issue(mut self, release_notes_field: &str) -> Issue {
        let release_notes = self
            .fields
            .other
            .remove(release_notes_field)
            .and_then(|field| field.as_text().map(str::to_string))
            .unwrap_or_default();

        Issue {
            key: IssueKey::new(self.key),
            issue_type: self.fields.issuetype.name,
            release_notes,
        }
    }
}

//! GoCD pipeline gateway.

use crate::context::RequestContext;
use crate::errors::{ReleaseNotesError, Result, Upstream};
use crate::keys::find_issue_keys;
use crate::types::{IssueKey, LooseField, MaterialChange, PipelineComparison, PipelineRun, Revision};
use crate::upstream::{endpoint, read_json};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

const HISTORY_MEDIA_TYPE: &str = "application/vnd.go.cd.v1+json";
const COMPARE_MEDIA_TYPE: &str = "application/vnd.go.cd.v2+json";

/// Source of pipeline runs and the changes between them.
#[async_trait]
pub trait PipelineSource: Send + Sync {
    /// Metadata of run `counter` of `pipeline`.
    async fn run_metadata(
        &self,
        ctx: &RequestContext,
        pipeline: &str,
        counter: u64,
    ) -> Result<PipelineRun>;

    /// Changes between run `counter - 1` and run `counter` of `pipeline`.
    async fn run_comparison(
        &self,
        ctx: &RequestContext,
        pipeline: &str,
        counter: u64,
    ) -> Result<PipelineComparison>;
}

/// Issue keys referenced by the commits of a comparison, in change then
/// revision order. Duplicates are kept.
pub fn derive_issue_keys(comparison: &PipelineComparison) -> Vec<IssueKey> {
    comparison
        .changes
        .iter()
        .flat_map(|change| &change.revisions)
        .filter(|revision| !revision.commit_message.is_empty())
        .flat_map(|revision| find_issue_keys(&revision.commit_message))
        .collect()
}

pub struct GocdClient {
    client: reqwest::Client,
    base: Url,
    api_key: SecretString,
}

impl GocdClient {
    pub fn new(client: reqwest::Client, base: Url, api_key: SecretString) -> Self {
        GocdClient {
            client,
            base,
            api_key,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        url: Url,
        media_type: &'static str,
    ) -> Result<T> {
        tracing::debug!(request_id = %ctx, %url, "calling GoCD");

        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .header(ACCEPT, media_type)
            .send()
            .await
            .map_err(ReleaseNotesError::transport(Upstream::Gocd))?;

        read_json(Upstream::Gocd, response).await
    }
}

#[async_trait]
impl PipelineSource for GocdClient {
    async fn run_metadata(
        &self,
        ctx: &RequestContext,
        pipeline: &str,
        counter: u64,
    ) -> Result<PipelineRun> {
        let url = endpoint(
            Upstream::Gocd,
            &self.base,
            &["pipelines", pipeline, &counter.to_string()],
        )?;
        let history: PipelineHistory = self.get(ctx, url, HISTORY_MEDIA_TYPE).await?;
        Ok(history.into())
    }

    async fn run_comparison(
        &self,
        ctx: &RequestContext,
        pipeline: &str,
        counter: u64,
    ) -> Result<PipelineComparison> {
        let from = counter.saturating_sub(1).to_string();
        let to = counter.to_string();
        let url = endpoint(
            Upstream::Gocd,
            &self.base,
            &["pipelines", pipeline, "compare", &from, &to],
        )?;
        let comparison: Comparison = self.get(ctx, url, COMPARE_MEDIA_TYPE).await?;
        Ok(comparison.into())
    }
}

// Wire format. Only the fields the pipeline reads are modelled; everything
// else in the GoCD payloads is ignored.

#[derive(Debug, Deserialize)]
struct PipelineHistory {
    name: String,
    counter: u64,
    label: String,
    scheduled_date: i64,
    #[serde(default)]
    comment: LooseField,
}

impl From<PipelineHistory> for PipelineRun {
    fn from(history: PipelineHistory) -> Self {
        PipelineRun {
            name: history.name,
            counter: history.counter,
            label: history.label,
            scheduled_date: history.scheduled_date,
            comment: history.comment.as_text().map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Comparison {
    pipeline_name: String,
    from_counter: u64,
    to_counter: u64,
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    material: Material,
    #[serde(default, rename = "revision")]
    revisions: Vec<ChangeRevision>,
}

#[derive(Debug, Deserialize)]
struct Material {
    #[serde(rename = "type")]
    material_type: String,
    #[serde(default)]
    attributes: MaterialAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct MaterialAttributes {
    #[serde(default)]
    name: LooseField,
}

/// Git revisions carry `revision_sha` and a commit message, dependency
/// revisions only carry `revision`.
#[derive(Debug, Deserialize)]
struct ChangeRevision {
    #[serde(default)]
    revision_sha: LooseField,
    #[serde(default)]
    revision: LooseField,
    #[serde(default)]
    modified_by: LooseField,
    #[serde(default)]
    commit_message: LooseField,
}

impl From<Comparison> for PipelineComparison {
    fn from(comparison: Comparison) -> Self {
        PipelineComparison {
            pipeline_name: comparison.pipeline_name,
            from_counter: comparison.from_counter,
            to_counter: comparison.to_counter,
            changes: comparison.changes.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Change> for MaterialChange {
    fn from(change: Change) -> Self {
        MaterialChange {
            material_type: change.material.material_type,
            material_name: text(&change.material.attributes.name),
            revisions: change.revisions.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ChangeRevision> for Revision {
    fn from(revision: ChangeRevision) -> Self {
        let id = revision
            .revision_sha
            .as_text()
            .or(revision.revision.as_text())
            .unwrap_or_default();

        Revision {
            revision: id.to_string(),
            modified_by: text(&revision.modified_by),
            commit_message: text(&revision.commit_message),
        }
    }
}

fn text(field: &LooseField) -> String {
    field.as_text().unwrap_or_default().to_string()
}

//! Sequences the gateways for one pipeline run.

use crate::config::Config;
use crate::confluence::{ConfluenceClient, NotesPublisher};
use crate::context::RequestContext;
use crate::errors::{ReleaseNotesError, Result};
use crate::gocd::{GocdClient, PipelineSource, derive_issue_keys};
use crate::jira::{IssueSource, JiraClient, fetch_unique_issues};
use crate::metrics_defs::{ISSUES_FETCHED, PUBLISH_FAILURES};
use crate::notes::extract_release_notes;
use crate::types::{Notes, PublishedPage};
use crate::upstream::build_client;
use shared::{counter, histogram};
use url::form_urlencoded;

/// Validated request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub title: String,
    pub pipeline: String,
    pub counter: u64,
}

impl QueryParams {
    pub fn new(title: impl Into<String>, pipeline: impl Into<String>, counter: u64) -> Self {
        QueryParams {
            title: title.into(),
            pipeline: pipeline.into(),
            counter,
        }
    }

    /// Parses `title`, `pipeline` and `counter` out of a URL query string.
    /// When a parameter is repeated the first value wins.
    pub fn from_query(query: Option<&str>) -> Result<Self> {
        let mut title = None;
        let mut pipeline = None;
        let mut counter = None;

        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "title" => &mut title,
                "pipeline" => &mut pipeline,
                "counter" => &mut counter,
                _ => continue,
            };
            slot.get_or_insert(value.into_owned());
        }

        let title = title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| bad_request("set title in query string"))?;
        let pipeline = pipeline
            .filter(|p| !p.is_empty())
            .ok_or_else(|| bad_request("set pipeline in query string"))?;
        let counter: u64 = counter
            .unwrap_or_default()
            .parse()
            .map_err(|_| bad_request("could not process counter"))?;
        if counter == 0 {
            return Err(bad_request("set counter in query string"));
        }

        Ok(QueryParams {
            title,
            pipeline,
            counter,
        })
    }
}

fn bad_request(message: &str) -> ReleaseNotesError {
    ReleaseNotesError::BadRequest(message.to_string())
}

/// How a pipeline execution ended, short of an error.
#[derive(Debug)]
pub enum Outcome {
    /// No commit in the run references an issue.
    NoIssues,
    /// Issues were found but none carries release notes.
    NoNotes,
    Published { notes: Notes, page: PublishedPage },
    /// Notes were built but could not be published.
    PublishFailed {
        notes: Notes,
        error: ReleaseNotesError,
    },
}

impl Outcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Outcome::NoIssues => "no_issues",
            Outcome::NoNotes => "no_notes",
            Outcome::Published { .. } => "published",
            Outcome::PublishFailed { .. } => "publish_failed",
        }
    }

    pub fn notes(&self) -> Option<&Notes> {
        match self {
            Outcome::NoIssues | Outcome::NoNotes => None,
            Outcome::Published { notes, .. } | Outcome::PublishFailed { notes, .. } => Some(notes),
        }
    }
}

pub struct ReleaseNotes {
    pipelines: Box<dyn PipelineSource>,
    issues: Box<dyn IssueSource>,
    publisher: Box<dyn NotesPublisher>,
}

impl ReleaseNotes {
    pub fn new(
        pipelines: Box<dyn PipelineSource>,
        issues: Box<dyn IssueSource>,
        publisher: Box<dyn NotesPublisher>,
    ) -> Self {
        ReleaseNotes {
            pipelines,
            issues,
            publisher,
        }
    }

    /// Wires the GoCD, Jira and Confluence clients around one shared HTTP
    /// client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(config).map_err(ReleaseNotesError::Client)?;

        let gocd = GocdClient::new(client.clone(), config.gocd.url.clone(), config.gocd_api_key()?);
        let jira = JiraClient::new(
            client.clone(),
            config.jira.url.clone(),
            config.jira.user.clone(),
            config.jira_api_key()?,
            config.jira.release_notes_field.clone(),
        );
        let confluence = ConfluenceClient::new(
            client,
            config.confluence.url.clone(),
            config.confluence_user(),
            config.confluence_api_key()?,
            config.confluence.space_key.clone(),
            config.confluence.convert_format.clone(),
        );

        Ok(Self::new(Box::new(gocd), Box::new(jira), Box::new(confluence)))
    }

    /// Builds and publishes the release notes of one pipeline run.
    pub async fn create(&self, ctx: &RequestContext, params: &QueryParams) -> Result<Outcome> {
        let QueryParams {
            title,
            pipeline,
            counter,
        } = params;
        tracing::info!(%title, %pipeline, counter, "creating release notes");

        let run = self.pipelines.run_metadata(ctx, pipeline, *counter).await?;
        let comparison = self.pipelines.run_comparison(ctx, pipeline, *counter).await?;

        let keys = derive_issue_keys(&comparison);
        let issues = fetch_unique_issues(self.issues.as_ref(), ctx, &keys).await?;
        histogram!(ISSUES_FETCHED).record(issues.len() as f64);
        if issues.is_empty() {
            tracing::info!("no issues referenced by the pipeline run");
            return Ok(Outcome::NoIssues);
        }

        let notes = extract_release_notes(&issues);
        if notes.is_empty() {
            tracing::info!(issues = issues.len(), "no issue carries release notes");
            return Ok(Outcome::NoNotes);
        }

        match self
            .publisher
            .publish(ctx, &run, title, pipeline, &notes)
            .await
        {
            Ok(page) => Ok(Outcome::Published { notes, page }),
            Err(error) => {
                tracing::error!(error = %error, "failed to publish release notes");
                counter!(PUBLISH_FAILURES).increment(1);
                Ok(Outcome::PublishFailed { notes, error })
            }
        }
    }
}

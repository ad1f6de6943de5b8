//! Confluence publisher.
//!
//! Notes are rendered as wiki markup, converted by Confluence into the
//! configured representation, then posted as a blog post.

use crate::context::RequestContext;
use crate::errors::{ReleaseNotesError, Result, Upstream};
use crate::types::{Notes, PipelineRun, PublishedPage};
use crate::upstream::{UpstreamBody, endpoint, parse_json, read_body};
use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use url::Url;

#[async_trait]
pub trait NotesPublisher: Send + Sync {
    /// Publishes `notes` for `run` and returns the created page.
    async fn publish(
        &self,
        ctx: &RequestContext,
        run: &PipelineRun,
        title: &str,
        pipeline: &str,
        notes: &Notes,
    ) -> Result<PublishedPage>;
}

/// Renders notes as wiki markup: one `h1.` heading per group followed by its
/// bullets, one per line.
pub fn render_wiki_markup(notes: &Notes) -> String {
    let mut markup = String::new();
    for (name, bullets) in notes.iter() {
        let _ = write!(markup, "\nh1. {name}\n");
        for bullet in bullets {
            markup.push_str(bullet);
            markup.push('\n');
        }
    }
    markup
}

pub fn page_title(title: &str, version: &str, day: NaiveDate) -> String {
    format!("{title} Release Notes {version} - {}", day.format("%Y-%m-%d"))
}

pub struct ConfluenceClient {
    client: reqwest::Client,
    base: Url,
    user: String,
    api_key: SecretString,
    space_key: String,
    convert_format: String,
}

impl ConfluenceClient {
    pub fn new(
        client: reqwest::Client,
        base: Url,
        user: impl Into<String>,
        api_key: SecretString,
        space_key: impl Into<String>,
        convert_format: impl Into<String>,
    ) -> Self {
        ConfluenceClient {
            client,
            base,
            user: user.into(),
            api_key,
            space_key: space_key.into(),
            convert_format: convert_format.into(),
        }
    }

    async fn post<B, T>(&self, ctx: &RequestContext, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = endpoint(Upstream::Confluence, &self.base, segments)?;
        tracing::debug!(request_id = %ctx, %url, "calling Confluence");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.user, Some(self.api_key.expose_secret()))
            .json(body)
            .send()
            .await
            .map_err(ReleaseNotesError::transport(Upstream::Confluence))?;

        let UpstreamBody { status, bytes } = read_body(Upstream::Confluence, response).await?;
        if !status.is_success() {
            return Err(ReleaseNotesError::PublishFailed {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        parse_json(Upstream::Confluence, &bytes)
    }

    /// Converts wiki markup into the configured representation.
    async fn convert(&self, ctx: &RequestContext, markup: String) -> Result<String> {
        let request = Storage {
            value: markup,
            representation: "wiki".into(),
        };
        let converted: Storage = self
            .post(
                ctx,
                &["contentbody", "convert", &self.convert_format],
                &request,
            )
            .await?;
        Ok(converted.value)
    }
}

#[async_trait]
impl NotesPublisher for ConfluenceClient {
    async fn publish(
        &self,
        ctx: &RequestContext,
        run: &PipelineRun,
        title: &str,
        pipeline: &str,
        notes: &Notes,
    ) -> Result<PublishedPage> {
        let day = run.scheduled_day().ok_or_else(|| {
            ReleaseNotesError::malformed(
                Upstream::Gocd,
                format!("scheduled_date {} is out of range", run.scheduled_date),
            )
        })?;

        let content = self.convert(ctx, render_wiki_markup(notes)).await?;

        let post = BlogPost {
            r#type: "blogpost",
            space: Space {
                key: &self.space_key,
            },
            status: "current",
            title: page_title(title, &run.label, day),
            body: Body {
                storage: Storage {
                    value: content,
                    representation: self.convert_format.clone(),
                },
            },
            metadata: Metadata {
                labels: vec![Label { name: pipeline }],
            },
        };

        let page: PublishedPage = self.post(ctx, &["content", ""], &post).await?;
        tracing::info!(request_id = %ctx, page_id = %page.id, title = %page.title, "published release notes");
        Ok(page)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Storage {
    value: String,
    representation: String,
}

#[derive(Debug, Serialize)]
struct BlogPost<'a> {
    r#type: &'static str,
    space: Space<'a>,
    status: &'static str,
    title: String,
    body: Body,
    metadata: Metadata<'a>,
}

#[derive(Debug, Serialize)]
struct Space<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct Body {
    storage: Storage,
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    labels: Vec<Label<'a>>,
}

#[derive(Debug, Serialize)]
struct Label<'a> {
    name: &'a str,
}

//! Plumbing shared by the GoCD, Jira and Confluence clients.

use crate::config::Config;
use crate::errors::{ReleaseNotesError, Upstream};
use hyper::body::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("release-notes/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by all upstream calls.
///
/// The client is immutable once built and is reused across requests.
pub fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(config.accept_invalid_certs);

    if let Some(secs) = config.upstream_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build()
}

/// Appends path segments to `base`, percent-encoding each of them.
pub(crate) fn endpoint(
    upstream: Upstream,
    base: &Url,
    segments: &[&str],
) -> Result<Url, ReleaseNotesError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ReleaseNotesError::InvalidEndpoint {
            upstream,
            reason: format!("{base} cannot be used as a base URL"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Status and fully read body of an upstream response.
pub(crate) struct UpstreamBody {
    pub status: StatusCode,
    pub bytes: Bytes,
}

impl UpstreamBody {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Reads the body of a response, failing early on auth rejections.
pub(crate) async fn read_body(
    upstream: Upstream,
    response: reqwest::Response,
) -> Result<UpstreamBody, ReleaseNotesError> {
    let status = response.status();
    if is_auth_rejection(status) {
        return Err(ReleaseNotesError::Unauthorized {
            upstream,
            status: status.as_u16(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(ReleaseNotesError::transport(upstream))?;

    Ok(UpstreamBody { status, bytes })
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    upstream: Upstream,
    body: &[u8],
) -> Result<T, ReleaseNotesError> {
    serde_json::from_slice(body).map_err(|e| ReleaseNotesError::malformed(upstream, e.to_string()))
}

/// Decodes a successful JSON response. Non-success statuses other than auth
/// rejections become `UnexpectedStatus`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    upstream: Upstream,
    response: reqwest::Response,
) -> Result<T, ReleaseNotesError> {
    let body = read_body(upstream, response).await?;
    if !body.status.is_success() {
        return Err(ReleaseNotesError::UnexpectedStatus {
            upstream,
            status: body.status.as_u16(),
            body: body.text(),
        });
    }
    parse_json(upstream, &body.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_segments() {
        let base = Url::parse("https://gocd.example.com/go/api/").unwrap();
        let url = endpoint(Upstream::Gocd, &base, &["pipelines", "web", "614"]).unwrap();
        assert_eq!(url.as_str(), "https://gocd.example.com/go/api/pipelines/web/614");

        let base = Url::parse("https://gocd.example.com/go/api").unwrap();
        let url = endpoint(Upstream::Gocd, &base, &["pipelines", "web", "614"]).unwrap();
        assert_eq!(url.as_str(), "https://gocd.example.com/go/api/pipelines/web/614");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("https://gocd.example.com/go/api").unwrap();
        let url = endpoint(Upstream::Gocd, &base, &["pipelines", "a b/c", "1"]).unwrap();
        assert_eq!(url.path(), "/go/api/pipelines/a%20b%2Fc/1");
    }

    #[test]
    fn test_endpoint_keeps_trailing_slash() {
        let base = Url::parse("https://example.atlassian.net/wiki/rest/api").unwrap();
        let url = endpoint(Upstream::Confluence, &base, &["content", ""]).unwrap();
        assert_eq!(url.path(), "/wiki/rest/api/content/");
    }

    #[test]
    fn test_endpoint_rejects_non_base_urls() {
        let base = Url::parse("mailto:ops@example.com").unwrap();
        let err = endpoint(Upstream::Jira, &base, &["issue", "JI-1"]).unwrap_err();
        assert!(matches!(
            err,
            ReleaseNotesError::InvalidEndpoint {
                upstream: Upstream::Jira,
                ..
            }
        ));
    }

    #[test]
    fn test_auth_rejection_statuses() {
        assert!(is_auth_rejection(StatusCode::UNAUTHORIZED));
        assert!(is_auth_rejection(StatusCode::FORBIDDEN));
        assert!(!is_auth_rejection(StatusCode::NOT_FOUND));
        assert!(!is_auth_rejection(StatusCode::OK));
    }
}

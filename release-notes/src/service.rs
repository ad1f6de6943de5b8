use crate::context::RequestContext;
use crate::errors::ReleaseNotesError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS, REQUESTS_INFLIGHT};
use crate::orchestrator::{Outcome, QueryParams, ReleaseNotes};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::header::HeaderValue;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::http::{make_boxed_empty_response, make_boxed_error_response, make_boxed_response};
use shared::{counter, gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const PUBLISH_ERROR_HEADER: &str = "x-publish-error";

type ServiceResponse = Response<BoxBody<Bytes, ReleaseNotesError>>;

/// Serves `GET ?title=..&pipeline=..&counter=..` on any path.
#[derive(Clone)]
pub struct ReleaseNotesService {
    release_notes: Arc<ReleaseNotes>,
}

impl ReleaseNotesService {
    pub fn new(release_notes: ReleaseNotes) -> Self {
        ReleaseNotesService {
            release_notes: Arc::new(release_notes),
        }
    }
}

impl<B> Service<Request<B>> for ReleaseNotesService {
    type Response = ServiceResponse;
    type Error = ReleaseNotesError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let release_notes = self.release_notes.clone();
        let method = req.method().clone();
        let query = req.uri().query().map(str::to_string);

        Box::pin(async move { Ok(handle(&release_notes, &method, query.as_deref()).await) })
    }
}

async fn handle(release_notes: &ReleaseNotes, method: &Method, query: Option<&str>) -> ServiceResponse {
    let ctx = RequestContext::new();
    let start = Instant::now();
    gauge!(REQUESTS_INFLIGHT).increment(1.0);

    let (outcome, mut response) = respond(release_notes, &ctx, method, query)
        .instrument(ctx.span())
        .await;

    gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    histogram!(REQUEST_DURATION, "status" => response.status().as_str().to_string())
        .record(start.elapsed().as_secs_f64());
    counter!(REQUESTS, "outcome" => outcome).increment(1);

    if let Ok(value) = HeaderValue::from_str(&ctx.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Runs the pipeline and maps its result onto a response, along with the
/// outcome label used for metrics.
async fn respond(
    release_notes: &ReleaseNotes,
    ctx: &RequestContext,
    method: &Method,
    query: Option<&str>,
) -> (&'static str, ServiceResponse) {
    if method != Method::GET {
        return (
            "not_implemented",
            make_boxed_empty_response(StatusCode::NOT_IMPLEMENTED),
        );
    }

    let result = match QueryParams::from_query(query) {
        Ok(params) => release_notes.create(ctx, &params).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(Outcome::NoIssues) => ("no_issues", make_boxed_empty_response(StatusCode::NO_CONTENT)),
        Ok(Outcome::NoNotes) => ("no_notes", make_boxed_empty_response(StatusCode::NO_CONTENT)),
        Ok(Outcome::Published { notes, page }) => {
            tracing::info!(page_id = %page.id, groups = notes.len(), "release notes created");
            ("published", json_response(StatusCode::OK, &notes))
        }
        Ok(Outcome::PublishFailed { notes, error }) => {
            let mut response = json_response(StatusCode::BAD_GATEWAY, &notes);
            response
                .headers_mut()
                .insert(PUBLISH_ERROR_HEADER, header_safe(&error.to_string()));
            ("publish_failed", response)
        }
        Err(e @ ReleaseNotesError::BadRequest(_)) => {
            tracing::info!(error = %e, "rejected request");
            ("bad_request", text_response(StatusCode::BAD_REQUEST, &e))
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to create release notes");
            ("error", text_response(StatusCode::BAD_REQUEST, &e))
        }
    }
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> ServiceResponse {
    match serde_json::to_vec(value) {
        Ok(body) => make_boxed_response(status, "application/json", body),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn text_response(status: StatusCode, error: &ReleaseNotesError) -> ServiceResponse {
    make_boxed_response(status, "text/plain; charset=utf-8", error.to_string())
}

// Header values only allow visible ASCII.
fn header_safe(message: &str) -> HeaderValue {
    let sanitized: String = message
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { ' ' })
        .collect();
    HeaderValue::from_str(&sanitized).unwrap_or_else(|_| HeaderValue::from_static("publish failed"))
}

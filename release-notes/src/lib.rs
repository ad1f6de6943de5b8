pub mod config;
pub mod confluence;
pub mod context;
pub mod errors;
pub mod gocd;
pub mod jira;
pub mod keys;
pub mod metrics_defs;
pub mod notes;
pub mod orchestrator;
pub mod service;
pub mod types;
pub mod upstream;

#[cfg(test)]
mod testutils;

use crate::context::RequestContext;
use crate::errors::ReleaseNotesError;
use crate::orchestrator::{Outcome, QueryParams, ReleaseNotes};
use crate::service::ReleaseNotesService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use tracing::Instrument;

/// Serves release notes requests and the admin endpoints until either
/// listener fails.
pub async fn run(config: config::Config) -> Result<(), ReleaseNotesError> {
    let release_notes = ReleaseNotes::from_config(&config)?;
    let service = ReleaseNotesService::new(release_notes);
    let admin_service = AdminService::<_, ReleaseNotesError>::new(|| true);

    let service_task = run_http_service(&config.listener.host, config.listener.port, service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(service_task, admin_task)?;
    Ok(())
}

/// Runs the pipeline once, outside of the HTTP service.
pub async fn generate(
    config: &config::Config,
    params: &QueryParams,
) -> Result<Outcome, ReleaseNotesError> {
    let release_notes = ReleaseNotes::from_config(config)?;
    let ctx = RequestContext::new();
    release_notes
        .create(&ctx, params)
        .instrument(ctx.span())
        .await
}

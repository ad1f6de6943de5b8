mod config;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use release_notes::errors::ReleaseNotesError;
use release_notes::metrics_defs::ALL_METRICS;
use release_notes::orchestrator::{Outcome, QueryParams};
use serde_json::json;
use shared::describe_metrics;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relnotes", version, about = "Release notes from GoCD, Jira and Confluence")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve release notes requests over HTTP
    Serve(ConfigArgs),
    /// Build and publish the release notes of one pipeline run
    Generate {
        #[command(flatten)]
        config: ConfigArgs,
        /// Project title used in the page title
        #[arg(long)]
        title: String,
        #[arg(long)]
        pipeline: String,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        counter: u64,
    },
}

impl CliCommand {
    fn config_file(&self) -> &PathBuf {
        match self {
            CliCommand::Serve(args) => &args.config_file,
            CliCommand::Generate { config, .. } => &config.config_file,
        }
    }
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config_file: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    ReleaseNotes(#[from] ReleaseNotesError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not serialize outcome: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "relnotes failed");
            eprintln!("relnotes: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = Config::from_file(cli.command.config_file())?;

    let _sentry = init_logging(config.common.logging.as_ref());
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        CliCommand::Serve(_) => {
            tracing::info!("starting release notes service");
            runtime.block_on(release_notes::run(config.release_notes))?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Generate {
            title,
            pipeline,
            counter,
            ..
        } => {
            let params = QueryParams::new(title, pipeline, counter);
            let outcome =
                runtime.block_on(release_notes::generate(&config.release_notes, &params))?;

            println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
            match outcome {
                Outcome::PublishFailed { .. } => Ok(ExitCode::FAILURE),
                _ => Ok(ExitCode::SUCCESS),
            }
        }
    }
}

fn outcome_json(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::NoIssues | Outcome::NoNotes => json!({"outcome": outcome.as_str()}),
        Outcome::Published { notes, page } => json!({
            "outcome": outcome.as_str(),
            "notes": notes,
            "page": page,
        }),
        Outcome::PublishFailed { notes, error } => json!({
            "outcome": outcome.as_str(),
            "notes": notes,
            "error": error.to_string(),
        }),
    }
}

/// Installs the fmt subscriber, plus the Sentry layer when a DSN is
/// configured. The returned guard flushes Sentry on drop.
fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().with_target(false).with_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            ),
        )
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some("relnotes"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    describe_metrics!(ALL_METRICS);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use release_notes::types::{Notes, PublishedPage};

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_generate() {
        let cli = Cli::try_parse_from([
            "relnotes",
            "generate",
            "--config-file",
            "config.yaml",
            "--title",
            "Our Project",
            "--pipeline",
            "our-pipeline",
            "--counter",
            "390",
        ])
        .unwrap();

        assert_eq!(cli.command.config_file(), &PathBuf::from("config.yaml"));
        match cli.command {
            CliCommand::Generate {
                title,
                pipeline,
                counter,
                ..
            } => {
                assert_eq!(title, "Our Project");
                assert_eq!(pipeline, "our-pipeline");
                assert_eq!(counter, 390);
            }
            CliCommand::Serve(_) => panic!("expected generate"),
        }
    }

    #[test]
    fn counter_must_be_positive() {
        let result = Cli::try_parse_from([
            "relnotes",
            "generate",
            "--config-file",
            "config.yaml",
            "--title",
            "Our Project",
            "--pipeline",
            "our-pipeline",
            "--counter",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn outcome_as_json() {
        assert_eq!(
            outcome_json(&Outcome::NoNotes),
            json!({"outcome": "no_notes"})
        );

        let notes: Notes = [("Changes", vec!["* one"])].into_iter().collect();
        let page = PublishedPage {
            id: "1".into(),
            r#type: "blogpost".into(),
            status: "current".into(),
            title: "Our Project Release Notes 1.4.0 - 2021-03-10".into(),
        };
        assert_eq!(
            outcome_json(&Outcome::Published { notes, page }),
            json!({
                "outcome": "published",
                "notes": {"Changes": ["* one"]},
                "page": {
                    "id": "1",
                    "type": "blogpost",
                    "status": "current",
                    "title": "Our Project Release Notes 1.4.0 - 2021-03-10"
                }
            })
        );
    }
}

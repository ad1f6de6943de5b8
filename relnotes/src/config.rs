use release_notes::config::{Config as ReleaseNotesConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub release_notes: ReleaseNotesConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.release_notes.validate()?;

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    const RELEASE_NOTES_YAML: &str = r#"
            release_notes:
                listener:
                    host: 0.0.0.0
                    port: 8080
                gocd:
                    url: https://gocd.example.com/go/api
                    api_key: gocd-token
                jira:
                    url: https://example.atlassian.net/rest/agile/latest
                    user: bot@example.com
                    api_key: jira-token
                confluence:
                    url: https://example.atlassian.net/wiki/rest/api
                    space_key: RN
            "#;

    #[test]
    fn release_notes_config() {
        let tmp = write_tmp_file(RELEASE_NOTES_YAML);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.common.metrics.is_none());
        assert!(config.common.logging.is_none());
        let release_notes = config.release_notes;
        assert_eq!(release_notes.listener.port, 8080);
        assert_eq!(release_notes.confluence.space_key, "RN");
        assert_eq!(
            release_notes.gocd.url.as_str(),
            "https://gocd.example.com/go/api"
        );
    }

    #[test]
    fn common_config() {
        let yaml = format!(
            r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://public@sentry.example.com/1
            {}"#,
            RELEASE_NOTES_YAML.trim_start()
        );
        let tmp = write_tmp_file(&yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_host, "127.0.0.1");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(
            config.common.logging.expect("logging config").sentry_dsn,
            "https://public@sentry.example.com/1"
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let tmp = write_tmp_file(&RELEASE_NOTES_YAML.replace("port: 8080", "port: 0"));
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ValidationError(ValidationError::InvalidPort))
        ));
    }

    #[test]
    fn missing_section_is_a_parse_error() {
        let tmp = write_tmp_file("metrics:\n    statsd_host: 127.0.0.1\n    statsd_port: 8125\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::from_file(&dir.path().join("missing.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}

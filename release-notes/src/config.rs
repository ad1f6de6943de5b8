use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Secret file names looked up in `secrets_dirs`.
pub const GOCD_API_KEY_SECRET: &str = "gocdapikey";
pub const JIRA_API_KEY_SECRET: &str = "jiraapikey";
pub const CONFLUENCE_API_KEY_SECRET: &str = "confluenceapikey";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("{0} URL cannot be used as a base URL")]
    InvalidBaseUrl(&'static str),

    #[error("Empty {0}")]
    EmptyField(&'static str),

    #[error("Secret {0} is neither configured nor present in a secrets directory")]
    MissingSecret(&'static str),

    #[error("Could not read secret {name}: {source}")]
    UnreadableSecret {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Release notes service configuration
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Listener for release notes requests
    #[serde(default)]
    pub listener: Listener,
    /// Listener for `/health` and `/ready`
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    /// Transport level deadline applied to every upstream call
    pub upstream_timeout_secs: Option<u64>,
    /// Skip TLS certificate verification for upstream calls
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Directories searched for secret files, in order
    #[serde(default = "default_secrets_dirs")]
    pub secrets_dirs: Vec<PathBuf>,
    pub gocd: GocdConfig,
    pub jira: JiraConfig,
    pub confluence: ConfluenceConfig,
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        for (name, url) in [
            ("GoCD", &self.gocd.url),
            ("Jira", &self.jira.url),
            ("Confluence", &self.confluence.url),
        ] {
            if url.cannot_be_a_base() {
                return Err(ValidationError::InvalidBaseUrl(name));
            }
        }

        if self.jira.user.is_empty() {
            return Err(ValidationError::EmptyField("jira user"));
        }
        if self.jira.release_notes_field.is_empty() {
            return Err(ValidationError::EmptyField("jira release notes field"));
        }
        if self.confluence.space_key.is_empty() {
            return Err(ValidationError::EmptyField("confluence space key"));
        }
        if self.confluence.convert_format.is_empty() {
            return Err(ValidationError::EmptyField("confluence convert format"));
        }

        Ok(())
    }

    /// Resolves a secret from the secrets directories, falling back to the
    /// value given inline in the config.
    pub fn secret(
        &self,
        name: &'static str,
        inline: Option<&SecretString>,
    ) -> Result<SecretString, ValidationError> {
        for dir in &self.secrets_dirs {
            match std::fs::read_to_string(dir.join(name)) {
                Ok(contents) => return Ok(SecretString::from(contents.trim().to_string())),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(ValidationError::UnreadableSecret { name, source }),
            }
        }

        inline.cloned().ok_or(ValidationError::MissingSecret(name))
    }

    pub fn gocd_api_key(&self) -> Result<SecretString, ValidationError> {
        self.secret(GOCD_API_KEY_SECRET, self.gocd.api_key.as_ref())
    }

    pub fn jira_api_key(&self) -> Result<SecretString, ValidationError> {
        self.secret(JIRA_API_KEY_SECRET, self.jira.api_key.as_ref())
    }

    /// Confluence shares the Jira credentials unless configured otherwise.
    pub fn confluence_api_key(&self) -> Result<SecretString, ValidationError> {
        match self.secret(CONFLUENCE_API_KEY_SECRET, self.confluence.api_key.as_ref()) {
            Err(ValidationError::MissingSecret(_)) => self.jira_api_key(),
            other => other,
        }
    }

    pub fn confluence_user(&self) -> &str {
        self.confluence.user.as_deref().unwrap_or(&self.jira.user)
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 8081,
    }
}

fn default_secrets_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/var/openfaas/secrets"),
        PathBuf::from("/run/secrets"),
    ]
}

#[derive(Clone, Debug, Deserialize)]
pub struct GocdConfig {
    /// API base, e.g. `https://gocd.example.com/go/api`
    pub url: Url,
    /// Personal access token
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct JiraConfig {
    /// API base, e.g. `https://example.atlassian.net/rest/agile/latest`
    pub url: Url,
    pub user: String,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    /// Custom field holding the release notes text. Differs per Jira site.
    #[serde(default = "default_release_notes_field")]
    pub release_notes_field: String,
}

fn default_release_notes_field() -> String {
    "customfield_10110".into()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConfluenceConfig {
    /// API base, e.g. `https://example.atlassian.net/wiki/rest/api`
    pub url: Url,
    /// Space the release notes blog posts are created in
    pub space_key: String,
    /// Representation wiki markup is converted to before posting
    #[serde(default = "default_convert_format")]
    pub convert_format: String,
    pub user: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
}

fn default_convert_format() -> String {
    "editor2".into()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

use cloudant_client::config::IAM_TOKEN_URL;
use std::env;
use std::fmt;
use thiserror::Error;
use url::Url;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DB_NAME: &str = "cloudant";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} must be a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be an http(s) base URL, got '{value}'")]
    NotABaseUrl { var: &'static str, value: String },
    #[error("{var} must be a valid {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub seed_empty_database: bool,
    pub cloudant: CloudantConfig,
}

#[derive(Clone)]
pub struct CloudantConfig {
    pub api_key: String,
    pub service_url: Url,
    pub db_name: String,
    pub iam_token_url: String,
}

impl fmt::Debug for CloudantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudantConfig")
            .field("api_key", &"<redacted>")
            .field("service_url", &self.service_url.as_str())
            .field("db_name", &self.db_name)
            .field("iam_token_url", &self.iam_token_url)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty
    /// values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("CLOUDANT_API_KEY").ok_or(ConfigError::Missing("CLOUDANT_API_KEY"))?;
        let service_url = var("CLOUDANT_SERVICE_URL")
            .ok_or(ConfigError::Missing("CLOUDANT_SERVICE_URL"))
            .and_then(|raw| parse_base_url("CLOUDANT_SERVICE_URL", &raw))?;
        let iam_token_url = match var("IAM_TOKEN_URL") {
            Some(raw) => parse_url("IAM_TOKEN_URL", &raw)?.to_string(),
            None => IAM_TOKEN_URL.to_string(),
        };

        let port = match var("DOCUMENT_API_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                var: "DOCUMENT_API_PORT",
                expected: "port number",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let seed_empty_database = match var("SEED_EMPTY_DATABASE") {
            Some(raw) => parse_bool("SEED_EMPTY_DATABASE", raw)?,
            None => true,
        };

        Ok(Self {
            host: var("DOCUMENT_API_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            seed_empty_database,
            cloudant: CloudantConfig {
                api_key,
                service_url,
                db_name: var("CLOUDANT_DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
                iam_token_url,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { var, source })
}

/// Document paths are appended to this URL, so it must be able to carry
/// path segments.
fn parse_base_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = parse_url(var, raw)?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::NotABaseUrl {
            var,
            value: raw.trim().to_string(),
        });
    }
    Ok(url)
}

fn parse_bool(var: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            expected: "boolean",
            value: raw,
        }),
    }
}

//! Configuration module for ds-down.
//!
//! Handles reading configuration from the config file and merging it with CLI arguments.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::DsDownArgs;
use crate::credentials::SecretSource;
use crate::error::ConfigError;

/// Default timeout for each network call and the password command.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User configuration from the config file.
#[derive(Debug, Default, Deserialize)]
pub struct DsDownConfig {
    /// Download Station host URL including scheme, for example `https://nas.local:5001`.
    #[serde(default)]
    host: Option<String>,
    /// Account username.
    #[serde(default)]
    username: Option<String>,
    /// Literal account password.
    #[serde(default)]
    password: Option<SecretString>,
    /// Command whose output is the password.
    #[serde(default)]
    passwordeval: Option<String>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    accept_invalid_certs: bool,
    /// Timeout in seconds for network calls and the password command.
    #[serde(default)]
    timeout: Option<u64>,
}

/// Values given on the command line or through the environment that take priority over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub username: Option<String>,
    pub insecure: bool,
    pub timeout: Option<u64>,
}

/// Final config combined from CLI arguments and the config file.
#[derive(Debug)]
pub struct Config {
    /// Download Station base URL.
    pub host: Url,
    /// Account username.
    pub username: String,
    /// Where the password comes from.
    pub secret_source: SecretSource,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
    /// Timeout for each network call and the password command.
    pub timeout: Duration,
    /// Config file that was read.
    pub path: PathBuf,
}

impl DsDownConfig {
    /// Read the user config from the given file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_string = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&config_string)
    }

    /// Parse the user config from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid TOML or has values of the wrong type.
    pub fn from_toml_str(config_string: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<Self>(config_string)?)
    }
}

impl From<&DsDownArgs> for Overrides {
    fn from(args: &DsDownArgs) -> Self {
        Self {
            host: args.host.clone(),
            username: args.username.clone(),
            insecure: args.insecure,
            timeout: args.timeout,
        }
    }
}

impl Config {
    /// Read the config file at `path` and merge it with the given overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the combined config is invalid.
    pub fn resolve(path: Option<PathBuf>, overrides: Overrides) -> Result<Self, ConfigError> {
        let path = path.ok_or(ConfigError::NoConfigPath)?;
        debug!("Using config file: {}", path.display());
        let user_config = DsDownConfig::from_file(&path)?;
        Self::from_parts(user_config, overrides, path)
    }

    /// Validate and combine the user config with the overrides.
    ///
    /// # Errors
    /// Returns an error if a required value is missing or invalid,
    /// or if not exactly one of `password` and `passwordeval` is set.
    pub fn from_parts(user_config: DsDownConfig, overrides: Overrides, path: PathBuf) -> Result<Self, ConfigError> {
        let host = non_empty(overrides.host.or(user_config.host)).ok_or(ConfigError::MissingKey("host"))?;
        let username = non_empty(overrides.username.or(user_config.username)).ok_or(ConfigError::MissingKey("username"))?;

        let secret_source = match (user_config.password, non_empty(user_config.passwordeval)) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingSecret),
            (None, None) => return Err(ConfigError::MissingSecret),
            (Some(password), None) if password.expose_secret().is_empty() => return Err(ConfigError::EmptyPassword),
            (Some(password), None) => SecretSource::Password(password),
            (None, Some(command)) => SecretSource::Command(command),
        };

        let host = parse_host(&host)?;

        let timeout_secs = overrides
            .timeout
            .or(user_config.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let accept_invalid_certs = overrides.insecure || user_config.accept_invalid_certs;
        if accept_invalid_certs {
            warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            host,
            username,
            secret_source,
            accept_invalid_certs,
            timeout: Duration::from_secs(timeout_secs),
            path,
        })
    }
}

/// Parse and check the host URL.
fn parse_host(host: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidHost {
        host: host.to_string(),
        reason,
    };

    let url = Url::parse(host.trim()).map_err(|error| invalid(error.to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" => warn!("Host {url} does not use HTTPS, the password is sent unencrypted"),
        scheme => return Err(invalid(format!("unsupported scheme '{scheme}', expected http or https"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host name".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed".to_string()));
    }

    Ok(url)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

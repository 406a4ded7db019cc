//! Error types for ds-down.
//!
//! Every stage of the run has its own error type,
//! and the top-level [`Error`] maps each of them to a stable process exit code.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Exit code for an unexpected internal error.
pub const EXIT_INTERNAL: u8 = 1;
/// Exit code for configuration errors.
pub const EXIT_CONFIG: u8 = 3;
/// Exit code for password evaluation errors.
pub const EXIT_CREDENTIAL: u8 = 4;
/// Exit code for authentication errors.
pub const EXIT_AUTH: u8 = 5;
/// Exit code for network and protocol errors.
pub const EXIT_TRANSPORT: u8 = 6;
/// Exit code for an invalid download target.
pub const EXIT_VALIDATION: u8 = 7;
/// Exit code for task errors reported by Download Station.
pub const EXIT_SERVICE: u8 = 8;

/// Exit code table shown in the CLI help text.
pub const EXIT_CODE_HELP: &str = "\
Exit codes:
  0  success
  1  unexpected internal error
  2  invalid command line usage
  3  configuration error
  4  credential error
  5  authentication error
  6  transport error
  7  task validation error
  8  Download Station rejected the task";

/// Top-level error for a ds-down run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Credential(_) => EXIT_CREDENTIAL,
            Self::Auth(_) => EXIT_AUTH,
            Self::Transport(_) => EXIT_TRANSPORT,
            Self::Validation(_) => EXIT_VALIDATION,
            Self::Service(_) => EXIT_SERVICE,
            Self::Internal(_) => EXIT_INTERNAL,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(TransportError::from(error))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config file location, use --config or set DS_DOWN_CONFIG")]
    NoConfigPath,

    #[error("Could not open config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file did not contain value for '{0}'")]
    MissingKey(&'static str),

    #[error("Config file must set exactly one of 'password' or 'passwordeval', found both")]
    ConflictingSecret,

    #[error("Config file must set exactly one of 'password' or 'passwordeval', found neither")]
    MissingSecret,

    #[error("Config file value for 'password' is empty")]
    EmptyPassword,

    #[error("Invalid host URL '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Timeout must be at least one second")]
    InvalidTimeout,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Password command is empty")]
    EmptyCommand,

    #[error("Could not run password command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Password command '{program}' failed with {status}{}", format_stderr(.stderr))]
    Failed { program: String, status: String, stderr: String },

    #[error("Password command '{program}' timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("Password command '{0}' produced output that is not valid UTF-8")]
    InvalidOutput(String),

    #[error("Password command '{0}' produced an empty password")]
    EmptyPassword(String),
}

/// Authentication rejected by the service, either at login or for an expired session.
#[derive(Debug, Error)]
#[error("Authentication failed (code {code}): {message}")]
pub struct AuthError {
    pub code: i64,
    pub message: &'static str,
}

impl AuthError {
    /// Create an auth error from a Synology API error code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        Self {
            code,
            message: auth_code_message(code),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Could not connect to host: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("{endpoint} request failed with HTTP status {status}")]
    Status { endpoint: &'static str, status: StatusCode },

    #[error("Invalid {endpoint} response: {reason}")]
    InvalidResponse { endpoint: &'static str, reason: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else if error.is_connect() {
            Self::Connect(error)
        } else {
            Self::Request(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Target is empty")]
    Empty,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("'{path}' is neither a supported URL nor a readable file: {reason}")]
    NotAFile { path: String, reason: String },

    #[error("Could not read file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Task request rejected by Download Station for a reason other than authentication.
#[derive(Debug, Error)]
#[error("Download Station rejected the task (code {code}): {message}")]
pub struct ServiceError {
    pub code: i64,
    pub message: &'static str,
}

impl ServiceError {
    /// Create a service error from a Download Station task API error code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        Self {
            code,
            message: task_code_message(code),
        }
    }
}

/// Session related codes shared by all Synology APIs.
///
/// These mean the session was rejected and are reported as authentication errors.
#[must_use]
pub const fn is_session_error(code: i64) -> bool {
    matches!(code, 105 | 106 | 107 | 119)
}

/// Reason for a `SYNO.API.Auth` error code.
///
/// Codes from the Synology DSM Login Web API guide.
#[must_use]
pub const fn auth_code_message(code: i64) -> &'static str {
    match code {
        400 => "No such account or incorrect password",
        401 => "Account disabled",
        402 => "Permission denied",
        403 => "2-step verification code required",
        404 => "Failed to authenticate 2-step verification code",
        406 => "2-step verification enforced for this account",
        407 => "Blocked IP source",
        408 => "Expired password cannot be changed",
        409 => "Expired password",
        410 => "Password must be changed",
        105 => "Insufficient user privilege",
        106 => "Session timeout",
        107 => "Session interrupted by duplicate login",
        119 => "Session id not found",
        _ => "Unknown authentication error",
    }
}

/// Reason for a `SYNO.DownloadStation.Task` error code.
///
/// Codes from the Synology Download Station Web API guide,
/// falling back to the common codes shared by all APIs.
#[must_use]
pub const fn task_code_message(code: i64) -> &'static str {
    match code {
        400 => "File upload failed",
        401 => "Max number of tasks reached",
        402 => "Destination denied",
        403 => "Destination does not exist",
        404 => "Invalid task id",
        405 => "Invalid task action",
        406 => "No default destination",
        407 => "Set destination failed",
        408 => "File does not exist",
        100 => "Unknown error",
        101 => "Invalid parameter",
        102 => "The requested API does not exist",
        103 => "The requested method does not exist",
        104 => "The requested version does not support the functionality",
        _ => "Unknown task error",
    }
}

fn format_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

//! Password resolution.
//!
//! The password is either stored directly in the config file,
//! or produced by an external command such as a password manager CLI.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::debug;

use crate::error::CredentialError;

/// Where the account password comes from.
#[derive(Debug)]
pub enum SecretSource {
    /// Literal password from the config file.
    Password(SecretString),
    /// Command whose standard output is the password.
    Command(String),
}

impl SecretSource {
    /// Config key that produced this source.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::Command(_) => "passwordeval",
        }
    }
}

/// Get the plaintext password from the given source.
///
/// For a command source, the command is run without a shell and killed if it takes longer than `timeout`.
///
/// # Errors
/// Returns an error if the command cannot be run, fails, times out, or prints an empty password.
pub async fn obtain_secret(source: &SecretSource, timeout: Duration) -> Result<SecretString, CredentialError> {
    match source {
        SecretSource::Password(password) => Ok(password.clone()),
        SecretSource::Command(command) => evaluate_password_command(command, timeout).await,
    }
}

/// Run the password command and return the last line of its output.
async fn evaluate_password_command(command: &str, timeout: Duration) -> Result<SecretString, CredentialError> {
    let mut words = split_command(command).into_iter();
    let program = words.next().ok_or(CredentialError::EmptyCommand)?;
    debug!("Running password command: {program}");

    let child = Command::new(&program)
        .args(words)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CredentialError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Dropping the future on timeout drops the child, which kills it.
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| CredentialError::Timeout {
            program: program.clone(),
            timeout,
        })?
        .map_err(|source| CredentialError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(CredentialError::Failed {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8(output.stdout).map_err(|_| CredentialError::InvalidOutput(program.clone()))?;
    let password = SecretString::from(stdout);
    let last_line = last_output_line(password.expose_secret());
    if last_line.is_empty() {
        return Err(CredentialError::EmptyPassword(program));
    }

    Ok(SecretString::from(last_line))
}

/// Split a command string into words on whitespace, expanding a leading `~` in each word.
fn split_command(command: &str) -> Vec<String> {
    command
        .split_whitespace()
        .map(|word| {
            if word == "~" || word.starts_with("~/") {
                ds_down::path_to_string(&ds_down::config::expand_home(Path::new(word)))
            } else {
                word.to_string()
            }
        })
        .collect()
}

/// Select the last line without line endings.
fn last_output_line(output: &str) -> &str {
    let trimmed = output.trim_end_matches(['\n', '\r']);
    trimmed.rsplit('\n').next().unwrap_or_default().trim_end_matches('\r')
}

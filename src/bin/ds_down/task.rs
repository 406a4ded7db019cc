//! Download target classification.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::ValidationError;

/// URL schemes Download Station can download from directly.
const REMOTE_URL_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "ftps://", "sftp://"];

/// Link schemes whose payload is not a standard URL, passed through without parsing.
const LINK_SCHEMES: &[&str] = &["thunder://", "flashget://", "qqdl://", "ed2k://"];

const MAGNET_SCHEME: &str = "magnet:";

/// A download task to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Magnet URI, sent as is.
    Magnet(String),
    /// Remote URL, sent as is.
    RemoteUrl(String),
    /// Local file such as a `.torrent`, uploaded with its contents.
    LocalFile(PathBuf),
}

impl Task {
    /// Classify a command line argument as a download task.
    ///
    /// Magnet links and URLs with a known scheme are sent as URLs,
    /// anything else must be an existing local file.
    /// Surrounding whitespace is ignored for links but kept for file paths.
    ///
    /// # Errors
    /// Returns an error if the argument is neither a valid URL nor an existing file.
    pub fn classify(argument: &str) -> Result<Self, ValidationError> {
        let target = argument.trim();
        if target.is_empty() {
            return Err(ValidationError::Empty);
        }

        if has_prefix_ignore_case(target, MAGNET_SCHEME) {
            if !target[MAGNET_SCHEME.len()..].starts_with('?') {
                return Err(ValidationError::InvalidUrl {
                    url: target.to_string(),
                    reason: "magnet link has no parameters".to_string(),
                });
            }
            return Ok(Self::Magnet(target.to_string()));
        }

        if REMOTE_URL_SCHEMES
            .iter()
            .any(|scheme| has_prefix_ignore_case(target, scheme))
        {
            Url::parse(target).map_err(|error| ValidationError::InvalidUrl {
                url: target.to_string(),
                reason: error.to_string(),
            })?;
            return Ok(Self::RemoteUrl(target.to_string()));
        }

        if let Some(scheme) = LINK_SCHEMES.iter().find(|scheme| has_prefix_ignore_case(target, scheme)) {
            if target.len() == scheme.len() {
                return Err(ValidationError::InvalidUrl {
                    url: target.to_string(),
                    reason: "link is empty".to_string(),
                });
            }
            return Ok(Self::RemoteUrl(target.to_string()));
        }

        ds_down::resolve_existing_file(&ds_down::config::expand_home(Path::new(argument)))
            .map(Self::LocalFile)
            .map_err(|error| ValidationError::NotAFile {
                path: argument.to_string(),
                reason: error.to_string(),
            })
    }

    /// Short description of the task kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Magnet(_) => "magnet link",
            Self::RemoteUrl(_) => "URL",
            Self::LocalFile(_) => "file",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Magnet(uri) | Self::RemoteUrl(uri) => write!(f, "{uri}"),
            Self::LocalFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Opaque id Download Station assigns to a created task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
}

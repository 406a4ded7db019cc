use std::path::{Path, PathBuf};

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

/// Path to the default user config file: `$HOME/.config/ds-down.toml`
///
/// Returns `None` if the home directory cannot be determined.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    let home_dir = dirs::home_dir()?;
    Some(home_dir.join(".config").join(format!("{PROJECT_NAME}.toml")))
}

/// Pick the config file to read.
///
/// An explicit path, given on the command line or through `DS_DOWN_CONFIG`,
/// wins over the default location under the home directory.
/// A leading `~` is expanded to the home directory.
#[must_use]
pub fn resolve_config_path(path: Option<&Path>) -> Option<PathBuf> {
    path.filter(|path| !path.as_os_str().is_empty())
        .map(expand_home)
        .or_else(default_config_path)
}

/// Expand a leading `~` component to the user home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::RawConfig;
use crate::errors::{ParlessError, Result};

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Parless.toml";

/// Load a configuration file and return the raw, unvalidated `RawConfig`.
///
/// Relative `directory`, `outputdir` and `paths` values are resolved
/// against the directory holding the file. Use
/// [`check_arguments`](crate::config::check_arguments) to apply defaults and
/// validate.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| ParlessError::read_failed(path, e))?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(match path.parent() {
        Some(base) => config.rebase(base),
        None => config,
    })
}

/// Load the config file if there is one.
///
/// An explicitly requested file must exist. Without one, `Parless.toml` in
/// `cwd` is used when present and an empty config otherwise.
pub fn load_optional(explicit: Option<&Path>, cwd: &Path) -> Result<RawConfig> {
    match explicit {
        Some(path) => load_from_path(cwd.join(path)),
        None => {
            let path = default_config_path(cwd);
            if path.is_file() {
                debug!(path = ?path, "using config file");
                load_from_path(&path)
            } else {
                Ok(RawConfig::default())
            }
        }
    }
}

pub fn default_config_path(cwd: &Path) -> PathBuf {
    cwd.join(DEFAULT_CONFIG_FILE)
}

//! Config file discovery and layered loading.
//!
//! [`load`] stacks the embedded defaults, the user file and the workspace
//! file into a [`LayeredTree`], fills still-unset keys from `COURIER_*`
//! variables, then deserializes and validates the result.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::layers::{Layer, LayeredTree, Origins};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A validated configuration and where its values came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: Config,
    /// Layer that set each dotted key.
    pub origins: Origins,
    /// Config files that were found and stacked, lowest first.
    pub files: Vec<PathBuf>,
}

impl LoadedConfig {
    /// Layer that set `key` (e.g. `"bus.strategy"`).
    #[must_use]
    pub fn origin(&self, key: &str) -> Option<Layer> {
        self.origins.get(key).copied()
    }
}

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the root of the current project. If `None`, the
/// workspace layer is skipped.
///
/// `home_override` replaces the user-level `.courier` directory; its
/// `config.toml` is loaded instead of `~/.courier/config.toml`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is unreadable or malformed,
/// or if the merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<LoadedConfig> {
    load_with_env(workspace_root, home_override, &collect_env_vars())
}

/// [`load`] with an explicit environment instead of the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is unreadable or malformed,
/// or if the merged configuration fails validation.
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<LoadedConfig> {
    let defaults: toml::Table =
        toml::from_str(DEFAULTS_TOML).map_err(|source| ConfigError::Malformed {
            origin: "<defaults>".to_owned(),
            source,
        })?;
    let mut tree = LayeredTree::new(defaults);
    let mut files = Vec::new();

    let user_path = match home_override {
        Some(home) => home.join("config.toml"),
        None => home_directory()?.join(".courier").join("config.toml"),
    };
    let workspace_path = workspace_root.map(|root| root.join(".courier").join("config.toml"));
    let candidates = [(Layer::User, Some(user_path)), (Layer::Workspace, workspace_path)];

    for (layer, path) in candidates {
        let Some(path) = path else {
            continue;
        };
        if let Some(overlay) = try_load_file(&path)? {
            info!(%layer, path = %path.display(), "loaded config file");
            tree.stack(layer, overlay);
            files.push(path);
        }
    }

    let env_count = apply_env_fallbacks(&mut tree, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let (root, origins) = tree.into_parts();
    let config: Config =
        toml::Value::Table(root)
            .try_into()
            .map_err(|source| ConfigError::Malformed {
                origin: "<merged>".to_owned(),
                source,
            })?;
    validate::validate(&config)?;

    Ok(LoadedConfig {
        config,
        origins,
        files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// Keys the file omits take their default values.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = read_capped(path)?;
    let config: Config = toml::from_str(&content).map_err(|source| malformed(path, source))?;
    validate::validate(&config)?;
    Ok(config)
}

/// Read and parse `path`, or `None` when it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Table>> {
    if !path.try_exists().map_err(|source| unreadable(path, source))? {
        debug!(path = %path.display(), "config file not found, skipping");
        return Ok(None);
    }
    let content = read_capped(path)?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| malformed(path, source))
}

fn read_capped(path: &Path) -> ConfigResult<String> {
    let len = std::fs::metadata(path)
        .map_err(|source| unreadable(path, source))?
        .len();
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Oversized {
            path: path.to_path_buf(),
            len,
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }
    std::fs::read_to_string(path).map_err(|source| unreadable(path, source))
}

fn unreadable(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    }
}

fn malformed(path: &Path, source: toml::de::Error) -> ConfigError {
    ConfigError::Malformed {
        origin: path.display().to_string(),
        source,
    }
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHome)
}

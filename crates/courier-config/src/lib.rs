#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the Courier event bus.
//!
//! This crate provides a single [`Config`] type with a `[bus]` section
//! (invocation strategy, panic handling, exception handler) and a
//! `[logging]` section.
//!
//! # Usage
//!
//! ```rust,no_run
//! use courier_config::Config;
//!
//! // Load with full precedence chain (defaults → user → workspace → env).
//! let loaded = Config::load(Some(std::path::Path::new("."))).unwrap();
//! let config = loaded.config;
//! println!("Using strategy: {}", config.bus.strategy);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.courier/config.toml`)
//! 2. **User** (`~/.courier/config.toml`)
//! 3. **Environment variables** (`COURIER_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other internal courier crates**.
//! `courier-events` and `courier-telemetry` convert its sections into their
//! own types behind their `config` features.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Layer stacking with per-key origins.
pub mod layers;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

// Re-export primary types at the crate root.
pub use error::{ConfigError, ConfigResult};
pub use layers::Layer;
pub use loader::LoadedConfig;
pub use types::*;

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<LoadedConfig> {
        loader::load(workspace_root, None)
    }

    /// Load configuration with an explicit `.courier` home directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(
        workspace_root: Option<&std::path::Path>,
        home_dir: &std::path::Path,
    ) -> ConfigResult<LoadedConfig> {
        loader::load(workspace_root, Some(home_dir))
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}

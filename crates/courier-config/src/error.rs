use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce a usable [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A TOML document did not parse, or did not fit the config types.
    #[error("malformed config in {origin}: {source}")]
    Malformed {
        /// File path, or `<defaults>` / `<merged>` for in-memory trees.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A config file is over the size cap.
    #[error("{} is {len} bytes, over the {limit} byte limit", .path.display())]
    Oversized {
        /// File that was rejected.
        path: PathBuf,
        /// Its size.
        len: u64,
        /// The cap.
        limit: u64,
    },

    /// A key holds a value the bus or the logger cannot use.
    #[error("invalid {key}: {reason}")]
    Invalid {
        /// Dotted key, e.g. `bus.strategy`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// No home directory to look for `~/.courier` in.
    #[error("no home directory to look for ~/.courier in")]
    NoHome,
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

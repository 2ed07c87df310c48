//! Configuration types for the Courier event bus.
//!
//! These types carry plain strings and booleans so that this crate does not
//! depend on `courier-events`. The bus and the logging layer convert them at
//! their boundary. Every struct implements [`Default`] with the values from
//! `defaults.toml`, so a bare `[section]` header in TOML is a working
//! configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event bus construction.
    pub bus: BusSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// BusSection
// ---------------------------------------------------------------------------

/// Event bus settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// Listener invocation strategy: `"compiled"` or `"reflect"`.
    pub strategy: String,
    /// Whether listener panics are caught and reported.
    pub catch_panics: bool,
    /// Failure handling: `"log"` or `"ignore"`.
    pub exception_handler: String,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            strategy: "compiled".to_owned(),
            catch_panics: true,
            exception_handler: "log".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"` (human-friendly), `"compact"` (one-line),
    /// `"json"` (structured), or `"full"` (verbose).
    pub format: String,
    /// Per-crate tracing directives (e.g. `["courier_events=trace"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only fill fields that no
//! config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::layers::{Layer, LayeredTree};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `COURIER_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "COURIER_STRATEGY",
        field_path: "bus.strategy",
    },
    EnvMapping {
        var_name: "COURIER_CATCH_PANICS",
        field_path: "bus.catch_panics",
    },
    EnvMapping {
        var_name: "COURIER_EXCEPTION_HANDLER",
        field_path: "bus.exception_handler",
    },
    EnvMapping {
        var_name: "COURIER_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "COURIER_LOG_FORMAT",
        field_path: "logging.format",
    },
];

/// Fill keys no config file set from the `COURIER_*` variables in
/// `env_vars`.
///
/// Returns the number of variables applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    tree: &mut LayeredTree,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if tree.origin(mapping.field_path).is_some_and(Layer::is_file) {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );

            tree.set(
                Layer::Env,
                mapping.field_path,
                coerce_to_toml_value(mapping.field_path, val),
            );
            count = count.saturating_add(1);
        }
    }

    count
}

/// Attempt to coerce a string env var value to the appropriate TOML type
/// based on the field path.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if path == "bus.catch_panics" {
        match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => return toml::Value::Boolean(true),
            "false" | "0" | "no" | "off" => return toml::Value::Boolean(false),
            _ => {},
        }
    }

    toml::Value::String(val.to_owned())
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

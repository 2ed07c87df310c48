//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values name
//! strategies, handlers, levels and formats that exist.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Accepted `bus.strategy` values.
pub const STRATEGIES: &[&str] = &["compiled", "reflect"];

/// Accepted `bus.exception_handler` values.
pub const EXCEPTION_HANDLERS: &[&str] = &["log", "ignore"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_bus(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_bus(config: &Config) -> ConfigResult<()> {
    one_of("bus.strategy", "strategy", &config.bus.strategy, STRATEGIES)?;
    one_of(
        "bus.exception_handler",
        "exception handler",
        &config.bus.exception_handler,
        EXCEPTION_HANDLERS,
    )
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    one_of("logging.level", "log level", &config.logging.level, &valid_levels)?;

    let valid_formats = ["pretty", "compact", "json", "full"];
    one_of("logging.format", "log format", &config.logging.format, &valid_formats)?;

    for directive in &config.logging.directives {
        if directive.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "logging.directives",
                reason: "directives must not be blank".to_owned(),
            });
        }
    }

    Ok(())
}

fn one_of(key: &'static str, what: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        key,
        reason: format!(
            "unsupported {what} '{value}'; expected one of: {}",
            allowed.join(", ")
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_strategy() {
        let mut config = Config::default();
        config.bus.strategy = "bytecode".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "bus.strategy", .. }
        ));
        assert!(err.to_string().contains("compiled, reflect"));
    }

    #[test]
    fn test_reflect_strategy_accepted() {
        let mut config = Config::default();
        config.bus.strategy = "reflect".to_owned();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_exception_handler() {
        let mut config = Config::default();
        config.bus.exception_handler = "rethrow".to_owned();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported log level 'verbose'"));
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_directive_rejected() {
        let mut config = Config::default();
        config.logging.directives = vec!["courier_events=debug".to_owned(), "  ".to_owned()];
        assert!(validate(&config).is_err());
    }
}

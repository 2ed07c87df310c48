//! Bridge from `courier_config::Config` to bus construction.
//!
//! `courier-config` has no dependency on this crate, so the `[bus]` section
//! carries plain strings. They are mapped here. Values outside the accepted
//! set fall back to the defaults; [`Config::load`](courier_config::Config::load)
//! already rejects them during validation.

use std::sync::Arc;

use courier_config::{BusSection, Config};

use crate::bus::{EventBus, EventBusBuilder};
use crate::handler::{ExceptionHandler, IgnoreExceptionHandler, LogExceptionHandler};
use crate::invoke::InvocationStrategy;

/// Convert `bus.strategy` to an [`InvocationStrategy`].
#[must_use]
pub fn to_strategy(section: &BusSection) -> InvocationStrategy {
    match section.strategy.as_str() {
        "reflect" => InvocationStrategy::Reflect,
        _ => InvocationStrategy::Compiled,
    }
}

/// Convert `bus.exception_handler` to an [`ExceptionHandler`].
#[must_use]
pub fn to_exception_handler(section: &BusSection) -> Arc<dyn ExceptionHandler> {
    match section.exception_handler.as_str() {
        "ignore" => Arc::new(IgnoreExceptionHandler),
        _ => Arc::new(LogExceptionHandler),
    }
}

impl EventBusBuilder {
    /// Builder preconfigured from a `[bus]` section.
    #[must_use]
    pub fn from_config(section: &BusSection) -> Self {
        Self::new()
            .with_strategy(to_strategy(section))
            .with_shared_exception_handler(to_exception_handler(section))
            .with_catch_panics(section.catch_panics)
    }
}

/// Build an [`EventBus`] from a loaded configuration.
#[must_use]
pub fn to_event_bus(cfg: &Config) -> EventBus {
    EventBusBuilder::from_config(&cfg.bus).build()
}

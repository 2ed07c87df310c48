//! Courier Telemetry - logging setup for the Courier event bus.
//!
//! `courier-events` emits `tracing` events: registrations at `debug`,
//! per-listener dispatch at `trace`, listener failures at `error`. This
//! crate installs the subscriber that renders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use courier_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), courier_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("courier_events=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};

//! Courier Test - Shared test utilities for the Courier event bus.
//!
//! This crate provides sample events, call recorders and a recording
//! exception handler that can be used across Courier crates as a
//! dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! courier-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! #[cfg(test)]
//! mod tests {
//!     use courier_events::{EventBus, ListenerSpec};
//!     use courier_test::{CallLog, Ping};
//!
//!     #[test]
//!     fn test_listener_runs() {
//!         let bus = EventBus::new();
//!         let log = CallLog::new();
//!         bus.listen(ListenerSpec::new(), log.recorder::<Ping>("first"));
//!
//!         bus.post(&mut Ping::default());
//!         assert_eq!(log.entries(), vec!["first"]);
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod logging;
pub mod mocks;

pub use fixtures::*;
pub use logging::*;
pub use mocks::*;

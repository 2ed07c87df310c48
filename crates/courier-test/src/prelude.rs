//! Prelude module - commonly used test utilities.
//!
//! Use `use courier_test::prelude::*;` to import all test helpers.

// Sample events
pub use crate::{Base, Derived, Guarded, Ping, Tagged};

// Recorders
pub use crate::{CallLog, Failure, RecordingExceptionHandler};

// Logging
pub use crate::init_test_logging;

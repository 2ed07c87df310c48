//! Prelude module - commonly used types for convenient import.
//!
//! Use `use courier_events::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use courier_events::prelude::*;
//!
//! struct Tick(u32);
//! impl Event for Tick {}
//!
//! let bus = EventBus::new();
//! let handle = bus.listen(ListenerSpec::new().with_order(Order::Late), |tick: &mut Tick| {
//!     tick.0 += 1;
//! });
//!
//! let mut tick = Tick(0);
//! bus.post(&mut tick);
//! assert_eq!(tick.0, 1);
//! assert!(bus.remove(&handle));
//! ```

// Event bus
pub use crate::{EventBus, EventBusBuilder, ListenerHandle, handler_error};

// Events
pub use crate::{Cancellable, Event, Supertype, TypeKey};

// Listeners
pub use crate::{ListenerSpec, Order, RegisteredListener};

// Subscribers
pub use crate::{Method, Subscriber};

// Strategies and failure handling
pub use crate::{ExceptionHandler, InvocationError, InvocationStrategy, RegistrationError};

// Errors
pub use crate::HandlerError;

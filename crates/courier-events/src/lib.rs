//! Courier Events - synchronous typed event bus.
//!
//! This crate provides:
//! - The [`Event`] contract with optional cancellation and a generic
//!   discriminator
//! - Per-event-type listener registries split into five [`Order`] stages
//! - Two invocation strategies: by-name calls and cached typed adapters
//! - An [`EventBus`] that delivers events on the posting thread
//!
//! # Architecture
//!
//! Listeners are grouped by the event type they accept. Posting an event
//! visits every stage from [`Order::First`] to [`Order::Last`]; within a
//! stage, listeners of the concrete type run first, then those of each
//! declared supertype. A listener that fails or panics is reported to the
//! bus's [`ExceptionHandler`] and the pass continues.
//!
//! There are two ways to add listeners:
//!
//! 1. **Closures**: `bus.listen(spec, |event: &mut MyEvent| ...)`.
//!
//! 2. **Subscribers**: types implementing [`Subscriber`] describe their
//!    handler methods; `bus.register(Arc::new(owner))` binds them through
//!    the bus's [`ListenerFactory`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use courier_events::{Cancellable, Event, EventBus, ListenerSpec, Order};
//!
//! #[derive(Default)]
//! struct Chat {
//!     text: String,
//!     cancelled: bool,
//! }
//!
//! impl Cancellable for Chat {
//!     fn is_cancelled(&self) -> bool {
//!         self.cancelled
//!     }
//!     fn set_cancelled(&mut self, cancelled: bool) {
//!         self.cancelled = cancelled;
//!     }
//! }
//!
//! impl Event for Chat {
//!     fn as_cancellable(&self) -> Option<&dyn Cancellable> {
//!         Some(self)
//!     }
//!     fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
//!         Some(self)
//!     }
//! }
//!
//! let bus = EventBus::new();
//! let delivered = Arc::new(AtomicUsize::new(0));
//!
//! bus.listen(ListenerSpec::new().with_order(Order::First), |chat: &mut Chat| {
//!     if chat.text.contains("spam") {
//!         chat.cancelled = true;
//!     }
//! });
//!
//! let counter = Arc::clone(&delivered);
//! bus.listen(ListenerSpec::new(), move |_: &mut Chat| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.post(&mut Chat { text: "hello".into(), ..Chat::default() });
//! bus.post(&mut Chat { text: "spam".into(), ..Chat::default() });
//! assert_eq!(delivered.load(Ordering::SeqCst), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod check;
#[cfg(feature = "config")]
pub mod config;
pub mod invoke;
pub mod prelude;

mod bus;
mod error;
mod event;
mod handler;
mod listener;
mod method;
mod order;
mod registry;
mod subscriber;

pub use bus::{EventBus, EventBusBuilder, ListenerHandle, handler_error};
pub use check::{Diagnostic, lint, lint_subscriber};
pub use error::{
    EventError, HandlerError, InvocationError, RegistrationError, RegistrationResult,
    ShapeViolation,
};
pub use event::{AsAny, Cancellable, Event, EventType, Projection, Supertype, TypeKey};
pub use handler::{ExceptionHandler, IgnoreExceptionHandler, LogExceptionHandler};
pub use invoke::{
    CompiledListenerFactory, EventListener, FnListener, HandlerReturn, InvocationStrategy,
    ListenerFactory, ReflectListenerFactory,
};
pub use listener::{Filter, ListenerId, ListenerSpec, RegisteredListener};
pub use method::{
    AdapterFn, DynCall, Method, MethodId, MethodInfo, MethodTable, Owner, ParamType, Receiver,
    ReturnKind, Visibility,
};
pub use order::Order;
pub use registry::{Chain, ChainLink, ListenerList, Stage};
pub use subscriber::Subscriber;

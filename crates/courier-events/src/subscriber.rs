//! Subscriber discovery.

use crate::method::Method;

/// A type whose methods can be registered as listeners.
///
/// [`methods`](Subscriber::methods) lists every method the type exposes to
/// the bus; those carrying a [`ListenerSpec`](crate::ListenerSpec) are
/// handlers. Instance methods are registered with
/// [`EventBus::register`](crate::EventBus::register), associated functions
/// with [`EventBus::register_static`](crate::EventBus::register_static).
///
/// ```rust
/// use courier_events::{Event, ListenerSpec, Method, Order, Subscriber};
///
/// struct PlayerJoined { name: String }
/// impl Event for PlayerJoined {}
///
/// struct Greeter;
///
/// impl Greeter {
///     fn greet(&self, event: &mut PlayerJoined) {
///         println!("welcome, {}", event.name);
///     }
///
///     fn audit(event: &mut PlayerJoined) {
///         event.name = event.name.trim().to_string();
///     }
/// }
///
/// impl Subscriber for Greeter {
///     fn methods() -> Vec<Method> {
///         vec![
///             Method::instance("greet", Greeter::greet).with_listener(ListenerSpec::new()),
///             Method::associated::<Greeter, _, _>("audit", Greeter::audit)
///                 .with_listener(ListenerSpec::new().with_order(Order::First)),
///         ]
///     }
/// }
/// ```
pub trait Subscriber: Send + Sync + 'static {
    /// The methods of this type, in declaration order.
    fn methods() -> Vec<Method>;
}

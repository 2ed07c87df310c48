//! Sample events and subscribers.

use courier_events::{
    Cancellable, Event, ListenerSpec, Method, Order, Subscriber, Supertype, TypeKey,
};

use crate::mocks::CallLog;

/// A plain event that records the listeners it visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ping {
    /// Names of the listeners that saw this event, in call order.
    pub seen: Vec<String>,
}

impl Ping {
    /// Append a listener name.
    pub fn mark(&mut self, name: impl Into<String>) {
        self.seen.push(name.into());
    }
}

impl Event for Ping {}

/// A cancellable event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guarded {
    /// Cancellation flag.
    pub cancelled: bool,
    /// Names of the listeners that saw this event, in call order.
    pub seen: Vec<String>,
}

impl Guarded {
    /// Append a listener name.
    pub fn mark(&mut self, name: impl Into<String>) {
        self.seen.push(name.into());
    }
}

impl Cancellable for Guarded {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

impl Event for Guarded {
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        Some(self)
    }

    fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
        Some(self)
    }
}

/// A cancellable generic event whose discriminator is chosen at runtime.
#[derive(Debug, Clone, Default)]
pub struct Tagged {
    tag: Option<TypeKey>,
    /// Cancellation flag.
    pub cancelled: bool,
    /// Names of the listeners that saw this event, in call order.
    pub seen: Vec<String>,
}

impl Tagged {
    /// An event tagged with `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            tag: Some(TypeKey::of::<T>()),
            ..Self::default()
        }
    }

    /// An event with no tag.
    #[must_use]
    pub fn untagged() -> Self {
        Self::default()
    }

    /// Append a listener name.
    pub fn mark(&mut self, name: impl Into<String>) {
        self.seen.push(name.into());
    }
}

impl Cancellable for Tagged {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

impl Event for Tagged {
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        Some(self)
    }

    fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
        Some(self)
    }

    fn generic_type(&self) -> Option<TypeKey> {
        self.tag
    }
}

/// Supertype of [`Derived`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Base {
    /// Names of the listeners that saw the base view, in call order.
    pub seen: Vec<String>,
}

impl Event for Base {}

/// An event that declares [`Base`] as its supertype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Derived {
    /// The base view handed to `Base` listeners.
    pub base: Base,
    /// Names of the `Derived` listeners that saw this event.
    pub seen: Vec<String>,
}

impl AsMut<Base> for Derived {
    fn as_mut(&mut self) -> &mut Base {
        &mut self.base
    }
}

impl Event for Derived {
    fn supertypes() -> Vec<Supertype> {
        vec![Supertype::of::<Self, Base>()]
    }
}

/// A subscriber with two instance handlers and one associated handler.
///
/// - `on_ping` (`Normal`) marks `"{name}:ping"`;
/// - `on_guarded` (`Late`) marks `"{name}:guarded"`;
/// - `audit` (`First`, associated) marks `"audit"`;
/// - `replay` is not a handler.
///
/// Every call is also appended to the shared [`CallLog`].
#[derive(Debug, Clone)]
pub struct Recorder {
    /// Prefix for marks.
    pub name: &'static str,
    /// Shared call log.
    pub log: CallLog,
}

impl Recorder {
    /// A recorder writing to `log`.
    #[must_use]
    pub fn new(name: &'static str, log: CallLog) -> Self {
        Self { name, log }
    }

    fn on_ping(&self, ping: &mut Ping) {
        let mark = format!("{}:ping", self.name);
        self.log.record(&mark);
        ping.mark(mark);
    }

    fn on_guarded(&self, guarded: &mut Guarded) {
        let mark = format!("{}:guarded", self.name);
        self.log.record(&mark);
        guarded.mark(mark);
    }

    fn audit(ping: &mut Ping) {
        ping.mark("audit");
    }

    fn replay(&self, ping: &mut Ping) {
        ping.mark(format!("{}:replay", self.name));
    }
}

impl Subscriber for Recorder {
    fn methods() -> Vec<Method> {
        vec![
            Method::instance("on_ping", Recorder::on_ping).with_listener(ListenerSpec::new()),
            Method::instance("on_guarded", Recorder::on_guarded)
                .with_listener(ListenerSpec::new().with_order(Order::Late)),
            Method::associated::<Recorder, _, _>("audit", Recorder::audit)
                .with_listener(ListenerSpec::new().with_order(Order::First)),
            // Not a handler: no listener spec.
            Method::instance("replay", Recorder::replay),
        ]
    }
}

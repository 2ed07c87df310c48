//! Registered listeners and their filters.

use std::fmt;
use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use crate::error::InvocationError;
use crate::event::{Event, EventType, TypeKey};
use crate::invoke::EventListener;
use crate::method::{MethodId, Owner};
use crate::order::Order;

/// Listener annotation: stage, cancellation policy and optional generic
/// discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerSpec {
    /// Priority stage.
    pub order: Order,
    /// Whether the listener still runs once the event is cancelled.
    pub receive_cancelled: bool,
    /// Only receive generic events tagged with this type.
    pub generic: Option<TypeKey>,
}

impl ListenerSpec {
    /// Normal stage, skips cancelled events, no discriminator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority stage.
    #[must_use]
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Keep receiving the event after it is cancelled.
    #[must_use]
    pub fn receiving_cancelled(mut self) -> Self {
        self.receive_cancelled = true;
        self
    }

    /// Only receive generic events tagged with `T`.
    #[must_use]
    pub fn with_generic<T: ?Sized + 'static>(self) -> Self {
        self.with_generic_key(TypeKey::of::<T>())
    }

    /// Only receive generic events tagged with `key`.
    #[must_use]
    pub fn with_generic_key(mut self, key: TypeKey) -> Self {
        self.generic = Some(key);
        self
    }
}

/// Unique identity of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying uuid.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Filter selected once from a listener's cancellation policy and
/// discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Always invoke.
    Always,
    /// Invoke unless the event is cancelled.
    NotCancelled,
    /// Invoke if the event's tag matches.
    Generic(TypeKey),
    /// Invoke if the event is not cancelled and its tag matches.
    NotCancelledGeneric(TypeKey),
}

impl Filter {
    /// The filter for a listener's settings.
    #[must_use]
    pub fn new(receive_cancelled: bool, generic: Option<TypeKey>) -> Self {
        match (receive_cancelled, generic) {
            (true, None) => Filter::Always,
            (false, None) => Filter::NotCancelled,
            (true, Some(key)) => Filter::Generic(key),
            (false, Some(key)) => Filter::NotCancelledGeneric(key),
        }
    }

    /// Whether the event passes.
    ///
    /// Cancellation only counts for cancellable events; an event without a
    /// generic tag never matches a discriminator.
    #[must_use]
    pub fn accepts(&self, event: &dyn Event) -> bool {
        match self {
            Filter::Always => true,
            Filter::NotCancelled => !event.is_cancelled(),
            Filter::Generic(key) => event.generic_type() == Some(*key),
            Filter::NotCancelledGeneric(key) => {
                !event.is_cancelled() && event.generic_type() == Some(*key)
            },
        }
    }
}

/// A listener as stored in a registry. Immutable once built.
pub struct RegisteredListener {
    id: ListenerId,
    event_type: EventType,
    spec: ListenerSpec,
    filter: Filter,
    target: Arc<dyn EventListener>,
    owner: Option<Owner>,
    method: Option<MethodId>,
    name: String,
}

impl RegisteredListener {
    /// Wrap a target listening for `event_type`.
    #[must_use]
    pub fn new(event_type: EventType, spec: ListenerSpec, target: Arc<dyn EventListener>) -> Self {
        Self {
            id: ListenerId::new(),
            event_type,
            filter: Filter::new(spec.receive_cancelled, spec.generic),
            spec,
            target,
            owner: None,
            method: None,
            name: format!("<listener for {event_type}>"),
        }
    }

    /// Record the instance the target is bound to.
    #[must_use]
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Record the method the target calls. Also sets the display name.
    #[must_use]
    pub fn with_method(mut self, method: MethodId) -> Self {
        self.name = method.to_string();
        self.method = Some(method);
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Identity of this registration.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Event type listened for.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Listener annotation.
    #[must_use]
    pub fn spec(&self) -> &ListenerSpec {
        &self.spec
    }

    /// Priority stage.
    #[must_use]
    pub fn order(&self) -> Order {
        self.spec.order
    }

    /// Whether cancelled events are still delivered.
    #[must_use]
    pub fn receive_cancelled(&self) -> bool {
        self.spec.receive_cancelled
    }

    /// Generic discriminator.
    #[must_use]
    pub fn generic(&self) -> Option<TypeKey> {
        self.spec.generic
    }

    /// The selected filter.
    #[must_use]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Bound instance, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    /// Called method, if the target was built from one.
    #[must_use]
    pub fn method(&self) -> Option<MethodId> {
        self.method
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The invocation target.
    #[must_use]
    pub fn target(&self) -> &Arc<dyn EventListener> {
        &self.target
    }

    /// Whether this listener is bound to the instance at `owner`.
    #[must_use]
    pub fn is_owned_by(&self, owner: *const ()) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|bound| std::ptr::eq(Arc::as_ptr(bound).cast::<()>(), owner))
    }

    /// Whether the event passes this listener's filter.
    #[must_use]
    pub fn accepts(&self, event: &dyn Event) -> bool {
        self.filter.accepts(event)
    }

    /// Filter, then invoke.
    ///
    /// Returns `Ok(false)` when the filter rejected the event.
    ///
    /// # Errors
    ///
    /// Propagates the target's [`InvocationError`].
    pub fn post(&self, event: &mut dyn Event) -> Result<bool, InvocationError> {
        if !self.filter.accepts(event) {
            trace!(listener = %self.name, filter = ?self.filter, "Listener filtered out");
            return Ok(false);
        }
        self.invoke(event)?;
        Ok(true)
    }

    /// Invoke the target without filtering.
    ///
    /// Used by the bus, which filters on the posted event and then hands
    /// the target the projected view of its own registry.
    ///
    /// # Errors
    ///
    /// Propagates the target's [`InvocationError`].
    pub fn invoke(&self, event: &mut dyn Event) -> Result<(), InvocationError> {
        trace!(listener = %self.name, "Invoking listener");
        self.target.post(event)
    }
}

impl fmt::Debug for RegisteredListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredListener")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("event_type", &self.event_type)
            .field("order", &self.spec.order)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

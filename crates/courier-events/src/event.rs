//! The event contract.
//!
//! Every posted value implements [`Event`]. Two capabilities are optional:
//!
//! - **cancellable**: the event exposes a [`Cancellable`] view whose flag
//!   listeners may read and set during dispatch;
//! - **generic**: the event carries a runtime discriminator
//!   ([`Event::generic_type`]) that listeners can subscribe to.
//!
//! Event hierarchies are declared, not discovered: an event lists its
//! [`Supertype`]s, and listeners registered for a supertype receive the
//! projected parent view of the posted event.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::EventError;

/// Identity of a Rust type used as an event type or generic discriminator.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the type `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying type id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The full type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Upcasting helpers, implemented for every `'static` type.
pub trait AsAny: Any {
    /// View as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// View as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Key of the concrete type.
    fn type_key(&self) -> TypeKey;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }
}

/// The cancellable capability.
pub trait Cancellable {
    /// Whether the event has been cancelled.
    fn is_cancelled(&self) -> bool;
    /// Set or clear the cancelled flag.
    fn set_cancelled(&mut self, cancelled: bool);
}

/// A value that can be posted on an [`EventBus`](crate::EventBus).
///
/// All methods have defaults, so a plain event is just `impl Event for T {}`.
///
/// ```rust
/// use courier_events::{Cancellable, Event};
///
/// #[derive(Default)]
/// struct ChatMessage {
///     text: String,
///     cancelled: bool,
/// }
///
/// impl Cancellable for ChatMessage {
///     fn is_cancelled(&self) -> bool {
///         self.cancelled
///     }
///     fn set_cancelled(&mut self, cancelled: bool) {
///         self.cancelled = cancelled;
///     }
/// }
///
/// impl Event for ChatMessage {
///     fn as_cancellable(&self) -> Option<&dyn Cancellable> {
///         Some(self)
///     }
///     fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
///         Some(self)
///     }
/// }
/// ```
pub trait Event: AsAny + 'static {
    /// The cancellable view of this event, if it has one.
    fn as_cancellable(&self) -> Option<&dyn Cancellable> {
        None
    }

    /// The mutable cancellable view of this event, if it has one.
    fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
        None
    }

    /// Runtime discriminator of a generic event.
    fn generic_type(&self) -> Option<TypeKey> {
        None
    }

    /// Declared supertypes, in the order their listeners are visited.
    fn supertypes() -> Vec<Supertype>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

impl dyn Event {
    /// Whether the event exposes the cancellable capability.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.as_cancellable().is_some()
    }

    /// Whether the event is cancelled. Always `false` for events that are
    /// not cancellable.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.as_cancellable().is_some_and(|c| c.is_cancelled())
    }

    /// Set the cancelled flag.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotCancellable`] if the event does not expose the
    /// cancellable capability.
    pub fn set_cancelled(&mut self, cancelled: bool) -> Result<(), EventError> {
        let name = AsAny::type_key(&*self).name();
        let cancellable = self
            .as_cancellable_mut()
            .ok_or(EventError::NotCancellable(name))?;
        cancellable.set_cancelled(cancelled);
        Ok(())
    }

    /// Whether the concrete type is `E`.
    #[must_use]
    pub fn is<E: Event>(&self) -> bool {
        self.as_any().is::<E>()
    }

    /// Downcast to the concrete type.
    #[must_use]
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Downcast to the concrete type, mutably.
    pub fn downcast_mut<E: Event>(&mut self) -> Option<&mut E> {
        self.as_any_mut().downcast_mut::<E>()
    }
}

impl fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.type_key())
            .field("cancelled", &self.is_cancelled())
            .field("generic_type", &self.generic_type())
            .finish()
    }
}

/// Identity of an event type together with its declared supertypes.
#[derive(Clone, Copy)]
pub struct EventType {
    key: TypeKey,
    supertypes: fn() -> Vec<Supertype>,
}

impl EventType {
    /// Event type of `E`.
    #[must_use]
    pub fn of<E: Event>() -> Self {
        Self {
            key: TypeKey::of::<E>(),
            supertypes: <E as Event>::supertypes,
        }
    }

    /// Key of the event type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Declared supertypes of the event type.
    #[must_use]
    pub fn supertypes(&self) -> Vec<Supertype> {
        (self.supertypes)()
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EventType {}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.key.name()).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

/// Maps a posted event onto the view seen by a supertype's listeners.
///
/// Returns `None` if the event is not of the type the projection was built
/// for.
pub type Projection = fn(&mut dyn Event) -> Option<&mut dyn Event>;

/// A declared edge from an event type to one of its supertypes.
#[derive(Clone, Copy)]
pub struct Supertype {
    parent: EventType,
    projection: Projection,
}

impl Supertype {
    /// Declare `P` as a supertype of `E`, viewed through `E: AsMut<P>`.
    ///
    /// ```rust
    /// use courier_events::{Event, Supertype};
    ///
    /// struct EntityEvent { entity: u64 }
    /// impl Event for EntityEvent {}
    ///
    /// struct EntityMoved { base: EntityEvent, dx: i32 }
    /// impl AsMut<EntityEvent> for EntityMoved {
    ///     fn as_mut(&mut self) -> &mut EntityEvent { &mut self.base }
    /// }
    /// impl Event for EntityMoved {
    ///     fn supertypes() -> Vec<Supertype> {
    ///         vec![Supertype::of::<Self, EntityEvent>()]
    ///     }
    /// }
    /// ```
    #[must_use]
    pub fn of<E, P>() -> Self
    where
        E: Event + AsMut<P>,
        P: Event,
    {
        Self {
            parent: EventType::of::<P>(),
            projection: project_into::<E, P>,
        }
    }

    /// The supertype.
    #[must_use]
    pub fn parent(&self) -> EventType {
        self.parent
    }

    /// Projection from the subtype onto the supertype.
    #[must_use]
    pub fn projection(&self) -> Projection {
        self.projection
    }
}

impl fmt::Debug for Supertype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supertype")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

fn project_into<E, P>(event: &mut dyn Event) -> Option<&mut dyn Event>
where
    E: Event + AsMut<P>,
    P: Event,
{
    let event = event.downcast_mut::<E>()?;
    let parent: &mut dyn Event = AsMut::<P>::as_mut(event);
    Some(parent)
}

//! Invocation targets and the factories that build them.
//!
//! A registered listener calls into an [`EventListener`]. Closures become
//! [`FnListener`]s directly; subscriber methods go through a
//! [`ListenerFactory`]:
//!
//! - [`ReflectListenerFactory`] binds owner, method table and method name,
//!   and resolves the method by name on every call;
//! - [`CompiledListenerFactory`] builds one adapter template per method,
//!   caches it, and binds each registration to a dedicated adapter.
//!
//! Both produce identical observable behaviour.

pub mod compiled;
pub mod reflect;

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, InvocationError, RegistrationError};
use crate::event::{AsAny, Event, EventType};
use crate::method::{Method, MethodTable, Owner, ReturnKind};

pub use compiled::CompiledListenerFactory;
pub use reflect::ReflectListenerFactory;

/// The callable unit a registered listener invokes.
pub trait EventListener: Send + Sync {
    /// Deliver the event.
    ///
    /// # Errors
    ///
    /// Returns the handler's failure, or a mismatch if the event is not of
    /// the type the target was built for.
    fn post(&self, event: &mut dyn Event) -> Result<(), InvocationError>;
}

/// Return types a handler may have.
pub trait HandlerReturn: 'static {
    /// How the return type is described in a [`MethodInfo`](crate::MethodInfo).
    const KIND: ReturnKind;

    /// Normalize into a unit result.
    ///
    /// # Errors
    ///
    /// Returns the handler's own error.
    fn into_result(self) -> Result<(), HandlerError>;
}

impl HandlerReturn for () {
    const KIND: ReturnKind = ReturnKind::Unit;

    fn into_result(self) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl<Err> HandlerReturn for Result<(), Err>
where
    Err: Into<HandlerError> + 'static,
{
    const KIND: ReturnKind = ReturnKind::Fallible;

    fn into_result(self) -> Result<(), HandlerError> {
        self.map_err(Into::into)
    }
}

/// Downcast a delivered event to the type a target was built for.
pub(crate) fn downcast_event<E: Event>(
    event: &mut dyn Event,
) -> Result<&mut E, InvocationError> {
    let found = AsAny::type_key(&*event).name();
    event
        .downcast_mut::<E>()
        .ok_or(InvocationError::EventMismatch {
            expected: type_name::<E>(),
            found,
        })
}

/// Invocation target wrapping a closure.
pub struct FnListener<E, F, R> {
    handler: F,
    _marker: PhantomData<fn(&mut E) -> R>,
}

impl<E, F, R> FnListener<E, F, R>
where
    E: Event,
    F: Fn(&mut E) -> R + Send + Sync,
    R: HandlerReturn,
{
    /// Wrap a closure.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<E, F, R> EventListener for FnListener<E, F, R>
where
    E: Event,
    F: Fn(&mut E) -> R + Send + Sync,
    R: HandlerReturn,
{
    fn post(&self, event: &mut dyn Event) -> Result<(), InvocationError> {
        let event = downcast_event::<E>(event)?;
        (self.handler)(event)
            .into_result()
            .map_err(InvocationError::Handler)
    }
}

/// Turns subscriber methods into invocation targets.
pub trait ListenerFactory: Send + Sync {
    /// Build a target for `method`, bound to `owner` (or to nothing, for an
    /// associated function), listening for `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] if the method does not have a valid
    /// listener shape or cannot be bound to `owner`.
    fn create(
        &self,
        owner: Option<&Owner>,
        table: &Arc<MethodTable>,
        method: &Method,
        event_type: EventType,
    ) -> Result<Arc<dyn EventListener>, RegistrationError>;
}

/// Which factory a bus uses for subscriber methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStrategy {
    /// Cached per-method adapters.
    #[default]
    Compiled,
    /// By-name calls resolved on every post.
    Reflect,
}

impl InvocationStrategy {
    /// A fresh factory for this strategy.
    #[must_use]
    pub fn factory(self) -> Arc<dyn ListenerFactory> {
        match self {
            InvocationStrategy::Compiled => Arc::new(CompiledListenerFactory::new()),
            InvocationStrategy::Reflect => Arc::new(ReflectListenerFactory::new()),
        }
    }
}

/// Shared check for the unit result of a by-name call.
pub(crate) fn expect_unit(
    name: &'static str,
    ret: &dyn std::any::Any,
) -> Result<(), InvocationError> {
    if ret.is::<()>() {
        Ok(())
    } else {
        Err(InvocationError::UnexpectedReturn(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping {
        hits: u32,
    }
    impl Event for Ping {}

    struct Pong;
    impl Event for Pong {}

    #[test]
    fn test_fn_listener_invokes_closure() {
        let listener = FnListener::new(|ping: &mut Ping| ping.hits = ping.hits.saturating_add(1));
        let mut ping = Ping { hits: 0 };
        listener.post(&mut ping).unwrap();
        listener.post(&mut ping).unwrap();
        assert_eq!(ping.hits, 2);
    }

    #[test]
    fn test_fn_listener_reports_handler_error() {
        let listener = FnListener::new(|_: &mut Ping| -> Result<(), HandlerError> {
            Err("nope".into())
        });
        let err = listener.post(&mut Ping { hits: 0 }).unwrap_err();
        assert_eq!(err.to_string(), "handler failed: nope");
    }

    #[test]
    fn test_fn_listener_rejects_other_event() {
        let listener = FnListener::new(|_: &mut Ping| {});
        let err = listener.post(&mut Pong).unwrap_err();
        assert!(matches!(err, InvocationError::EventMismatch { .. }));
    }

    #[test]
    fn test_handler_return_kinds() {
        assert_eq!(<() as HandlerReturn>::KIND, ReturnKind::Unit);
        assert_eq!(
            <Result<(), std::io::Error> as HandlerReturn>::KIND,
            ReturnKind::Fallible
        );
    }

    #[test]
    fn test_strategy_default_is_compiled() {
        assert_eq!(InvocationStrategy::default(), InvocationStrategy::Compiled);
    }
}

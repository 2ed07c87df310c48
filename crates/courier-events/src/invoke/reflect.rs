//! By-name invocation.

use std::sync::Arc;

use tracing::debug;

use super::{EventListener, ListenerFactory, expect_unit};
use crate::check;
use crate::error::{InvocationError, RegistrationError};
use crate::event::{AsAny, Event, EventType};
use crate::method::{Method, MethodTable, Owner};

/// Factory whose targets resolve their method by name on every call.
#[derive(Debug, Default)]
pub struct ReflectListenerFactory;

impl ReflectListenerFactory {
    /// Create the factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ListenerFactory for ReflectListenerFactory {
    fn create(
        &self,
        owner: Option<&Owner>,
        table: &Arc<MethodTable>,
        method: &Method,
        event_type: EventType,
    ) -> Result<Arc<dyn EventListener>, RegistrationError> {
        check::unique(table, method.info())?;
        check::validate(owner, method.info(), Some(event_type))?;
        debug!(method = %method.id(), event_type = %event_type, "Binding by-name listener");
        Ok(Arc::new(ReflectListener {
            owner: owner.cloned(),
            table: Arc::clone(table),
            name: method.name(),
            event_type,
        }))
    }
}

/// Target that looks its method up in the owner's table on every post.
pub struct ReflectListener {
    owner: Option<Owner>,
    table: Arc<MethodTable>,
    name: &'static str,
    event_type: EventType,
}

impl EventListener for ReflectListener {
    fn post(&self, event: &mut dyn Event) -> Result<(), InvocationError> {
        let found = AsAny::type_key(&*event);
        if found != self.event_type.key() {
            return Err(InvocationError::EventMismatch {
                expected: self.event_type.key().name(),
                found: found.name(),
            });
        }
        let method = self
            .table
            .get(self.name)
            .ok_or(InvocationError::MissingMethod(self.name))?;
        let ret = method.invoke(self.owner.as_ref(), &mut [event.as_any_mut()])?;
        expect_unit(self.name, &*ret)
    }
}

impl std::fmt::Debug for ReflectListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectListener")
            .field("owner", &self.table.owner())
            .field("method", &self.name)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

//! Cached per-method adapters.
//!
//! The first registration of a method builds an adapter template: the
//! method's typed adapter constructor when it has one, otherwise a
//! constructor around its pre-resolved by-name call. Templates are cached
//! per [`MethodId`] for the lifetime of the factory; every registration
//! instantiates its own adapter from the template.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{debug, trace};

use super::{EventListener, HandlerReturn, ListenerFactory, downcast_event, expect_unit};
use crate::check;
use crate::error::{InvocationError, RegistrationError};
use crate::event::{AsAny, Event, EventType};
use crate::method::{AdapterFn, DynCall, Method, MethodId, MethodTable, Owner, adapter_fn};

/// Factory that caches one adapter template per handler method.
#[derive(Default)]
pub struct CompiledListenerFactory {
    templates: DashMap<MethodId, AdapterFn>,
    generated: AtomicUsize,
}

impl CompiledListenerFactory {
    /// Create a factory with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached templates.
    #[must_use]
    pub fn adapter_count(&self) -> usize {
        self.templates.len()
    }

    /// Number of templates generated since creation.
    #[must_use]
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::Acquire)
    }

    /// Whether a template for `method` is cached.
    #[must_use]
    pub fn is_cached(&self, method: &MethodId) -> bool {
        self.templates.contains_key(method)
    }

    fn template(&self, method: &Method) -> AdapterFn {
        let id = method.id();
        if let Some(template) = self.templates.get(&id) {
            trace!(method = %id, "Adapter template cache hit");
            return Arc::clone(template.value());
        }
        let entry = self.templates.entry(id).or_insert_with(|| {
            self.generated.fetch_add(1, Ordering::AcqRel);
            debug!(
                method = %id,
                typed = method.adapter().is_some(),
                "Generated adapter template"
            );
            synthesize(method)
        });
        Arc::clone(entry.value())
    }
}

impl ListenerFactory for CompiledListenerFactory {
    fn create(
        &self,
        owner: Option<&Owner>,
        table: &Arc<MethodTable>,
        method: &Method,
        event_type: EventType,
    ) -> Result<Arc<dyn EventListener>, RegistrationError> {
        check::unique(table, method.info())?;
        check::validate(owner, method.info(), Some(event_type))?;
        let template = self.template(method);
        template(owner).ok_or(RegistrationError::OwnerMismatch {
            method: method.id(),
        })
    }
}

impl fmt::Debug for CompiledListenerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledListenerFactory")
            .field("adapters", &self.templates.len())
            .field("generated", &self.generated())
            .finish()
    }
}

fn synthesize(method: &Method) -> AdapterFn {
    if let Some(adapter) = method.adapter() {
        return Arc::clone(adapter);
    }
    let call = Arc::clone(method.call());
    let name = method.name();
    let event_type = method.info().params.first().and_then(|p| p.event_type());
    adapter_fn(move |owner| {
        let listener: Arc<dyn EventListener> = Arc::new(DynAdapter {
            owner: owner.cloned(),
            call: Arc::clone(&call),
            name,
            event_type,
        });
        Some(listener)
    })
}

/// Adapter bound to an owner and an instance method.
pub struct InstanceAdapter<O, E, R> {
    owner: Arc<O>,
    handler: fn(&O, &mut E) -> R,
    name: &'static str,
}

impl<O, E, R> InstanceAdapter<O, E, R> {
    pub(crate) fn new(owner: Arc<O>, handler: fn(&O, &mut E) -> R, name: &'static str) -> Self {
        Self {
            owner,
            handler,
            name,
        }
    }
}

impl<O, E, R> EventListener for InstanceAdapter<O, E, R>
where
    O: Send + Sync + 'static,
    E: Event,
    R: HandlerReturn,
{
    fn post(&self, event: &mut dyn Event) -> Result<(), InvocationError> {
        let event = downcast_event::<E>(event)?;
        (self.handler)(&self.owner, event)
            .into_result()
            .map_err(InvocationError::Handler)
    }
}

impl<O, E, R> fmt::Debug for InstanceAdapter<O, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceAdapter")
            .field("owner", &type_name::<O>())
            .field("method", &self.name)
            .finish_non_exhaustive()
    }
}

/// Adapter for an associated function.
pub struct StaticAdapter<E, R> {
    handler: fn(&mut E) -> R,
    name: &'static str,
}

impl<E, R> StaticAdapter<E, R> {
    pub(crate) fn new(handler: fn(&mut E) -> R, name: &'static str) -> Self {
        Self { handler, name }
    }
}

impl<E, R> EventListener for StaticAdapter<E, R>
where
    E: Event,
    R: HandlerReturn,
{
    fn post(&self, event: &mut dyn Event) -> Result<(), InvocationError> {
        let event = downcast_event::<E>(event)?;
        (self.handler)(event)
            .into_result()
            .map_err(InvocationError::Handler)
    }
}

impl<E, R> fmt::Debug for StaticAdapter<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticAdapter")
            .field("method", &self.name)
            .finish_non_exhaustive()
    }
}

/// Adapter around the pre-resolved by-name call of a dynamic method.
pub struct DynAdapter {
    owner: Option<Owner>,
    call: DynCall,
    name: &'static str,
    event_type: Option<EventType>,
}

impl EventListener for DynAdapter {
    fn post(&self, event: &mut dyn Event) -> Result<(), InvocationError> {
        let found = AsAny::type_key(&*event);
        if let Some(expected) = self.event_type
            && expected.key() != found
        {
            return Err(InvocationError::EventMismatch {
                expected: expected.key().name(),
                found: found.name(),
            });
        }
        let ret = (self.call)(self.owner.as_ref(), &mut [event.as_any_mut()])?;
        expect_unit(self.name, &*ret)
    }
}

impl fmt::Debug for DynAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynAdapter")
            .field("method", &self.name)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

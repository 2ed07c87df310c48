//! The event bus: registration surface and synchronous dispatch.

use std::any::{Any, type_name};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::check;
use crate::error::{HandlerError, InvocationError, RegistrationResult};
use crate::event::{Event, EventType, Projection, TypeKey};
use crate::handler::{ExceptionHandler, LogExceptionHandler};
use crate::invoke::{
    EventListener, FnListener, HandlerReturn, InvocationStrategy, ListenerFactory,
};
use crate::listener::{ListenerId, ListenerSpec, RegisteredListener};
use crate::method::{MethodTable, Owner, Receiver};
use crate::order::Order;
use crate::registry::ListenerList;
use crate::subscriber::Subscriber;

/// Handle to a registration, usable with [`EventBus::remove`].
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    listener: Arc<RegisteredListener>,
}

impl ListenerHandle {
    fn new(listener: Arc<RegisteredListener>) -> Self {
        Self { listener }
    }

    /// Id of the registration.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.listener.id()
    }

    /// The registered listener.
    #[must_use]
    pub fn listener(&self) -> &Arc<RegisteredListener> {
        &self.listener
    }
}

/// Synchronous event bus.
///
/// Events are delivered on the posting thread. For every post, listeners run
/// stage by stage ([`Order::ALL`]); within a stage the posted type's own
/// listeners come first, followed by those of its supertypes, each in
/// registration order. Filters see the posted event; supertype listeners
/// are handed the projected view. A failing listener is reported to the
/// exception handler together with the registry it was registered in, and
/// dispatch continues with the next one.
///
/// No lock is held while a listener runs, so listeners may post, register or
/// unregister on the same bus.
pub struct EventBus {
    lists: DashMap<TypeKey, Arc<ListenerList>>,
    tables: DashMap<TypeKey, Arc<MethodTable>>,
    factory: Arc<dyn ListenerFactory>,
    exception_handler: Arc<dyn ExceptionHandler>,
    catch_panics: bool,
}

impl EventBus {
    /// A bus with the compiled strategy, the logging exception handler and
    /// panic isolation.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    /// The factory used for subscriber methods.
    #[must_use]
    pub fn factory(&self) -> &Arc<dyn ListenerFactory> {
        &self.factory
    }

    /// Whether listener panics are caught and reported.
    #[must_use]
    pub fn catches_panics(&self) -> bool {
        self.catch_panics
    }

    /// Deliver `event` to every matching listener.
    pub fn post<E: Event>(&self, event: &mut E) {
        let list = self.list_for(EventType::of::<E>());
        self.dispatch(&list, event);
    }

    fn dispatch(&self, list: &Arc<ListenerList>, event: &mut dyn Event) {
        let chain = list.chain();
        trace!(event_type = %list.event_type(), links = chain.len(), "Posting event");

        for order in Order::ALL {
            for link in chain.iter() {
                let stage = link.list().snapshot(order);
                for listener in stage.iter() {
                    if !listener.accepts(event) {
                        trace!(
                            listener = %listener.name(),
                            filter = ?listener.filter(),
                            "Listener filtered out"
                        );
                        continue;
                    }
                    let Some(view) = link.project(event) else {
                        warn!(
                            event_type = %list.event_type(),
                            listener = %listener.name(),
                            "Projection rejected posted event"
                        );
                        continue;
                    };
                    if let Err(error) = self.invoke(listener, view) {
                        self.report(link.list(), listener, event, &error);
                    }
                }
            }
        }
    }

    fn invoke(
        &self,
        listener: &RegisteredListener,
        event: &mut dyn Event,
    ) -> Result<(), InvocationError> {
        if !self.catch_panics {
            return listener.invoke(event);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| listener.invoke(event))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                warn!(listener = %listener.name(), "Listener panicked");
                Err(InvocationError::Panicked(panic_message(payload.as_ref())))
            },
        }
    }

    fn report(
        &self,
        list: &ListenerList,
        listener: &RegisteredListener,
        event: &dyn Event,
        error: &InvocationError,
    ) {
        let handler = &self.exception_handler;
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| handler.handle(list, event, error)));
        if let Err(payload) = result {
            warn!(
                listener = %listener.name(),
                error = %error,
                panic = %panic_message(payload.as_ref()),
                "Exception handler panicked"
            );
        }
    }

    /// Register a prepared listener.
    pub fn register_listener(&self, listener: Arc<RegisteredListener>) {
        self.list_for(listener.event_type()).register(listener);
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn unregister_listener(&self, listener: &RegisteredListener) -> bool {
        self.existing_list(listener.event_type().key())
            .is_some_and(|list| list.unregister(listener))
    }

    /// Register a closure for events of type `E`.
    pub fn listen<E, F, R>(&self, spec: ListenerSpec, handler: F) -> ListenerHandle
    where
        E: Event,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
        R: HandlerReturn,
    {
        let target: Arc<dyn EventListener> = Arc::new(FnListener::new(handler));
        let listener = Arc::new(
            RegisteredListener::new(EventType::of::<E>(), spec, target)
                .with_name(type_name::<F>()),
        );
        self.register_listener(Arc::clone(&listener));
        ListenerHandle::new(listener)
    }

    /// Remove a registration. Returns `false` if it was already removed.
    pub fn remove(&self, handle: &ListenerHandle) -> bool {
        self.unregister_listener(&handle.listener)
    }

    /// Register every annotated instance method of `owner`.
    ///
    /// Either all handlers are registered or none are.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError`](crate::RegistrationError)
    /// raised while binding a handler.
    pub fn register<O: Subscriber>(
        &self,
        owner: Arc<O>,
    ) -> RegistrationResult<Vec<ListenerHandle>> {
        let owner: Owner = owner;
        self.register_methods::<O>(Some(&owner), Receiver::Instance)
    }

    /// Register every annotated associated function of `O`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError`](crate::RegistrationError)
    /// raised while binding a handler.
    pub fn register_static<O: Subscriber>(&self) -> RegistrationResult<Vec<ListenerHandle>> {
        self.register_methods::<O>(None, Receiver::Static)
    }

    fn register_methods<O: Subscriber>(
        &self,
        owner: Option<&Owner>,
        receiver: Receiver,
    ) -> RegistrationResult<Vec<ListenerHandle>> {
        let table = self.table::<O>();
        let mut staged = Vec::new();
        for method in table.handlers() {
            if method.info().receiver != receiver {
                continue;
            }
            let Some(spec) = method.spec() else {
                continue;
            };
            let event_type = check::validate(owner, method.info(), None)?;
            let target = self.factory.create(owner, &table, method, event_type)?;
            let mut listener =
                RegisteredListener::new(event_type, *spec, target).with_method(method.id());
            if let Some(owner) = owner {
                listener = listener.with_owner(Arc::clone(owner));
            }
            staged.push(Arc::new(listener));
        }

        for listener in &staged {
            self.register_listener(Arc::clone(listener));
        }
        debug!(
            subscriber = type_name::<O>(),
            receiver = ?receiver,
            listeners = staged.len(),
            "Subscriber registered"
        );
        Ok(staged.into_iter().map(ListenerHandle::new).collect())
    }

    /// Unregister every listener bound to `owner`. Returns how many were
    /// removed.
    pub fn unregister<O: Subscriber>(&self, owner: &Arc<O>) -> usize {
        let target = Arc::as_ptr(owner).cast::<()>();
        let removed = self.unregister_where(|listener| listener.is_owned_by(target));
        debug!(subscriber = type_name::<O>(), removed, "Subscriber unregistered");
        removed
    }

    /// Unregister every associated-function listener declared by `O`.
    pub fn unregister_static<O: Subscriber>(&self) -> usize {
        let declaring = TypeKey::of::<O>();
        let removed = self.unregister_where(|listener| {
            listener.owner().is_none()
                && listener
                    .method()
                    .is_some_and(|method| method.declaring() == declaring)
        });
        debug!(subscriber = type_name::<O>(), removed, "Static subscriber unregistered");
        removed
    }

    fn unregister_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&RegisteredListener) -> bool,
    {
        self.all_lists()
            .iter()
            .map(|list| list.unregister_where(&predicate))
            .fold(0_usize, usize::saturating_add)
    }

    /// The registry for `E`, created if needed.
    #[must_use]
    pub fn listeners<E: Event>(&self) -> Arc<ListenerList> {
        self.list_for(EventType::of::<E>())
    }

    /// Total number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.all_lists().iter().map(|list| list.len()).sum()
    }

    /// Number of registries created so far.
    #[must_use]
    pub fn registry_count(&self) -> usize {
        self.lists.len()
    }

    /// Drop every registry and cached method table.
    pub fn clear(&self) {
        let lists = self.all_lists();
        self.lists.clear();
        self.tables.clear();
        for list in &lists {
            list.detach();
        }
        drop(lists);
        debug!("Event bus cleared");
    }

    fn all_lists(&self) -> Vec<Arc<ListenerList>> {
        self.lists
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn existing_list(&self, key: TypeKey) -> Option<Arc<ListenerList>> {
        self.lists.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    fn table<O: Subscriber>(&self) -> Arc<MethodTable> {
        let key = TypeKey::of::<O>();
        if let Some(table) = self.tables.get(&key) {
            return Arc::clone(table.value());
        }
        let table = Arc::new(MethodTable::of::<O>());
        Arc::clone(self.tables.entry(key).or_insert(table).value())
    }

    fn list_for(&self, event_type: EventType) -> Arc<ListenerList> {
        let mut visiting = Vec::new();
        self.resolve(event_type, &mut visiting)
    }

    fn resolve(&self, event_type: EventType, visiting: &mut Vec<TypeKey>) -> Arc<ListenerList> {
        let key = event_type.key();
        if let Some(list) = self.existing_list(key) {
            return list;
        }

        visiting.push(key);
        let mut parents: Vec<(Arc<ListenerList>, Projection)> = Vec::new();
        for supertype in event_type.supertypes() {
            let parent = supertype.parent();
            if visiting.contains(&parent.key()) {
                warn!(
                    event_type = %event_type,
                    parent = %parent,
                    "Ignoring cyclic supertype declaration"
                );
                continue;
            }
            parents.push((self.resolve(parent, visiting), supertype.projection()));
        }
        visiting.pop();

        // Linked before publication so no post sees a partial hierarchy.
        let candidate = Arc::new(ListenerList::new(event_type));
        for (parent, projection) in &parents {
            candidate.add_parent(parent, *projection);
        }
        let list = Arc::clone(self.lists.entry(key).or_insert(candidate).value());
        trace!(event_type = %event_type, parents = parents.len(), "Registry resolved");
        list
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("registries", &self.lists.len())
            .field("listener_count", &self.listener_count())
            .field("catch_panics", &self.catch_panics)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder for [`EventBus`].
pub struct EventBusBuilder {
    strategy: InvocationStrategy,
    factory: Option<Arc<dyn ListenerFactory>>,
    exception_handler: Arc<dyn ExceptionHandler>,
    catch_panics: bool,
}

impl EventBusBuilder {
    /// Defaults: compiled strategy, logging exception handler, panics caught.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategy: InvocationStrategy::default(),
            factory: None,
            exception_handler: Arc::new(LogExceptionHandler),
            catch_panics: true,
        }
    }

    /// Select the invocation strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: InvocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Use a specific factory instance. Overrides the strategy.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn ListenerFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the exception handler.
    #[must_use]
    pub fn with_exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.exception_handler = Arc::new(handler);
        self
    }

    /// Set a shared exception handler.
    #[must_use]
    pub fn with_shared_exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exception_handler = handler;
        self
    }

    /// Whether listener panics are caught and reported as
    /// [`InvocationError::Panicked`]. When off, a panic unwinds out of
    /// [`EventBus::post`].
    #[must_use]
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    /// Build the bus.
    #[must_use]
    pub fn build(self) -> EventBus {
        let factory = self.factory.unwrap_or_else(|| self.strategy.factory());
        EventBus {
            lists: DashMap::new(),
            tables: DashMap::new(),
            factory,
            exception_handler: self.exception_handler,
            catch_panics: self.catch_panics,
        }
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("strategy", &self.strategy)
            .field("custom_factory", &self.factory.is_some())
            .field("catch_panics", &self.catch_panics)
            .finish_non_exhaustive()
    }
}

/// Turn a closure result into a [`HandlerError`].
///
/// ```rust
/// use courier_events::{Event, EventBus, HandlerError, ListenerSpec, handler_error};
///
/// struct Ping;
/// impl Event for Ping {}
///
/// let bus = EventBus::new();
/// bus.listen(ListenerSpec::new(), |_: &mut Ping| -> Result<(), HandlerError> {
///     Err(handler_error("unavailable"))
/// });
/// bus.post(&mut Ping);
/// ```
#[must_use]
pub fn handler_error(message: impl Into<String>) -> HandlerError {
    message.into().into()
}

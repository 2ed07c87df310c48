//! Method descriptors.
//!
//! A [`Method`] is the runtime description of one function declared by a
//! subscriber type: its signature ([`MethodInfo`]), an optional listener
//! annotation ([`ListenerSpec`]), a by-name dynamic call entry and, for
//! methods built from typed function pointers, an adapter constructor that
//! binds the function directly.
//!
//! [`Method::instance`] and [`Method::associated`] cover ordinary Rust
//! handlers. [`Method::dynamic`] describes arbitrary shapes, for plugin or
//! scripting surfaces that only offer a by-name call.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::InvocationError;
use crate::event::{Event, EventType, TypeKey};
use crate::invoke::compiled::{InstanceAdapter, StaticAdapter};
use crate::invoke::{EventListener, HandlerReturn};
use crate::listener::ListenerSpec;
use crate::subscriber::Subscriber;

/// A type-erased subscriber instance.
pub type Owner = Arc<dyn Any + Send + Sync>;

/// By-name call entry: optional owner plus argument slice to a boxed return
/// value.
pub type DynCall = Arc<
    dyn Fn(Option<&Owner>, &mut [&mut dyn Any]) -> Result<Box<dyn Any>, InvocationError>
        + Send
        + Sync,
>;

/// Adapter constructor: binds an owner (or nothing, for associated
/// functions) into a ready invocation target.
pub type AdapterFn = Arc<dyn Fn(Option<&Owner>) -> Option<Arc<dyn EventListener>> + Send + Sync>;

pub(crate) fn dyn_call<F>(call: F) -> DynCall
where
    F: Fn(Option<&Owner>, &mut [&mut dyn Any]) -> Result<Box<dyn Any>, InvocationError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(call)
}

pub(crate) fn adapter_fn<F>(adapter: F) -> AdapterFn
where
    F: Fn(Option<&Owner>) -> Option<Arc<dyn EventListener>> + Send + Sync + 'static,
{
    Arc::new(adapter)
}

/// How a method receives its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// Takes `&self`.
    Instance,
    /// Associated function, no receiver.
    Static,
}

/// Whether the bus may call a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Callable from the bus.
    #[default]
    Public,
    /// Internal to the declaring type.
    Private,
}

/// What a method returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// `()`.
    Unit,
    /// `Result<(), E>`.
    Fallible,
    /// Any other value, by type name.
    Value(&'static str),
}

/// Type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// An event type.
    Event(EventType),
    /// Any other type.
    Value(TypeKey),
}

impl ParamType {
    /// Type name of the parameter.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Event(event_type) => event_type.key().name(),
            ParamType::Value(key) => key.name(),
        }
    }

    /// The event type, if the parameter is one.
    #[must_use]
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            ParamType::Event(event_type) => Some(*event_type),
            ParamType::Value(_) => None,
        }
    }
}

/// Identity of a method: declaring type plus name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId {
    declaring: TypeKey,
    name: &'static str,
}

impl MethodId {
    /// Create a method id.
    #[must_use]
    pub fn new(declaring: TypeKey, name: &'static str) -> Self {
        Self { declaring, name }
    }

    /// The declaring type.
    #[must_use]
    pub fn declaring(&self) -> TypeKey {
        self.declaring
    }

    /// The method name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.name)
    }
}

/// Signature of a method, plus its listener annotation if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// The declaring type.
    pub declaring: TypeKey,
    /// Method name.
    pub name: &'static str,
    /// How the method receives its owner.
    pub receiver: Receiver,
    /// Whether the bus may call it.
    pub visibility: Visibility,
    /// Declared parameters, excluding the receiver.
    pub params: Vec<ParamType>,
    /// Return type.
    pub returns: ReturnKind,
    /// Listener annotation.
    pub listener: Option<ListenerSpec>,
}

impl MethodInfo {
    /// A public instance method with no parameters returning unit.
    #[must_use]
    pub fn new(declaring: TypeKey, name: &'static str) -> Self {
        Self {
            declaring,
            name,
            receiver: Receiver::Instance,
            visibility: Visibility::Public,
            params: Vec::new(),
            returns: ReturnKind::Unit,
            listener: None,
        }
    }

    /// Set the receiver.
    #[must_use]
    pub fn with_receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = receiver;
        self
    }

    /// Set the visibility.
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Append a parameter.
    #[must_use]
    pub fn with_param(mut self, param: ParamType) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return kind.
    #[must_use]
    pub fn with_returns(mut self, returns: ReturnKind) -> Self {
        self.returns = returns;
        self
    }

    /// Attach a listener annotation.
    #[must_use]
    pub fn with_listener(mut self, spec: ListenerSpec) -> Self {
        self.listener = Some(spec);
        self
    }

    /// Identity of the method.
    #[must_use]
    pub fn id(&self) -> MethodId {
        MethodId::new(self.declaring, self.name)
    }
}

/// A method of a subscriber type.
#[derive(Clone)]
pub struct Method {
    info: MethodInfo,
    call: DynCall,
    adapter: Option<AdapterFn>,
}

impl Method {
    /// Describe an instance method `fn(&O, &mut E) -> R`.
    #[must_use]
    pub fn instance<O, E, R>(name: &'static str, handler: fn(&O, &mut E) -> R) -> Self
    where
        O: Send + Sync + 'static,
        E: Event,
        R: HandlerReturn,
    {
        let info = MethodInfo::new(TypeKey::of::<O>(), name)
            .with_param(ParamType::Event(EventType::of::<E>()))
            .with_returns(R::KIND);

        let call = dyn_call(move |owner, args| {
            let owner = owner
                .and_then(|owner| Arc::clone(owner).downcast::<O>().ok())
                .ok_or(InvocationError::OwnerMismatch(name))?;
            let event = single_arg::<E>(name, args)?;
            handler(&owner, event)
                .into_result()
                .map_err(InvocationError::Handler)?;
            let unit: Box<dyn Any> = Box::new(());
            Ok(unit)
        });

        let adapter = adapter_fn(move |owner| {
            let owner = Arc::clone(owner?).downcast::<O>().ok()?;
            let listener: Arc<dyn EventListener> =
                Arc::new(InstanceAdapter::new(owner, handler, name));
            Some(listener)
        });

        Self {
            info,
            call,
            adapter: Some(adapter),
        }
    }

    /// Describe an associated function `fn(&mut E) -> R` declared by `O`.
    #[must_use]
    pub fn associated<O, E, R>(name: &'static str, handler: fn(&mut E) -> R) -> Self
    where
        O: 'static,
        E: Event,
        R: HandlerReturn,
    {
        let info = MethodInfo::new(TypeKey::of::<O>(), name)
            .with_receiver(Receiver::Static)
            .with_param(ParamType::Event(EventType::of::<E>()))
            .with_returns(R::KIND);

        let call = dyn_call(move |_owner, args| {
            let event = single_arg::<E>(name, args)?;
            handler(event)
                .into_result()
                .map_err(InvocationError::Handler)?;
            let unit: Box<dyn Any> = Box::new(());
            Ok(unit)
        });

        let adapter = adapter_fn(move |_owner| {
            let listener: Arc<dyn EventListener> = Arc::new(StaticAdapter::new(handler, name));
            Some(listener)
        });

        Self {
            info,
            call,
            adapter: Some(adapter),
        }
    }

    /// Describe a method reachable only through a by-name call.
    ///
    /// `info` is trusted as the signature; the call receives the owner (if
    /// bound) and the argument slice, and surfaces handler failures as
    /// [`InvocationError::Handler`].
    #[must_use]
    pub fn dynamic<F>(info: MethodInfo, call: F) -> Self
    where
        F: Fn(Option<&Owner>, &mut [&mut dyn Any]) -> Result<Box<dyn Any>, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            info,
            call: dyn_call(call),
            adapter: None,
        }
    }

    /// Mark the method as a listener.
    #[must_use]
    pub fn with_listener(mut self, spec: ListenerSpec) -> Self {
        self.info.listener = Some(spec);
        self
    }

    /// Set the visibility.
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.info.visibility = visibility;
        self
    }

    /// Signature of the method.
    #[must_use]
    pub fn info(&self) -> &MethodInfo {
        &self.info
    }

    /// Identity of the method.
    #[must_use]
    pub fn id(&self) -> MethodId {
        self.info.id()
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Listener annotation, if the method is a handler.
    #[must_use]
    pub fn spec(&self) -> Option<&ListenerSpec> {
        self.info.listener.as_ref()
    }

    /// The by-name call entry.
    #[must_use]
    pub fn call(&self) -> &DynCall {
        &self.call
    }

    /// The typed adapter constructor, if the method has one.
    #[must_use]
    pub fn adapter(&self) -> Option<&AdapterFn> {
        self.adapter.as_ref()
    }

    /// Call the method by name.
    ///
    /// # Errors
    ///
    /// Returns whatever the call entry reports: owner or argument mismatches,
    /// or the handler's own failure.
    pub fn invoke(
        &self,
        owner: Option<&Owner>,
        args: &mut [&mut dyn Any],
    ) -> Result<Box<dyn Any>, InvocationError> {
        (self.call)(owner, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("info", &self.info)
            .field("adapter", &self.adapter.is_some())
            .finish_non_exhaustive()
    }
}

fn single_arg<'a, E: Event>(
    name: &'static str,
    args: &'a mut [&mut dyn Any],
) -> Result<&'a mut E, InvocationError> {
    match args {
        [arg] => arg
            .downcast_mut::<E>()
            .ok_or(InvocationError::ArgumentMismatch { method: name }),
        _ => Err(InvocationError::ArgumentMismatch { method: name }),
    }
}

/// The methods of one subscriber type, in declaration order, with lookup by
/// name.
///
/// When two methods share a name, lookup returns the first; neither can be
/// registered as a handler.
#[derive(Debug)]
pub struct MethodTable {
    owner: TypeKey,
    methods: Vec<Method>,
    by_name: HashMap<&'static str, usize>,
    shared: HashSet<&'static str>,
}

impl MethodTable {
    /// Build a table for `owner` from its methods.
    #[must_use]
    pub fn new(owner: TypeKey, methods: Vec<Method>) -> Self {
        let mut by_name = HashMap::with_capacity(methods.len());
        let mut shared = HashSet::new();
        for (index, method) in methods.iter().enumerate() {
            match by_name.entry(method.name()) {
                Entry::Vacant(slot) => {
                    slot.insert(index);
                },
                Entry::Occupied(_) => {
                    shared.insert(method.name());
                },
            }
        }
        Self {
            owner,
            methods,
            by_name,
            shared,
        }
    }

    /// Build the table of a subscriber type.
    #[must_use]
    pub fn of<O: Subscriber>() -> Self {
        Self::new(TypeKey::of::<O>(), O::methods())
    }

    /// The owner type.
    #[must_use]
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Look a method up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.by_name
            .get(name)
            .and_then(|&index| self.methods.get(index))
    }

    /// Whether more than one method is declared under `name`.
    #[must_use]
    pub fn is_shared(&self, name: &str) -> bool {
        self.shared.contains(name)
    }

    /// All methods, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    /// Methods carrying a listener annotation, in declaration order.
    pub fn handlers(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|method| method.spec().is_some())
    }

    /// Signatures of all methods.
    #[must_use]
    pub fn infos(&self) -> Vec<MethodInfo> {
        self.methods.iter().map(|method| method.info().clone()).collect()
    }

    /// Number of methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table has no methods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;

    struct Ping {
        hits: u32,
    }
    impl Event for Ping {}

    struct Other;
    impl Event for Other {}

    struct Counter {
        step: u32,
    }

    impl Counter {
        fn on_ping(&self, ping: &mut Ping) {
            ping.hits = ping.hits.saturating_add(self.step);
        }

        fn reset(ping: &mut Ping) -> Result<(), HandlerError> {
            if ping.hits > 100 {
                return Err("too many hits".into());
            }
            ping.hits = 0;
            Ok(())
        }
    }

    impl Subscriber for Counter {
        fn methods() -> Vec<Method> {
            vec![
                Method::instance("on_ping", Counter::on_ping).with_listener(ListenerSpec::new()),
                Method::associated::<Counter, _, _>("reset", Counter::reset),
            ]
        }
    }

    #[test]
    fn test_instance_info() {
        let method = Method::instance("on_ping", Counter::on_ping);
        let info = method.info();
        assert_eq!(info.declaring, TypeKey::of::<Counter>());
        assert_eq!(info.receiver, Receiver::Instance);
        assert_eq!(info.visibility, Visibility::Public);
        assert_eq!(info.params, vec![ParamType::Event(EventType::of::<Ping>())]);
        assert_eq!(info.returns, ReturnKind::Unit);
        assert!(method.adapter().is_some());
        assert!(method.id().to_string().ends_with("Counter::on_ping"));
    }

    #[test]
    fn test_associated_info() {
        let method = Method::associated::<Counter, _, _>("reset", Counter::reset);
        assert_eq!(method.info().receiver, Receiver::Static);
        assert_eq!(method.info().returns, ReturnKind::Fallible);
    }

    #[test]
    fn test_invoke_instance_by_name() {
        let method = Method::instance("on_ping", Counter::on_ping);
        let owner: Owner = Arc::new(Counter { step: 2 });
        let mut ping = Ping { hits: 1 };

        let ret = method.invoke(Some(&owner), &mut [&mut ping]).unwrap();
        assert!((*ret).is::<()>());
        assert_eq!(ping.hits, 3);
    }

    #[test]
    fn test_invoke_rejects_wrong_owner_and_arguments() {
        let method = Method::instance("on_ping", Counter::on_ping);
        let wrong: Owner = Arc::new(5_u8);
        let mut ping = Ping { hits: 0 };
        assert!(matches!(
            method.invoke(Some(&wrong), &mut [&mut ping]),
            Err(InvocationError::OwnerMismatch("on_ping"))
        ));
        assert!(matches!(
            method.invoke(None, &mut [&mut ping]),
            Err(InvocationError::OwnerMismatch(_))
        ));

        let owner: Owner = Arc::new(Counter { step: 1 });
        assert!(matches!(
            method.invoke(Some(&owner), &mut [&mut Other]),
            Err(InvocationError::ArgumentMismatch { method: "on_ping" })
        ));
        assert!(matches!(
            method.invoke(Some(&owner), &mut []),
            Err(InvocationError::ArgumentMismatch { .. })
        ));
    }

    #[test]
    fn test_invoke_surfaces_handler_error() {
        let method = Method::associated::<Counter, _, _>("reset", Counter::reset);
        let mut ping = Ping { hits: 500 };
        let err = method.invoke(None, &mut [&mut ping]).unwrap_err();
        assert!(matches!(err, InvocationError::Handler(_)));
        assert_eq!(ping.hits, 500);
    }

    #[test]
    fn test_dynamic_method_returns_value() {
        let info = MethodInfo::new(TypeKey::of::<Counter>(), "describe")
            .with_returns(ReturnKind::Value("String"));
        let method = Method::dynamic(info, |_owner, _args| {
            let value: Box<dyn Any> = Box::new(String::from("counter"));
            Ok(value)
        });
        assert!(method.adapter().is_none());
        let ret = method.invoke(None, &mut []).unwrap();
        assert_eq!(ret.downcast_ref::<String>().map(String::as_str), Some("counter"));
    }

    #[test]
    fn test_method_table_lookup_and_handlers() {
        let table = MethodTable::of::<Counter>();
        assert_eq!(table.owner(), TypeKey::of::<Counter>());
        assert_eq!(table.len(), 2);
        assert!(table.get("reset").is_some());
        assert!(table.get("missing").is_none());

        let handlers: Vec<_> = table.handlers().map(Method::name).collect();
        assert_eq!(handlers, vec!["on_ping"]);
    }

    #[test]
    fn test_method_table_first_duplicate_wins() {
        let table = MethodTable::new(
            TypeKey::of::<Counter>(),
            vec![
                Method::instance("on_ping", Counter::on_ping).with_listener(ListenerSpec::new()),
                Method::instance("on_ping", Counter::on_ping),
            ],
        );
        assert!(table.get("on_ping").unwrap().spec().is_some());
    }
}

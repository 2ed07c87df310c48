//! Listener shape checks.
//!
//! A handler method must take exactly one parameter, that parameter must be
//! an event type, the method must be public and must return `()` or
//! `Result<(), _>`, and its name must not be shared with another method of
//! the same type. Factories run [`unique`] and [`validate`] before binding a
//! method;
//! [`lint`] reports every violation of every annotated method at once, for
//! offline tooling.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;

use crate::error::{RegistrationError, RegistrationResult, ShapeViolation};
use crate::event::EventType;
use crate::method::{
    MethodId, MethodInfo, MethodTable, Owner, ParamType, Receiver, ReturnKind, Visibility,
};
use crate::subscriber::Subscriber;

/// A shape violation found by [`lint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The offending method.
    pub method: MethodId,
    /// What is wrong with it.
    pub violation: ShapeViolation,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.violation)
    }
}

/// Every signature-level violation of `info`, in a fixed order.
///
/// Receiver and registration-type checks are not included; they depend on
/// how the method is being registered.
#[must_use]
pub fn violations(info: &MethodInfo) -> Vec<ShapeViolation> {
    let mut found = Vec::new();
    match info.params.as_slice() {
        [ParamType::Event(_)] => {},
        [ParamType::Value(key)] => found.push(ShapeViolation::NotAnEvent(key.name())),
        params => found.push(ShapeViolation::ParameterCount(params.len())),
    }
    if info.visibility != Visibility::Public {
        found.push(ShapeViolation::NotPublic);
    }
    if let ReturnKind::Value(name) = info.returns {
        found.push(ShapeViolation::NonUnitReturn(name));
    }
    found
}

/// Check that `info` can be registered with the given receiver, for
/// `expected` if set.
///
/// Returns the event type of the method's parameter.
///
/// # Errors
///
/// Returns the first violation found.
pub fn check_shape(
    info: &MethodInfo,
    receiver: Receiver,
    expected: Option<EventType>,
) -> Result<EventType, ShapeViolation> {
    let event_type = match info.params.as_slice() {
        [ParamType::Event(event_type)] => *event_type,
        [ParamType::Value(key)] => return Err(ShapeViolation::NotAnEvent(key.name())),
        params => return Err(ShapeViolation::ParameterCount(params.len())),
    };
    if let Some(expected) = expected
        && expected != event_type
    {
        return Err(ShapeViolation::EventMismatch {
            expected: expected.key().name(),
            found: event_type.key().name(),
        });
    }
    if info.visibility != Visibility::Public {
        return Err(ShapeViolation::NotPublic);
    }
    if let ReturnKind::Value(name) = info.returns {
        return Err(ShapeViolation::NonUnitReturn(name));
    }
    match (receiver, info.receiver) {
        (Receiver::Instance, Receiver::Static) => Err(ShapeViolation::StaticReceiver),
        (Receiver::Static, Receiver::Instance) => Err(ShapeViolation::InstanceReceiver),
        _ => Ok(event_type),
    }
}

/// Check that `info` can be bound to `owner` (or registered as an
/// associated function when `owner` is `None`).
///
/// # Errors
///
/// Returns [`RegistrationError::InvalidShape`] for a malformed method and
/// [`RegistrationError::OwnerMismatch`] when `owner` is not an instance of
/// the declaring type.
pub fn validate(
    owner: Option<&Owner>,
    info: &MethodInfo,
    expected: Option<EventType>,
) -> RegistrationResult<EventType> {
    let receiver = if owner.is_some() {
        Receiver::Instance
    } else {
        Receiver::Static
    };
    let event_type = check_shape(info, receiver, expected).map_err(|violation| {
        RegistrationError::InvalidShape {
            method: info.id(),
            violation,
        }
    })?;
    if let Some(owner) = owner {
        let instance: &(dyn Any + Send + Sync) = &**owner;
        if instance.type_id() != info.declaring.id() {
            return Err(RegistrationError::OwnerMismatch { method: info.id() });
        }
    }
    Ok(event_type)
}

/// Check that `info` is the only method of `table` under its name.
///
/// # Errors
///
/// Returns [`RegistrationError::InvalidShape`] with
/// [`ShapeViolation::DuplicateName`] otherwise.
pub fn unique(table: &MethodTable, info: &MethodInfo) -> RegistrationResult<()> {
    if table.is_shared(info.name) {
        return Err(RegistrationError::InvalidShape {
            method: info.id(),
            violation: ShapeViolation::DuplicateName,
        });
    }
    Ok(())
}

/// Report every violation of every method carrying a listener annotation.
#[must_use]
pub fn lint(methods: &[MethodInfo]) -> Vec<Diagnostic> {
    let mut names = HashSet::new();
    let shared: HashSet<&str> = methods
        .iter()
        .filter(|info| !names.insert(info.name))
        .map(|info| info.name)
        .collect();

    methods
        .iter()
        .filter(|info| info.listener.is_some())
        .flat_map(|info| {
            let mut found = violations(info);
            if shared.contains(info.name) {
                found.push(ShapeViolation::DuplicateName);
            }
            found.into_iter().map(|violation| Diagnostic {
                method: info.id(),
                violation,
            })
        })
        .collect()
}

/// [`lint`] the methods of a subscriber type.
#[must_use]
pub fn lint_subscriber<O: Subscriber>() -> Vec<Diagnostic> {
    lint(&MethodTable::of::<O>().infos())
}

//! Error types for listener registration and invocation.

use thiserror::Error;

use crate::method::MethodId;

/// Error returned by a handler body.
///
/// Any `std::error::Error + Send + Sync`, `String` or `&str` converts into it
/// with `?` or `.into()`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structural problems with a candidate handler method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeViolation {
    /// The method does not take exactly one parameter.
    #[error("takes {0} parameters but listeners take exactly one")]
    ParameterCount(usize),

    /// The single parameter is not an event type.
    #[error("parameter type `{0}` is not an event")]
    NotAnEvent(&'static str),

    /// The parameter is an event, but not the one being registered for.
    #[error("parameter type `{found}` does not match registered event `{expected}`")]
    EventMismatch {
        /// Event type of the registration.
        expected: &'static str,
        /// Event type the method accepts.
        found: &'static str,
    },

    /// The method cannot be called from the bus.
    #[error("method is not public")]
    NotPublic,

    /// The method returns a value.
    #[error("returns `{0}` but listeners return `()` or `Result<(), _>`")]
    NonUnitReturn(&'static str),

    /// An associated function was offered together with an owner instance.
    #[error("associated function cannot be bound to an owner")]
    StaticReceiver,

    /// An instance method was offered without an owner instance.
    #[error("instance method needs an owner")]
    InstanceReceiver,

    /// Another method of the declaring type has the same name.
    #[error("name is shared with another method of the same type")]
    DuplicateName,
}

/// Errors raised while turning a handler method into a listener.
///
/// A failed registration leaves the bus unchanged.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The handler method has the wrong shape.
    #[error(
        "invalid listener {method}: {violation}; expected `fn(&self, &mut impl Event)` \
         or `fn(&mut impl Event)` returning `()` or `Result<(), _>`"
    )]
    InvalidShape {
        /// The offending method.
        method: MethodId,
        /// What is wrong with it.
        violation: ShapeViolation,
    },

    /// The supplied owner is not an instance of the declaring type.
    #[error("owner cannot be bound to {method}: not an instance of `{}`", .method.declaring())]
    OwnerMismatch {
        /// The method being bound.
        method: MethodId,
    },
}

/// Errors raised while invoking a listener.
///
/// These are delivered to the bus's exception handler; they never abort a
/// dispatch pass.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The handler body returned an error.
    #[error("handler failed: {0}")]
    Handler(HandlerError),

    /// The handler body panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The listener received an event of a type it was not built for.
    #[error("listener for `{expected}` received `{found}`")]
    EventMismatch {
        /// Event type the listener expects.
        expected: &'static str,
        /// Event type that was delivered.
        found: &'static str,
    },

    /// A by-name call received an argument of the wrong type or count.
    #[error("arguments passed to `{method}` do not match its signature")]
    ArgumentMismatch {
        /// Name of the called method.
        method: &'static str,
    },

    /// A by-name call was bound to an owner of the wrong type.
    #[error("owner passed to `{0}` is missing or of the wrong type")]
    OwnerMismatch(&'static str),

    /// A by-name lookup found no method with the bound name.
    #[error("no method named `{0}`")]
    MissingMethod(&'static str),

    /// A by-name call returned a value where unit was expected.
    #[error("`{0}` returned a value instead of unit")]
    UnexpectedReturn(&'static str),
}

/// Errors raised by event capability accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The event does not expose the cancellable capability.
    #[error("cannot cancel `{0}`: event is not cancellable")]
    NotCancellable(&'static str),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TypeKey;

    struct Owner;

    #[test]
    fn test_invalid_shape_message_names_method_and_expected_shape() {
        let err = RegistrationError::InvalidShape {
            method: MethodId::new(TypeKey::of::<Owner>(), "on_join"),
            violation: ShapeViolation::ParameterCount(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("Owner::on_join"), "{msg}");
        assert!(msg.contains("takes 2 parameters"), "{msg}");
        assert!(msg.contains("expected"), "{msg}");
    }

    #[test]
    fn test_handler_error_from_str() {
        let err: HandlerError = "boom".into();
        assert_eq!(InvocationError::Handler(err).to_string(), "handler failed: boom");
    }
}

//! Exception handlers.

use tracing::error;

use crate::error::InvocationError;
use crate::event::Event;
use crate::registry::ListenerList;

/// Receives listener failures during dispatch.
///
/// Called once per failed invocation with the registry the failing listener
/// was registered in, the posted event and the error. For a listener on a
/// supertype that is the supertype's registry. Dispatch continues afterwards.
pub trait ExceptionHandler: Send + Sync {
    /// Handle a listener failure.
    fn handle(&self, list: &ListenerList, event: &dyn Event, error: &InvocationError);
}

impl<F> ExceptionHandler for F
where
    F: Fn(&ListenerList, &dyn Event, &InvocationError) + Send + Sync,
{
    fn handle(&self, list: &ListenerList, event: &dyn Event, error: &InvocationError) {
        self(list, event, error);
    }
}

/// Logs failures at error level. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExceptionHandler;

impl ExceptionHandler for LogExceptionHandler {
    fn handle(&self, list: &ListenerList, event: &dyn Event, error: &InvocationError) {
        error!(
            event_type = %list.event_type(),
            cancelled = event.is_cancelled(),
            error = %error,
            "Listener failed"
        );
    }
}

/// Discards failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreExceptionHandler;

impl ExceptionHandler for IgnoreExceptionHandler {
    fn handle(&self, _list: &ListenerList, _event: &dyn Event, _error: &InvocationError) {}
}

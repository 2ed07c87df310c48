//! Recorders for listener calls and failures.

use std::sync::{Arc, Mutex, PoisonError};

use courier_events::{AsAny, Event, ExceptionHandler, InvocationError, ListenerList, TypeKey};
use tracing::debug;

/// Shared, cloneable log of listener calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all entries.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// A closure listener that records `name` for every `E` it receives.
    #[must_use]
    pub fn recorder<E: Event>(&self, name: &str) -> impl Fn(&mut E) + Send + Sync + 'static {
        let log = self.clone();
        let name = name.to_owned();
        move |_: &mut E| log.record(name.clone())
    }
}

/// One failure seen by a [`RecordingExceptionHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Event type of the registry the failing listener was registered in.
    pub list: TypeKey,
    /// Concrete type of the posted event.
    pub event: TypeKey,
    /// Whether the event was cancelled when the failure was reported.
    pub cancelled: bool,
    /// Whether the listener panicked.
    pub panicked: bool,
    /// Rendered error.
    pub message: String,
}

/// Exception handler that keeps every failure for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingExceptionHandler {
    failures: Arc<Mutex<Vec<Failure>>>,
}

impl RecordingExceptionHandler {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All failures, oldest first.
    #[must_use]
    pub fn failures(&self) -> Vec<Failure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered error messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.failures().into_iter().map(|f| f.message).collect()
    }

    /// Number of failures.
    #[must_use]
    pub fn count(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ExceptionHandler for RecordingExceptionHandler {
    fn handle(&self, list: &ListenerList, event: &dyn Event, error: &InvocationError) {
        let failure = Failure {
            list: list.event_type().key(),
            event: AsAny::type_key(event),
            cancelled: event.is_cancelled(),
            panicked: matches!(error, InvocationError::Panicked(_)),
            message: error.to_string(),
        };
        debug!(event = %failure.event, error = %failure.message, "recorded listener failure");
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}

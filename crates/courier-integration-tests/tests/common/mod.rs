//! Shared helpers for integration tests.

use std::sync::Arc;

use courier_events::{CompiledListenerFactory, EventBus, InvocationStrategy};
use courier_test::{RecordingExceptionHandler, init_test_logging};

/// Both invocation strategies, for tests that must hold under either.
#[allow(dead_code)]
pub const STRATEGIES: [InvocationStrategy; 2] =
    [InvocationStrategy::Compiled, InvocationStrategy::Reflect];

/// A bus using `strategy` whose failures are recorded.
#[allow(dead_code)]
pub fn recording_bus(strategy: InvocationStrategy) -> (EventBus, RecordingExceptionHandler) {
    init_test_logging();
    let failures = RecordingExceptionHandler::new();
    let bus = EventBus::builder()
        .with_strategy(strategy)
        .with_exception_handler(failures.clone())
        .build();
    (bus, failures)
}

/// A bus built around a compiled factory the test can inspect.
#[allow(dead_code)]
pub fn compiled_bus() -> (EventBus, Arc<CompiledListenerFactory>) {
    init_test_logging();
    let factory = Arc::new(CompiledListenerFactory::new());
    let bus = EventBus::builder()
        .with_factory(Arc::clone(&factory) as _)
        .build();
    (bus, factory)
}

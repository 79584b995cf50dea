//! Injected timing capability.
//!
//! The facade asks its provider for a span around every statement
//! operation. The default provider is a no-op, so instrumentation costs
//! nothing unless the host wires in a real implementation.

/// Factory for timing spans, injected through `DatabaseOptions`.
pub trait TimingsProvider: Send + Sync {
    /// Create a (not yet started) span with the given name.
    fn of(&self, name: &str) -> Box<dyn DatabaseTiming>;
}

/// One started/stopped measurement span.
pub trait DatabaseTiming: Send {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Provider whose spans do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTimingsProvider;

impl TimingsProvider for NullTimingsProvider {
    fn of(&self, _name: &str) -> Box<dyn DatabaseTiming> {
        Box::new(NullTiming)
    }
}

/// Span that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTiming;

impl DatabaseTiming for NullTiming {
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

/// RAII handle over a started span; stops the span when dropped so timing
/// survives early returns and `?`.
pub struct TimingGuard {
    timing: Box<dyn DatabaseTiming>,
}

impl TimingGuard {
    pub(crate) fn start(mut timing: Box<dyn DatabaseTiming>) -> Self {
        timing.start();
        Self { timing }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        self.timing.stop();
    }
}

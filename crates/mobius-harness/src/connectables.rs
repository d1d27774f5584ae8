//! Stub effect handlers and views.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use mobius_core::{Connectable, Connection, ConnectionError, Consumer, Disposable};

/// Connection that ignores its inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConnection;

impl<I> Consumer<I> for NoopConnection {
    fn accept(&self, _value: I) {}
}

impl Disposable for NoopConnection {
    fn dispose(&self) {}
}

/// Connectable whose connections ignore their inputs and never emit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConnectable;

impl<I, O> Connectable<I, O> for NoopConnectable {
    fn connect(
        &self,
        _output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        Ok(Box::new(NoopConnection))
    }
}

type MapFn<I, O> = Arc<dyn Fn(I) -> Option<O> + Send + Sync>;

/// Connectable that synchronously turns each input into at most one output.
///
/// As an effect handler it emits the mapped event from inside `accept`,
/// which is the re-entrant case the event processor must handle without
/// recursion.
pub struct ForwardingConnectable<I, O> {
    map: MapFn<I, O>,
}

impl<T: 'static> ForwardingConnectable<T, T> {
    /// Emit every input unchanged.
    pub fn echo() -> Self {
        Self::mapping(Some)
    }
}

impl<I, O> ForwardingConnectable<I, O> {
    /// Emit `map(input)` for every input that maps to `Some`.
    pub fn mapping(map: impl Fn(I) -> Option<O> + Send + Sync + 'static) -> Self {
        Self { map: Arc::new(map) }
    }
}

impl<I, O> Clone for ForwardingConnectable<I, O> {
    fn clone(&self) -> Self {
        Self { map: Arc::clone(&self.map) }
    }
}

struct Forwarding<I, O> {
    map: MapFn<I, O>,
    output: Arc<dyn Consumer<O>>,
}

impl<I, O> Consumer<I> for Forwarding<I, O> {
    fn accept(&self, value: I) {
        if let Some(output) = (self.map)(value) {
            self.output.accept(output);
        }
    }
}

impl<I, O> Disposable for Forwarding<I, O> {
    fn dispose(&self) {}
}

impl<I, O> Connectable<I, O> for ForwardingConnectable<I, O>
where
    I: 'static,
    O: 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        Ok(Box::new(Forwarding { map: Arc::clone(&self.map), output }))
    }
}

/// Connectable whose connections emit one fixed value while being disposed.
///
/// Reproduces a collaborator whose teardown synchronously reports back, for
/// checking that a disposing loop drops such values.
pub struct EmitOnDisposeConnectable<O> {
    value: O,
    attempts: Arc<AtomicUsize>,
}

impl<O: Clone> EmitOnDisposeConnectable<O> {
    /// Emit `value` on dispose.
    pub fn new(value: O) -> Self {
        Self { value, attempts: Arc::new(AtomicUsize::new(0)) }
    }

    /// How many times a connection emitted on dispose.
    pub fn dispose_emissions(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    /// Shared counter behind [`dispose_emissions`](Self::dispose_emissions),
    /// for reading after the connectable has been moved into a loop.
    pub fn emissions_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

struct EmitOnDispose<O> {
    value: O,
    output: Arc<dyn Consumer<O>>,
    attempts: Arc<AtomicUsize>,
}

impl<I, O: Send + Sync> Consumer<I> for EmitOnDispose<O> {
    fn accept(&self, _value: I) {}
}

impl<O: Clone + Send + Sync> Disposable for EmitOnDispose<O> {
    fn dispose(&self) {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        self.output.accept(self.value.clone());
    }
}

impl<I, O> Connectable<I, O> for EmitOnDisposeConnectable<O>
where
    O: Clone + Send + Sync + 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        Ok(Box::new(EmitOnDispose {
            value: self.value.clone(),
            output,
            attempts: Arc::clone(&self.attempts),
        }))
    }
}

//! Collaborators that record what they receive.

use std::{
    fmt::Debug,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use mobius_core::{Connectable, Connection, ConnectionError, Consumer, Disposable};

/// Consumer that keeps every value it accepts.
///
/// Waiting is supported through [`wait_for_count`](Self::wait_for_count), so
/// it works as an observer for loops whose runners deliver on other threads.
pub struct RecordingConsumer<T> {
    values: Mutex<Vec<T>>,
    changed: Condvar,
}

impl<T> Default for RecordingConsumer<T> {
    fn default() -> Self {
        Self { values: Mutex::new(Vec::new()), changed: Condvar::new() }
    }
}

impl<T: Clone> RecordingConsumer<T> {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in arrival order.
    pub fn values(&self) -> Vec<T> {
        self.lock().clone()
    }

    /// Number of values recorded so far.
    pub fn value_count(&self) -> usize {
        self.lock().len()
    }

    /// Most recent value, if any.
    pub fn last(&self) -> Option<T> {
        self.lock().last().cloned()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Block until at least `count` values are recorded or `timeout` passes.
    ///
    /// Returns whether the count was reached.
    pub fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut values = self.lock();
        while values.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            values = self
                .changed
                .wait_timeout(values, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + PartialEq + Debug> RecordingConsumer<T> {
    /// Assert the recorded values equal `expected`, in order.
    #[track_caller]
    pub fn assert_values(&self, expected: &[T]) {
        assert_eq!(self.values(), expected);
    }
}

impl<T: Send> Consumer<T> for RecordingConsumer<T> {
    fn accept(&self, value: T) {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).push(value);
        self.changed.notify_all();
    }
}

/// Connection that records its inputs and whether it was disposed.
pub struct RecordingConnection<T> {
    recorder: RecordingConsumer<T>,
    disposed: AtomicBool,
}

impl<T> Default for RecordingConnection<T> {
    fn default() -> Self {
        Self { recorder: RecordingConsumer::default(), disposed: AtomicBool::new(false) }
    }
}

impl<T: Clone> RecordingConnection<T> {
    /// Fresh, undisposed connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything accepted so far.
    pub fn values(&self) -> Vec<T> {
        self.recorder.values()
    }

    /// Number of values accepted so far.
    pub fn value_count(&self) -> usize {
        self.recorder.value_count()
    }

    /// Block until at least `count` values arrive or `timeout` passes.
    pub fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        self.recorder.wait_for_count(count, timeout)
    }

    /// Whether `dispose` was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<T: Clone + PartialEq + Debug> RecordingConnection<T> {
    /// Assert the accepted values equal `expected`, in order.
    #[track_caller]
    pub fn assert_values(&self, expected: &[T]) {
        self.recorder.assert_values(expected);
    }
}

impl<T: Send> Consumer<T> for RecordingConnection<T> {
    fn accept(&self, value: T) {
        self.recorder.accept(value);
    }
}

impl<T: Send> Disposable for RecordingConnection<T> {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}

/// Shares one [`RecordingConnection`] with whoever connected.
struct SharedConnection<T>(Arc<RecordingConnection<T>>);

impl<T: Send> Consumer<T> for SharedConnection<T> {
    fn accept(&self, value: T) {
        self.0.accept(value);
    }
}

impl<T: Send> Disposable for SharedConnection<T> {
    fn dispose(&self) {
        self.0.dispose();
    }
}

/// Connectable for views and effect handlers under test.
///
/// Inputs are recorded on a shared [`RecordingConnection`]; the output
/// consumer handed to `connect` is captured so the test can emit through it
/// with [`emit`](Self::emit).
pub struct RecordingConnectable<I, O> {
    connection: Arc<RecordingConnection<I>>,
    output: Mutex<Option<Arc<dyn Consumer<O>>>>,
    connects: AtomicUsize,
    single: bool,
}

impl<I: Clone, O> RecordingConnectable<I, O> {
    /// Connectable that accepts any number of connections.
    pub fn new() -> Self {
        Self {
            connection: Arc::new(RecordingConnection::new()),
            output: Mutex::new(None),
            connects: AtomicUsize::new(0),
            single: false,
        }
    }

    /// Connectable that refuses a second connection while one is open.
    pub fn single_connection() -> Self {
        Self { single: true, ..Self::new() }
    }

    /// The shared connection every `connect` returns.
    pub fn connection(&self) -> Arc<RecordingConnection<I>> {
        Arc::clone(&self.connection)
    }

    /// How many times `connect` succeeded.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }

    /// Send `value` to the most recently connected output.
    ///
    /// Returns false if nothing has connected yet.
    pub fn emit(&self, value: O) -> bool {
        let output = self.output.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match output {
            Some(output) => {
                output.accept(value);
                true
            },
            None => false,
        }
    }
}

impl<I: Clone, O> Default for RecordingConnectable<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> Connectable<I, O> for RecordingConnectable<I, O>
where
    I: Clone + Send + 'static,
    O: 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        if self.single && self.connect_count() > 0 && !self.connection.is_disposed() {
            return Err(ConnectionError::LimitExceeded);
        }

        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
        self.connects.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(SharedConnection(Arc::clone(&self.connection))))
    }
}

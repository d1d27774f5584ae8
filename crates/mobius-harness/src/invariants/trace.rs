//! Recording of applied transitions.

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use mobius_core::{Next, Update};

/// One applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<M, E> {
    /// Position in application order, starting at 0.
    pub index: usize,
    /// Model the update function was given.
    pub before: M,
    /// Event applied.
    pub event: E,
    /// Model produced, if any.
    pub after: Option<M>,
}

/// Everything a [`LoopTrace`] knows at one point in time.
#[derive(Debug, Clone)]
pub struct TraceSnapshot<M, E> {
    /// Applied transitions, in order.
    pub transitions: Vec<Transition<M, E>>,
    /// Largest number of transitions ever observed running at once.
    pub max_concurrent: usize,
    /// Number of transitions applied when the loop was marked disposed.
    pub transitions_at_dispose: Option<usize>,
    /// Models seen by an observer, in delivery order. Empty if not recorded.
    pub observed_models: Vec<M>,
}

impl<M, E> TraceSnapshot<M, E> {
    /// Models produced by transitions, in order.
    pub fn produced_models(&self) -> impl Iterator<Item = &M> {
        self.transitions.iter().filter_map(|t| t.after.as_ref())
    }
}

/// Shared record of every transition a [`TracingUpdate`] applied.
pub struct LoopTrace<M, E> {
    transitions: Mutex<Vec<Transition<M, E>>>,
    running: AtomicUsize,
    max_concurrent: AtomicUsize,
    transitions_at_dispose: Mutex<Option<usize>>,
}

impl<M, E> Default for LoopTrace<M, E> {
    fn default() -> Self {
        Self {
            transitions: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            transitions_at_dispose: Mutex::new(None),
        }
    }
}

impl<M: Clone, E: Clone> LoopTrace<M, E> {
    /// Empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that the loop has been disposed; later transitions are
    /// violations.
    pub fn mark_disposed(&self) {
        let applied = self.transition_count();
        lock(&self.transitions_at_dispose).get_or_insert(applied);
    }

    /// Number of transitions applied so far.
    pub fn transition_count(&self) -> usize {
        lock(&self.transitions).len()
    }

    /// Snapshot without observed models.
    pub fn snapshot(&self) -> TraceSnapshot<M, E> {
        self.snapshot_with_observed(Vec::new())
    }

    /// Snapshot including the models an observer received.
    pub fn snapshot_with_observed(&self, observed_models: Vec<M>) -> TraceSnapshot<M, E> {
        TraceSnapshot {
            transitions: lock(&self.transitions).clone(),
            max_concurrent: self.max_concurrent.load(Ordering::Acquire),
            transitions_at_dispose: *lock(&self.transitions_at_dispose),
            observed_models,
        }
    }

    fn enter(&self) {
        let running = self.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_concurrent.fetch_max(running, Ordering::AcqRel);
    }

    fn exit(&self, before: M, event: E, after: Option<M>) {
        {
            let mut transitions = lock(&self.transitions);
            let index = transitions.len();
            transitions.push(Transition { index, before, event, after });
        }
        self.running.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Update function wrapper that records into a [`LoopTrace`].
pub struct TracingUpdate<M, E, F> {
    inner: Arc<dyn Update<M, E, F>>,
    trace: Arc<LoopTrace<M, E>>,
}

impl<M, E, F> TracingUpdate<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Wrap `inner`, recording into `trace`.
    pub fn new(inner: impl Update<M, E, F> + 'static, trace: Arc<LoopTrace<M, E>>) -> Self {
        Self { inner: Arc::new(inner), trace }
    }
}

impl<M, E, F> Update<M, E, F> for TracingUpdate<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn update(&self, model: &M, event: E) -> Next<M, F> {
        self.trace.enter();
        let next = self.inner.update(model, event.clone());
        self.trace.exit(model.clone(), event, next.model().cloned());
        next
    }
}

impl<M, E, F> fmt::Debug for TracingUpdate<M, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingUpdate").finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

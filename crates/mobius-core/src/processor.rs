//! Serializing event queue.
//!
//! Any thread may [`submit`](EventProcessor::submit) at any time. Exactly one
//! submitter at a time becomes the *worker*: it drains the queue batch by
//! batch, applying each event to the [`Store`] and handing the resulting model
//! and effects to the sinks before moving on. Everyone else appends to the
//! queue and returns immediately.
//!
//! # Invariants
//!
//! - At most one transition runs at any instant. The `busy` flag and the
//!   queue live under one mutex, and the mutex is never held while user code
//!   runs.
//! - Events are applied in the order they were queued.
//! - Re-entrant submissions (an effect handler that synchronously emits an
//!   event) never recurse: the worker is already busy, so the event is queued
//!   and picked up by the next batch. Stack depth stays constant no matter how
//!   long the chain of synchronous effects is.
//! - Init is applied before any event. The processor is created busy, so
//!   events submitted before [`start`](EventProcessor::start) (for example by
//!   an effect handler while it is being connected) are queued behind Init.
//! - Once disposal has begun, nothing more is applied: queued events are
//!   discarded, new submissions are dropped, and the worker stops between
//!   events of a batch.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, trace, warn};

use crate::{Consumer, Store};

/// Lifecycle of a processor. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting and applying events.
    Active,
    /// Disposal has begun; submissions are dropped.
    Disposing,
    /// Disposal has finished.
    Disposed,
}

/// Outcome of [`EventProcessor::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// The caller became the worker and drained the queue.
    Processed,
    /// Another worker is active and will apply the event.
    Queued,
    /// The processor is no longer active; the event was discarded.
    Dropped,
}

/// Where transition results go.
pub struct Sinks<M, F> {
    /// Receives every model a transition produces, Init's model included.
    pub model: Arc<dyn Consumer<M>>,
    /// Receives every effect, in order, after the model of the same
    /// transition.
    pub effect: Arc<dyn Consumer<F>>,
}

struct Queue<E> {
    events: Vec<E>,
    busy: bool,
    lifecycle: Lifecycle,
}

/// Serializes event application for one loop.
pub struct EventProcessor<M, E, F> {
    store: Store<M, E, F>,
    queue: Mutex<Queue<E>>,
    sinks: OnceLock<Sinks<M, F>>,
    name: Arc<str>,
}

impl<M, E, F> EventProcessor<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Create a processor around `store`.
    ///
    /// The processor starts out busy: submissions are queued until
    /// [`start`](Self::start) applies Init and drains them.
    pub fn new(store: Store<M, E, F>, name: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            queue: Mutex::new(Queue {
                events: Vec::new(),
                busy: true,
                lifecycle: Lifecycle::Active,
            }),
            sinks: OnceLock::new(),
            name: name.into(),
        }
    }

    /// Install the sinks, apply Init, then drain everything queued so far.
    ///
    /// Init's effects are followed by `initial_effects`. Calling `start`
    /// more than once has no effect beyond a warning.
    pub fn start(&self, sinks: Sinks<M, F>, initial_effects: Vec<F>) {
        if self.sinks.set(sinks).is_err() {
            warn!(loop_name = %self.name, "event processor already started");
            return;
        }

        // Takes over the busy flag set in `new`.
        let guard = BusyGuard { queue: &self.queue, released: false };

        let (model, mut effects) = self.store.init().into_parts();
        effects.extend(initial_effects);
        debug!(loop_name = %self.name, effects = effects.len(), "init applied");

        if self.is_active() {
            self.emit(Some(model), effects);
        }
        self.drain(guard);
    }

    /// Queue `event` and, if no worker is active, drain the queue on the
    /// calling thread.
    pub fn submit(&self, event: E) -> Submit {
        {
            let mut queue = self.lock();
            if queue.lifecycle != Lifecycle::Active {
                return Submit::Dropped;
            }
            queue.events.push(event);
            if queue.busy {
                return Submit::Queued;
            }
            queue.busy = true;
        }

        self.drain(BusyGuard { queue: &self.queue, released: false });
        Submit::Processed
    }

    /// Snapshot of the most recent model.
    pub fn model(&self) -> M {
        self.store.model()
    }

    fn drain(&self, mut guard: BusyGuard<'_, E>) {
        loop {
            let batch = {
                let mut queue = self.lock();
                if queue.lifecycle != Lifecycle::Active || queue.events.is_empty() {
                    queue.events.clear();
                    queue.busy = false;
                    guard.released = true;
                    return;
                }
                std::mem::take(&mut queue.events)
            };

            trace!(loop_name = %self.name, events = batch.len(), "draining batch");
            for event in batch {
                if !self.is_active() {
                    trace!(loop_name = %self.name, "disposal began mid-batch, dropping rest");
                    break;
                }
                let (model, effects) = self.store.update(event).into_parts();
                self.emit(model, effects);
            }
        }
    }

    fn emit(&self, model: Option<M>, effects: Vec<F>) {
        let Some(sinks) = self.sinks.get() else {
            warn!(loop_name = %self.name, "transition before start, results dropped");
            return;
        };

        if let Some(model) = model {
            sinks.model.accept(model);
        }
        for effect in effects {
            sinks.effect.accept(effect);
        }
    }
}

impl<M, E, F> EventProcessor<M, E, F> {
    /// Move from active to disposing and discard queued events.
    ///
    /// Returns false if disposal had already begun.
    pub fn begin_dispose(&self) -> bool {
        let mut queue = self.lock();
        if queue.lifecycle != Lifecycle::Active {
            return false;
        }
        queue.lifecycle = Lifecycle::Disposing;
        let discarded = std::mem::take(&mut queue.events).len();
        debug!(loop_name = %self.name, discarded, "disposal started");
        true
    }

    /// Mark disposal as finished.
    pub fn finish_dispose(&self) {
        self.lock().lifecycle = Lifecycle::Disposed;
        debug!(loop_name = %self.name, "disposed");
    }

    /// Current lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lock().lifecycle
    }

    /// Whether events are still being accepted.
    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// Label used in log records.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Queue<E>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears `busy` if the worker unwinds out of a transition, so a panicking
/// update function cannot wedge the processor.
struct BusyGuard<'a, E> {
    queue: &'a Mutex<Queue<E>>,
    released: bool,
}

impl<E> Drop for BusyGuard<'_, E> {
    fn drop(&mut self) {
        if !self.released {
            self.queue.lock().unwrap_or_else(PoisonError::into_inner).busy = false;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::Weak,
    };

    use super::*;
    use crate::{Next, Update};

    type TestProcessor = EventProcessor<String, &'static str, String>;

    fn processor() -> Arc<TestProcessor> {
        let update: Arc<dyn Update<String, &'static str, String>> =
            Arc::new(|model: &String, event: &'static str| -> Next<String, String> {
                if event == "boom" {
                    panic::panic_any("update failure");
                }
                Next::next_with(format!("{model}->{event}"), [event.to_string()])
            });
        Arc::new(EventProcessor::new(Store::new("init".to_string(), update, None), "test"))
    }

    fn recording_sink() -> (Arc<Mutex<Vec<String>>>, Arc<dyn Consumer<String>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |value: String| seen.lock().unwrap().push(value)
        };
        (seen, Arc::new(sink))
    }

    #[test]
    fn init_precedes_queued_events() {
        let processor = processor();
        assert_eq!(processor.submit("a"), Submit::Queued);
        assert_eq!(processor.submit("b"), Submit::Queued);

        let (models, model_sink) = recording_sink();
        let (effects, effect_sink) = recording_sink();
        processor.start(Sinks { model: model_sink, effect: effect_sink }, Vec::new());

        assert_eq!(*models.lock().unwrap(), vec!["init", "init->a", "init->a->b"]);
        assert_eq!(*effects.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn initial_effects_follow_init() {
        let processor = processor();
        let (_models, model_sink) = recording_sink();
        let (effects, effect_sink) = recording_sink();

        processor.start(Sinks { model: model_sink, effect: effect_sink }, vec!["start".into()]);
        assert_eq!(processor.submit("a"), Submit::Processed);

        assert_eq!(*effects.lock().unwrap(), vec!["start", "a"]);
    }

    #[test]
    fn submissions_after_dispose_are_dropped() {
        let processor = processor();
        let (models, model_sink) = recording_sink();
        let (_effects, effect_sink) = recording_sink();
        processor.start(Sinks { model: model_sink, effect: effect_sink }, Vec::new());

        assert!(processor.begin_dispose());
        assert!(!processor.begin_dispose());
        assert_eq!(processor.submit("late"), Submit::Dropped);
        processor.finish_dispose();

        assert_eq!(processor.lifecycle(), Lifecycle::Disposed);
        assert_eq!(*models.lock().unwrap(), vec!["init"]);
        assert_eq!(processor.model(), "init");
    }

    #[test]
    fn disposal_stops_worker_between_events() {
        let processor = processor();
        let handle: Arc<OnceLock<Weak<TestProcessor>>> = Arc::new(OnceLock::new());
        let _ = handle.set(Arc::downgrade(&processor));

        let models = Arc::new(Mutex::new(Vec::new()));
        let model_sink = {
            let models = Arc::clone(&models);
            let handle = Arc::clone(&handle);
            move |model: String| {
                if model.ends_with("->a")
                    && let Some(processor) = handle.get().and_then(Weak::upgrade)
                {
                    processor.begin_dispose();
                }
                models.lock().unwrap().push(model);
            }
        };
        let (_effects, effect_sink) = recording_sink();

        processor.submit("a");
        processor.submit("b");
        processor.start(Sinks { model: Arc::new(model_sink), effect: effect_sink }, Vec::new());

        assert_eq!(*models.lock().unwrap(), vec!["init", "init->a"]);
        assert_eq!(processor.model(), "init->a");
    }

    #[test]
    fn panicking_update_releases_worker() {
        let processor = processor();
        let (models, model_sink) = recording_sink();
        let (_effects, effect_sink) = recording_sink();
        processor.start(Sinks { model: model_sink, effect: effect_sink }, Vec::new());

        let result = panic::catch_unwind(AssertUnwindSafe(|| processor.submit("boom")));
        assert!(result.is_err());

        assert_eq!(processor.submit("a"), Submit::Processed);
        assert_eq!(*models.lock().unwrap(), vec!["init", "init->a"]);
    }

    #[test]
    fn second_start_is_ignored() {
        let processor = processor();
        let (models, model_sink) = recording_sink();
        let (_effects, effect_sink) = recording_sink();
        processor.start(Sinks { model: model_sink, effect: Arc::clone(&effect_sink) }, Vec::new());

        let (other, other_sink) = recording_sink();
        processor.start(Sinks { model: other_sink, effect: effect_sink }, Vec::new());

        assert_eq!(*models.lock().unwrap(), vec!["init"]);
        assert!(other.lock().unwrap().is_empty());
    }
}

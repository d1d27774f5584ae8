//! The running loop: wiring and teardown.
//!
//! A [`MobiusLoop`] owns an [`EventProcessor`], the effect handler's
//! connection, the event source subscription, the observer registry and two
//! work runners (model delivery and effect delivery).
//!
//! ```text
//!   dispatch_event / event source / effect handler output
//!                         |
//!                         v
//!                  EventProcessor --- Store.update
//!                    |          |
//!             model runner   effect runner
//!                    |          |
//!                observers   effect connection ---> events back in
//! ```
//!
//! # Disposal
//!
//! [`MobiusLoop::dispose`] stops the processor *before* it tells any
//! collaborator to release resources. An effect handler or event source that
//! emits from inside its own dispose therefore lands on an inert processor,
//! and the event is dropped as if it had never been emitted.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, Weak,
    atomic::{AtomicU64, Ordering},
};

use tracing::{debug, trace, warn};

use crate::{
    Connectable, Consumer, Disableable, DisableableConnectable, DisableableConnection,
    DisableableConsumer, Disposable, EventSource, LoopError, Store, WorkRunner,
    WorkRunnerFactory,
    dispatch::Dispatcher,
    processor::{EventProcessor, Lifecycle, Sinks, Submit},
    runner::isolate,
    update::{Init, Update},
};

/// Everything needed to start a loop.
pub(crate) struct LoopParts<M, E, F> {
    pub(crate) name: Arc<str>,
    pub(crate) model: M,
    pub(crate) initial_effects: Vec<F>,
    pub(crate) update: Arc<dyn Update<M, E, F>>,
    pub(crate) init: Option<Arc<dyn Init<M, F>>>,
    pub(crate) effect_handler: Arc<dyn Connectable<F, E>>,
    pub(crate) event_source: Arc<dyn EventSource<E>>,
    pub(crate) model_runner: WorkRunnerFactory,
    pub(crate) effect_runner: WorkRunnerFactory,
}

/// A running loop.
///
/// Dropping the loop disposes it.
pub struct MobiusLoop<M, E, F> {
    name: Arc<str>,
    processor: Arc<EventProcessor<M, E, F>>,
    observers: Arc<Observers<M>>,
    events: Arc<DisableableConsumer<E>>,
    model_dispatcher: Arc<Dispatcher<M>>,
    effect_dispatcher: Arc<Dispatcher<F>>,
    effect_connection: Arc<DisableableConnection<F>>,
    subscription: Box<dyn Disposable>,
    model_runner: Arc<dyn WorkRunner>,
    effect_runner: Arc<dyn WorkRunner>,
}

impl<M, E, F> MobiusLoop<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Wire collaborators together, then apply Init.
    ///
    /// Events emitted while the effect handler is being connected or the
    /// event source subscribed are queued and applied right after Init.
    pub(crate) fn start(parts: LoopParts<M, E, F>) -> Result<Self, LoopError> {
        let LoopParts {
            name,
            model,
            initial_effects,
            update,
            init,
            effect_handler,
            event_source,
            model_runner,
            effect_runner,
        } = parts;

        let model_runner = model_runner.create().map_err(runner_unavailable)?;
        let effect_runner = match effect_runner.create() {
            Ok(runner) => runner,
            Err(e) => {
                model_runner.dispose();
                return Err(runner_unavailable(e));
            },
        };

        let processor =
            Arc::new(EventProcessor::new(Store::new(model, update, init), Arc::clone(&name)));
        let events = Arc::new(DisableableConsumer::new(Arc::new(LoopEvents {
            processor: Arc::downgrade(&processor),
        }) as Arc<dyn Consumer<E>>));

        let effect_connection = match DisableableConnectable::new(effect_handler)
            .connect_guarded(Arc::clone(&events) as Arc<dyn Consumer<E>>)
        {
            Ok(connection) => Arc::new(connection),
            Err(e) => {
                warn!(loop_name = %name, error = %e, "effect handler refused connection");
                model_runner.dispose();
                effect_runner.dispose();
                return Err(e.into());
            },
        };

        let observers = Arc::new(Observers::default());
        let model_dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&model_runner),
            Arc::clone(&observers) as Arc<dyn Consumer<M>>,
            "model observer",
        ));
        let effect_dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&effect_runner),
            Arc::clone(&effect_connection) as Arc<dyn Consumer<F>>,
            "effect handler",
        ));

        let subscription = event_source.subscribe(Arc::clone(&events) as Arc<dyn Consumer<E>>);

        debug!(loop_name = %name, "loop starting");
        processor.start(
            Sinks {
                model: Arc::clone(&model_dispatcher) as Arc<dyn Consumer<M>>,
                effect: Arc::clone(&effect_dispatcher) as Arc<dyn Consumer<F>>,
            },
            initial_effects,
        );

        Ok(Self {
            name,
            processor,
            observers,
            events,
            model_dispatcher,
            effect_dispatcher,
            effect_connection,
            subscription,
            model_runner,
            effect_runner,
        })
    }

    /// Submit an event.
    ///
    /// Fails with [`LoopError::Disposed`] once disposal has begun.
    pub fn dispatch_event(&self, event: E) -> Result<(), LoopError> {
        match self.processor.submit(event) {
            Submit::Dropped => Err(LoopError::Disposed { operation: "dispatch_event" }),
            Submit::Processed | Submit::Queued => Ok(()),
        }
    }

    /// Register `observer` and replay the last delivered model to it.
    ///
    /// The replay happens synchronously on the calling thread. Models that
    /// are still queued on the model runner reach the observer afterwards,
    /// and a model older than one it has already seen is never delivered.
    /// Fails with [`LoopError::Disposed`] once disposal has begun.
    pub fn observe(&self, observer: Arc<dyn Consumer<M>>) -> Result<ObserverHandle, LoopError> {
        if !self.processor.is_active() {
            return Err(LoopError::Disposed { operation: "observe" });
        }

        let (entry, latest) = self.observers.add(observer);
        if let Some((seq, model)) = latest {
            entry.deliver(seq, model);
        }

        let id = entry.id;
        let observers = Arc::downgrade(&self.observers);
        Ok(ObserverHandle {
            cancel: Box::new(move || {
                if let Some(observers) = observers.upgrade() {
                    observers.remove(id);
                }
            }),
        })
    }

    /// Consumer that feeds events into this loop.
    ///
    /// Unlike [`dispatch_event`](Self::dispatch_event), it never fails: after
    /// disposal, events are dropped and logged.
    pub fn event_consumer(&self) -> Arc<dyn Consumer<E>> {
        Arc::clone(&self.events) as Arc<dyn Consumer<E>>
    }

    /// The last model the store held. Available in every state.
    pub fn most_recent_model(&self) -> M {
        self.processor.model()
    }

    /// Whether disposal has begun.
    pub fn is_disposed(&self) -> bool {
        self.processor.lifecycle() != Lifecycle::Active
    }

    /// Label attached to this loop's log records.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<M, E, F> MobiusLoop<M, E, F> {
    /// Stop the loop and release everything it holds.
    ///
    /// Safe to call more than once and from any thread, including from an
    /// observer or effect handler of this loop. Only the first call does
    /// anything.
    pub fn dispose(&self) {
        if !self.processor.begin_dispose() {
            return;
        }

        self.events.disable();
        self.model_dispatcher.disable();
        self.effect_dispatcher.disable();
        self.effect_connection.disable();
        self.observers.clear();

        isolate("event source dispose", || self.subscription.dispose());
        isolate("effect handler dispose", || self.effect_connection.dispose());

        self.model_runner.dispose();
        self.effect_runner.dispose();

        self.processor.finish_dispose();
    }
}

impl<M, E, F> Drop for MobiusLoop<M, E, F> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn runner_unavailable(err: std::io::Error) -> LoopError {
    LoopError::RunnerUnavailable(err.to_string())
}

/// Handle returned by [`MobiusLoop::observe`].
///
/// Dropping the handle keeps the observer registered; call
/// [`cancel`](Self::cancel) to remove it.
pub struct ObserverHandle {
    cancel: Box<dyn Fn() + Send + Sync>,
}

impl ObserverHandle {
    /// Unregister the observer. Idempotent.
    pub fn cancel(&self) {
        (self.cancel)();
    }
}

impl Disposable for ObserverHandle {
    fn dispose(&self) {
        self.cancel();
    }
}

/// Events from collaborators. Never fails: drops once the loop is inactive.
struct LoopEvents<M, E, F> {
    processor: Weak<EventProcessor<M, E, F>>,
}

impl<M, E, F> Consumer<E> for LoopEvents<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    fn accept(&self, event: E) {
        let Some(processor) = self.processor.upgrade() else {
            warn!("dropping event: loop is gone");
            return;
        };

        if processor.submit(event) == Submit::Dropped {
            match processor.lifecycle() {
                Lifecycle::Disposing => {
                    debug!(loop_name = processor.name(), "dropping event emitted during dispose");
                },
                Lifecycle::Active | Lifecycle::Disposed => {
                    warn!(loop_name = processor.name(), "dropping event: loop disposed");
                },
            }
        }
    }
}

/// One registered observer and the sequence number of the newest model it
/// has been handed.
struct ObserverEntry<M> {
    id: u64,
    observer: Arc<dyn Consumer<M>>,
    seen: AtomicU64,
}

impl<M> ObserverEntry<M> {
    fn deliver(&self, seq: u64, model: M) {
        if self.seen.fetch_max(seq, Ordering::AcqRel) >= seq {
            trace!(observer = self.id, seq, "skipping stale model");
            return;
        }
        isolate("model observer", || self.observer.accept(model));
    }
}

struct ObserverList<M> {
    next_id: u64,
    next_seq: u64,
    entries: Vec<Arc<ObserverEntry<M>>>,
    latest: Option<(u64, M)>,
}

/// Registered observers and the last model delivered to them.
///
/// Delivery snapshots the list so observers may register or cancel from
/// inside a callback. Sequence numbers are handed out under the list lock,
/// in delivery order; sequence 0 means "nothing seen yet".
struct Observers<M> {
    list: Mutex<ObserverList<M>>,
}

impl<M> Default for Observers<M> {
    fn default() -> Self {
        Self {
            list: Mutex::new(ObserverList {
                next_id: 0,
                next_seq: 0,
                entries: Vec::new(),
                latest: None,
            }),
        }
    }
}

impl<M: Clone> Observers<M> {
    /// Register `observer`, returning its entry and the model to replay.
    fn add(&self, observer: Arc<dyn Consumer<M>>) -> (Arc<ObserverEntry<M>>, Option<(u64, M)>) {
        let mut list = self.lock();
        let id = list.next_id;
        list.next_id += 1;
        let entry = Arc::new(ObserverEntry { id, observer, seen: AtomicU64::new(0) });
        list.entries.push(Arc::clone(&entry));
        trace!(observer = id, "observer registered");
        (entry, list.latest.clone())
    }
}

impl<M> Observers<M> {
    fn remove(&self, id: u64) {
        self.lock().entries.retain(|entry| entry.id != id);
    }

    fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, ObserverList<M>> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M: Clone + Send> Consumer<M> for Observers<M> {
    fn accept(&self, model: M) {
        let (seq, entries) = {
            let mut list = self.lock();
            list.next_seq += 1;
            let seq = list.next_seq;
            list.latest = Some((seq, model.clone()));
            (seq, list.entries.clone())
        };
        for entry in entries {
            entry.deliver(seq, model.clone());
        }
    }
}

//! External producers of events.
//!
//! An [`EventSource`] is subscribed once when a loop starts and its
//! subscription is disposed when the loop is disposed. It may emit from any
//! thread in between. Events it emits while being disposed are dropped.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{Consumer, Disposable};

/// Source of events for a loop.
pub trait EventSource<E>: Send + Sync {
    /// Start emitting into `consumer` until the returned handle is disposed.
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable>;
}

/// Source that never emits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

/// A source that never emits.
pub fn none() -> NoEvents {
    NoEvents
}

impl<E> EventSource<E> for NoEvents {
    fn subscribe(&self, _consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        Box::new(|| {})
    }
}

/// [`EventSource`] built from a subscribe closure. See [`from_fn`].
pub struct FnEventSource<S> {
    subscribe: S,
}

/// Build a source from a closure that starts emitting into the consumer and
/// returns the handle that stops it.
pub fn from_fn<E, S, D>(subscribe: S) -> FnEventSource<S>
where
    S: Fn(Arc<dyn Consumer<E>>) -> D + Send + Sync,
    D: Disposable + 'static,
{
    FnEventSource { subscribe }
}

impl<E, S, D> EventSource<E> for FnEventSource<S>
where
    S: Fn(Arc<dyn Consumer<E>>) -> D + Send + Sync,
    D: Disposable + 'static,
{
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        Box::new((self.subscribe)(consumer))
    }
}

/// Source that subscribes to several sources at once.
pub struct MergedEventSource<E> {
    sources: Vec<Arc<dyn EventSource<E>>>,
}

/// Merge `sources` into one. Disposing the merged subscription disposes
/// every underlying subscription.
pub fn merge<E>(
    sources: impl IntoIterator<Item = Arc<dyn EventSource<E>>>,
) -> MergedEventSource<E> {
    MergedEventSource { sources: sources.into_iter().collect() }
}

impl<E> EventSource<E> for MergedEventSource<E> {
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        let subscriptions =
            self.sources.iter().map(|source| source.subscribe(Arc::clone(&consumer))).collect();
        Box::new(CompositeDisposable { subscriptions: Mutex::new(subscriptions) })
    }
}

/// Disposes a group of handles, each exactly once.
struct CompositeDisposable {
    subscriptions: Mutex<Vec<Box<dyn Disposable>>>,
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        let subscriptions =
            std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner));
        for subscription in subscriptions {
            subscription.dispose();
        }
    }
}

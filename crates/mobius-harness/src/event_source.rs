//! Event source driven by the test.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use mobius_core::{Consumer, Disposable, EventSource};

struct Script<E> {
    subscriber: Mutex<Option<Arc<dyn Consumer<E>>>>,
    on_dispose: Option<E>,
    subscriptions: AtomicUsize,
}

/// Event source whose emissions are triggered by the test.
///
/// Clones share state: keep one clone, hand the other to the loop, and call
/// [`emit`](Self::emit) on yours. Optionally emits one more event from
/// inside its own subscription's `dispose`.
pub struct ScriptedEventSource<E> {
    script: Arc<Script<E>>,
}

impl<E> Clone for ScriptedEventSource<E> {
    fn clone(&self) -> Self {
        Self { script: Arc::clone(&self.script) }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for ScriptedEventSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync + 'static> ScriptedEventSource<E> {
    /// Source that emits only when told to.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Source that also emits `event` while its subscription is disposed.
    pub fn emitting_on_dispose(event: E) -> Self {
        Self::build(Some(event))
    }

    fn build(on_dispose: Option<E>) -> Self {
        Self {
            script: Arc::new(Script {
                subscriber: Mutex::new(None),
                on_dispose,
                subscriptions: AtomicUsize::new(0),
            }),
        }
    }

    /// Emit `event` to the current subscriber.
    ///
    /// Returns false if nobody is subscribed.
    pub fn emit(&self, event: E) -> bool {
        let subscriber = lock(&self.script.subscriber).clone();
        match subscriber {
            Some(subscriber) => {
                subscriber.accept(event);
                true
            },
            None => false,
        }
    }

    /// Whether a subscription is open.
    pub fn is_subscribed(&self) -> bool {
        lock(&self.script.subscriber).is_some()
    }

    /// How many times `subscribe` was called.
    pub fn subscription_count(&self) -> usize {
        self.script.subscriptions.load(Ordering::Acquire)
    }
}

impl<E: Clone + Send + Sync + 'static> EventSource<E> for ScriptedEventSource<E> {
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        *lock(&self.script.subscriber) = Some(consumer);
        self.script.subscriptions.fetch_add(1, Ordering::AcqRel);
        Box::new(Subscription { script: Arc::clone(&self.script) })
    }
}

struct Subscription<E> {
    script: Arc<Script<E>>,
}

impl<E: Clone + Send + Sync> Disposable for Subscription<E> {
    fn dispose(&self) {
        let Some(subscriber) = lock(&self.script.subscriber).take() else {
            return;
        };
        if let Some(event) = &self.script.on_dispose {
            subscriber.accept(event.clone());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingConsumer;

    #[test]
    fn emits_only_while_subscribed() {
        let source = ScriptedEventSource::emitting_on_dispose("last");
        let recorder = Arc::new(RecordingConsumer::new());

        assert!(!source.emit("early"));
        let subscription = source.subscribe(Arc::clone(&recorder) as Arc<dyn Consumer<&str>>);
        assert!(source.emit("one"));
        subscription.dispose();
        assert!(!source.emit("late"));
        subscription.dispose();

        recorder.assert_values(&["one", "last"]);
        assert_eq!(source.subscription_count(), 1);
        assert!(!source.is_subscribed());
    }
}

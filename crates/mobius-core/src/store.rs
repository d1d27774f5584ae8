//! Holder of the current model.
//!
//! The store applies the init and update functions and keeps the most recent
//! model. It does not serialize callers itself: the
//! [`EventProcessor`](crate::processor::EventProcessor) guarantees that only
//! its single active worker ever calls [`Store::init`] or [`Store::update`].
//! Reads through [`Store::model`] are allowed from any thread at any time.

use std::sync::{Arc, PoisonError, RwLock};

use crate::{First, Init, Next, Update};

/// Current model plus the functions that transform it.
pub struct Store<M, E, F> {
    model: RwLock<M>,
    update: Arc<dyn Update<M, E, F>>,
    init: Option<Arc<dyn Init<M, F>>>,
}

impl<M, E, F> Store<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Create a store holding `model`.
    ///
    /// Without an init function, [`Store::init`] returns the starting model
    /// unchanged and no effects.
    pub fn new(
        model: M,
        update: Arc<dyn Update<M, E, F>>,
        init: Option<Arc<dyn Init<M, F>>>,
    ) -> Self {
        Self { model: RwLock::new(model), update, init }
    }

    /// Apply the init function to the current model.
    pub fn init(&self) -> First<M, F> {
        let current = self.model();
        let first = match &self.init {
            Some(init) => init.init(current),
            None => First::first(current),
        };

        self.replace(first.model().clone());
        first
    }

    /// Apply `event` to the current model.
    ///
    /// The transition reads the model under a shared lock; the exclusive lock
    /// is only taken to swap in a new model when one is produced.
    pub fn update(&self, event: E) -> Next<M, F> {
        let next = {
            let model = self.model.read().unwrap_or_else(PoisonError::into_inner);
            self.update.update(&model, event)
        };

        if let Some(model) = next.model() {
            self.replace(model.clone());
        }
        next
    }

    /// Snapshot of the most recent model.
    pub fn model(&self) -> M {
        self.model.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether an init function is configured.
    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    fn replace(&self, model: M) {
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = model;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appending_store(init: Option<Arc<dyn Init<String, u8>>>) -> Store<String, &'static str, u8> {
        let update: Arc<dyn Update<String, &'static str, u8>> =
            Arc::new(|model: &String, event: &'static str| -> Next<String, u8> {
                if event.is_empty() {
                    Next::dispatch([0])
                } else {
                    Next::next(format!("{model}->{event}"))
                }
            });
        Store::new("init".to_string(), update, init)
    }

    #[test]
    fn update_replaces_model() {
        let store = appending_store(None);
        let next = store.update("a");
        assert_eq!(next.model().map(String::as_str), Some("init->a"));
        assert_eq!(store.model(), "init->a");
    }

    #[test]
    fn update_without_model_keeps_current() {
        let store = appending_store(None);
        let _ = store.update("a");
        let next = store.update("");
        assert!(!next.has_model());
        assert_eq!(next.effects(), &[0]);
        assert_eq!(store.model(), "init->a");
    }

    #[test]
    fn init_defaults_to_identity() {
        let store = appending_store(None);
        let first = store.init();
        assert_eq!(first.model(), "init");
        assert!(first.effects().is_empty());
        assert!(!store.has_init());
    }

    #[test]
    fn init_function_is_applied() {
        let init = |model: String| First::first_with(format!("I{model}"), [1u8]);
        let store = appending_store(Some(Arc::new(init)));
        let first = store.init();
        assert_eq!(first.model(), "Iinit");
        assert_eq!(first.effects(), &[1]);
        assert_eq!(store.model(), "Iinit");
    }
}

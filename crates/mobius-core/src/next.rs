//! Transition results.
//!
//! [`Next`] is what an update function returns for every event: an optional
//! new model plus the effects to dispatch. [`First`] is what an init function
//! returns once at loop start; it always carries a model.

/// Result of applying one event: an optional model and ordered effects.
///
/// A `Next` without a model means "no model change". Observers are not
/// notified for such a transition, but its effects are still dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Next<M, F> {
    model: Option<M>,
    effects: Vec<F>,
}

impl<M, F> Next<M, F> {
    /// New model, no effects.
    pub fn next(model: M) -> Self {
        Self { model: Some(model), effects: Vec::new() }
    }

    /// New model and effects.
    pub fn next_with(model: M, effects: impl IntoIterator<Item = F>) -> Self {
        Self { model: Some(model), effects: effects.into_iter().collect() }
    }

    /// No model change, only effects.
    pub fn dispatch(effects: impl IntoIterator<Item = F>) -> Self {
        Self { model: None, effects: effects.into_iter().collect() }
    }

    /// No model change and no effects.
    pub fn no_change() -> Self {
        Self { model: None, effects: Vec::new() }
    }

    /// Whether this transition produced a model.
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Whether this transition produced at least one effect.
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// The new model. `None` if the model did not change.
    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    /// Effects in dispatch order.
    pub fn effects(&self) -> &[F] {
        &self.effects
    }

    /// Split into model and effects.
    pub fn into_parts(self) -> (Option<M>, Vec<F>) {
        (self.model, self.effects)
    }
}

/// Result of the init function: the initial model and its effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct First<M, F> {
    model: M,
    effects: Vec<F>,
}

impl<M, F> First<M, F> {
    /// Initial model, no effects.
    pub fn first(model: M) -> Self {
        Self { model, effects: Vec::new() }
    }

    /// Initial model and effects.
    pub fn first_with(model: M, effects: impl IntoIterator<Item = F>) -> Self {
        Self { model, effects: effects.into_iter().collect() }
    }

    /// The initial model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Effects in dispatch order.
    pub fn effects(&self) -> &[F] {
        &self.effects
    }

    /// Split into model and effects.
    pub fn into_parts(self) -> (M, Vec<F>) {
        (self.model, self.effects)
    }
}

impl<M, F> From<First<M, F>> for Next<M, F> {
    fn from(first: First<M, F>) -> Self {
        Self { model: Some(first.model), effects: first.effects }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_change_has_nothing() {
        let next: Next<String, u8> = Next::no_change();
        assert!(!next.has_model());
        assert!(!next.has_effects());
    }

    #[test]
    fn dispatch_keeps_effect_order() {
        let next: Next<String, u8> = Next::dispatch([3, 1, 2]);
        assert!(!next.has_model());
        assert_eq!(next.effects(), &[3, 1, 2]);
    }

    #[test]
    fn first_always_produces_model() {
        let next: Next<&str, u8> = First::first_with("init", [7]).into();
        assert_eq!(next.model(), Some(&"init"));
        assert_eq!(next.into_parts(), (Some("init"), vec![7]));
    }
}

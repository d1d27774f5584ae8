//! Loop construction.
//!
//! A [`LoopBuilder`] collects the update function, effect handler and
//! optional collaborators once, then starts any number of independent loops
//! from it. It is the [`LoopFactory`] a
//! [`MobiusLoopController`](crate::MobiusLoopController) uses to start a
//! fresh loop every time it is started.

use std::sync::Arc;

use crate::{
    Connectable, EventSource, LoopConfig, LoopError, MobiusLoop, WorkRunnerFactory, event_source,
    mobius_loop::LoopParts,
    update::{Init, Update},
};

/// Something that can start loops from a model.
pub trait LoopFactory<M, E, F>: Send + Sync {
    /// Start a loop whose store holds `model`.
    fn start_from(&self, model: M) -> Result<MobiusLoop<M, E, F>, LoopError>;
}

/// Builder and factory for [`MobiusLoop`]s.
///
/// Cloning is cheap: collaborators are shared, so every loop started from
/// any clone connects to the same effect handler and event source.
pub struct LoopBuilder<M, E, F> {
    update: Arc<dyn Update<M, E, F>>,
    effect_handler: Arc<dyn Connectable<F, E>>,
    init: Option<Arc<dyn Init<M, F>>>,
    event_source: Arc<dyn EventSource<E>>,
    model_runner: Option<WorkRunnerFactory>,
    effect_runner: Option<WorkRunnerFactory>,
    config: LoopConfig,
}

impl<M, E, F> Clone for LoopBuilder<M, E, F> {
    fn clone(&self) -> Self {
        Self {
            update: Arc::clone(&self.update),
            effect_handler: Arc::clone(&self.effect_handler),
            init: self.init.clone(),
            event_source: Arc::clone(&self.event_source),
            model_runner: self.model_runner.clone(),
            effect_runner: self.effect_runner.clone(),
            config: self.config.clone(),
        }
    }
}

impl<M, E, F> LoopBuilder<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Builder with the two mandatory parts of a loop.
    ///
    /// Defaults: no init function, no event source, runners from
    /// [`LoopConfig::default`].
    pub fn new(
        update: impl Update<M, E, F> + 'static,
        effect_handler: impl Connectable<F, E> + 'static,
    ) -> Self {
        Self {
            update: Arc::new(update),
            effect_handler: Arc::new(effect_handler),
            init: None,
            event_source: Arc::new(event_source::none()),
            model_runner: None,
            effect_runner: None,
            config: LoopConfig::default(),
        }
    }

    /// Apply `init` to the starting model of every loop.
    #[must_use]
    pub fn init(mut self, init: impl Init<M, F> + 'static) -> Self {
        self.init = Some(Arc::new(init));
        self
    }

    /// Subscribe every loop to `source`.
    #[must_use]
    pub fn event_source(mut self, source: impl EventSource<E> + 'static) -> Self {
        self.event_source = Arc::new(source);
        self
    }

    /// Deliver models through runners from `factory`, overriding the config.
    #[must_use]
    pub fn model_runner(mut self, factory: WorkRunnerFactory) -> Self {
        self.model_runner = Some(factory);
        self
    }

    /// Deliver effects through runners from `factory`, overriding the config.
    #[must_use]
    pub fn effect_runner(mut self, factory: WorkRunnerFactory) -> Self {
        self.effect_runner = Some(factory);
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a loop from `model`.
    pub fn start_from(&self, model: M) -> Result<MobiusLoop<M, E, F>, LoopError> {
        self.start(model, Vec::new())
    }

    /// Start a loop from `model`, dispatching `effects` right after the
    /// starting model is published.
    ///
    /// Fails with [`LoopError::InitialEffectsWithInit`] if an init function
    /// is configured; the init function is the place to produce starting
    /// effects in that case.
    pub fn start_with_effects(
        &self,
        model: M,
        effects: impl IntoIterator<Item = F>,
    ) -> Result<MobiusLoop<M, E, F>, LoopError> {
        if self.init.is_some() {
            return Err(LoopError::InitialEffectsWithInit);
        }
        self.start(model, effects.into_iter().collect())
    }

    fn start(&self, model: M, initial_effects: Vec<F>) -> Result<MobiusLoop<M, E, F>, LoopError> {
        let model_runner =
            self.model_runner.clone().unwrap_or_else(|| self.config.model_runner_factory());
        let effect_runner =
            self.effect_runner.clone().unwrap_or_else(|| self.config.effect_runner_factory());

        MobiusLoop::start(LoopParts {
            name: Arc::from(self.config.name.as_str()),
            model,
            initial_effects,
            update: Arc::clone(&self.update),
            init: self.init.clone(),
            effect_handler: Arc::clone(&self.effect_handler),
            event_source: Arc::clone(&self.event_source),
            model_runner,
            effect_runner,
        })
    }
}

impl<M, E, F> LoopFactory<M, E, F> for LoopBuilder<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    fn start_from(&self, model: M) -> Result<MobiusLoop<M, E, F>, LoopError> {
        LoopBuilder::start_from(self, model)
    }
}

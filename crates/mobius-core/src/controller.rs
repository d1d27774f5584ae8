//! View-binding lifecycle around a loop.
//!
//! A [`MobiusLoopController`] binds one view to a sequence of loops:
//!
//! ```text
//!          connect            start
//!   Init ----------> Created --------> Running
//!        <----------         <--------
//!         disconnect          stop
//! ```
//!
//! Every `start` begins a fresh loop from the most recent model; every `stop`
//! disposes the loop and remembers its last model. The view stays connected
//! across stop/start. Operations attempted from the wrong state fail with
//! [`LoopError::InvalidState`] naming the current state.
//!
//! Collaborators must not call back into the controller synchronously from
//! `connect`, `accept` or `dispose`: controller operations hold its state
//! lock while they drive the view and the loop.

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, trace};

use crate::{
    Connectable, Connection, Consumer, LoopError, LoopFactory, MobiusLoop, WorkRunnerConnectable,
    WorkRunnerFactory,
};

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No view connected
    Init,
    /// View connected, no loop running
    Created,
    /// View connected and a loop running
    Running,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Created => "created",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}

struct ControllerInner<M, E, F> {
    state: ControllerState,
    model: M,
    view: Option<Arc<dyn Connection<M>>>,
    view_events: Option<Arc<ViewEvents<E>>>,
    running: Option<MobiusLoop<M, E, F>>,
}

/// Starts and stops loops on behalf of one view.
pub struct MobiusLoopController<M, E, F> {
    factory: Arc<dyn LoopFactory<M, E, F>>,
    view_runner: Option<WorkRunnerFactory>,
    inner: Mutex<ControllerInner<M, E, F>>,
}

impl<M, E, F> MobiusLoopController<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Controller that starts loops from `factory`, beginning at
    /// `default_model`.
    pub fn new(factory: impl LoopFactory<M, E, F> + 'static, default_model: M) -> Self {
        Self {
            factory: Arc::new(factory),
            view_runner: None,
            inner: Mutex::new(ControllerInner {
                state: ControllerState::Init,
                model: default_model,
                view: None,
                view_events: None,
                running: None,
            }),
        }
    }

    /// Deliver models to the view on runners from `factory`.
    ///
    /// Every connected view gets its own runner, so models reach it in
    /// order on that runner rather than on the loop's model runner.
    #[must_use]
    pub fn with_view_runner(mut self, factory: WorkRunnerFactory) -> Self {
        self.view_runner = Some(factory);
        self
    }

    /// Connect `view`: models go to its connection, events it emits go to
    /// the running loop. Init → Created.
    ///
    /// On failure the controller stays in Init.
    pub fn connect(&self, view: Arc<dyn Connectable<M, E>>) -> Result<(), LoopError> {
        let mut inner = self.lock();
        Self::require(&inner, ControllerState::Init, "connect")?;

        let view: Arc<dyn Connectable<M, E>> = match &self.view_runner {
            Some(runners) => Arc::new(WorkRunnerConnectable::new(view, runners.clone())),
            None => view,
        };

        let events = Arc::new(ViewEvents::default());
        let connection = view.connect(Arc::clone(&events) as Arc<dyn Consumer<E>>)?;

        inner.view = Some(Arc::from(connection));
        inner.view_events = Some(events);
        inner.state = ControllerState::Created;
        debug!("view connected");
        Ok(())
    }

    /// Start a loop from the most recent model and bind the view to it.
    /// Created → Running.
    ///
    /// On failure the controller stays in Created.
    pub fn start(&self) -> Result<(), LoopError> {
        let mut inner = self.lock();
        Self::require(&inner, ControllerState::Created, "start")?;

        let mobius_loop = self.factory.start_from(inner.model.clone())?;

        if let Some(view) = &inner.view {
            mobius_loop.observe(Arc::clone(view) as Arc<dyn Consumer<M>>)?;
        }
        if let Some(events) = &inner.view_events {
            events.attach(mobius_loop.event_consumer());
        }

        inner.running = Some(mobius_loop);
        inner.state = ControllerState::Running;
        debug!("controller started");
        Ok(())
    }

    /// Dispose the running loop, keeping its last model. Running → Created.
    pub fn stop(&self) -> Result<(), LoopError> {
        let mut inner = self.lock();
        Self::require(&inner, ControllerState::Running, "stop")?;

        if let Some(events) = &inner.view_events {
            events.detach();
        }
        if let Some(mobius_loop) = inner.running.take() {
            mobius_loop.dispose();
            inner.model = mobius_loop.most_recent_model();
        }

        inner.state = ControllerState::Created;
        debug!("controller stopped");
        Ok(())
    }

    /// Disconnect the view. Created → Init.
    ///
    /// Events the view emits afterwards are dropped, even if the controller
    /// is started again with another view.
    pub fn disconnect(&self) -> Result<(), LoopError> {
        let mut inner = self.lock();
        Self::require(&inner, ControllerState::Created, "disconnect")?;

        if let Some(events) = inner.view_events.take() {
            events.disable();
        }
        if let Some(view) = inner.view.take() {
            view.dispose();
        }

        inner.state = ControllerState::Init;
        debug!("view disconnected");
        Ok(())
    }

    /// Most recent model: the running loop's while running, otherwise the
    /// saved one.
    pub fn model(&self) -> M {
        let inner = self.lock();
        match &inner.running {
            Some(mobius_loop) => mobius_loop.most_recent_model(),
            None => inner.model.clone(),
        }
    }

    /// Replace the saved model. Refused while running.
    pub fn replace_model(&self, model: M) -> Result<(), LoopError> {
        let mut inner = self.lock();
        if inner.state == ControllerState::Running {
            return Err(LoopError::InvalidState {
                state: ControllerState::Running,
                operation: "replace_model",
            });
        }
        inner.model = model;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.lock().state
    }

    /// Whether a loop is running.
    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    fn require(
        inner: &ControllerInner<M, E, F>,
        expected: ControllerState,
        operation: &'static str,
    ) -> Result<(), LoopError> {
        if inner.state == expected {
            Ok(())
        } else {
            Err(LoopError::InvalidState { state: inner.state, operation })
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner<M, E, F>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Consumer handed to the view. Forwards to the running loop, if any;
/// otherwise drops.
struct ViewEvents<E> {
    target: Mutex<Option<Arc<dyn Consumer<E>>>>,
    disabled: AtomicBool,
}

impl<E> Default for ViewEvents<E> {
    fn default() -> Self {
        Self { target: Mutex::new(None), disabled: AtomicBool::new(false) }
    }
}

impl<E> ViewEvents<E> {
    fn attach(&self, target: Arc<dyn Consumer<E>>) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = Some(target);
    }

    fn detach(&self) {
        self.target.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
        self.detach();
    }
}

impl<E> Consumer<E> for ViewEvents<E> {
    fn accept(&self, event: E) {
        if self.disabled.load(Ordering::Acquire) {
            trace!("dropping view event: view disconnected");
            return;
        }

        let target = self.target.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match target {
            Some(target) => target.accept(event),
            None => trace!("dropping view event: controller not running"),
        }
    }
}

//! Guards that separate "stop forwarding" from "release resources".
//!
//! Disabling is a single atomic store: it never waits on an in-flight
//! delivery, so it is safe to call from a disposal path that may be running
//! on the same thread as, or concurrently with, a slow downstream call.
//! Values arriving after `disable` are dropped.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::trace;

use crate::{Connectable, Connection, ConnectionError, Consumer, Disposable};

/// Something that can be told to stop forwarding values.
pub trait Disableable: Send + Sync {
    /// Stop forwarding. Permanent and idempotent.
    fn disable(&self);
}

/// Consumer that forwards until disabled, then drops.
pub struct DisableableConsumer<T> {
    inner: Arc<dyn Consumer<T>>,
    disabled: AtomicBool,
}

impl<T> DisableableConsumer<T> {
    /// Guard `inner`.
    pub fn new(inner: Arc<dyn Consumer<T>>) -> Self {
        Self { inner, disabled: AtomicBool::new(false) }
    }

    /// Whether `disable` has been called.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }
}

impl<T> Consumer<T> for DisableableConsumer<T> {
    fn accept(&self, value: T) {
        if self.is_disabled() {
            trace!("dropping value: consumer disabled");
            return;
        }
        self.inner.accept(value);
    }
}

impl<T> Disableable for DisableableConsumer<T> {
    fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
    }
}

/// Connection that forwards until disabled and releases its resources once.
///
/// `dispose` always disables first, so nothing reaches the wrapped connection
/// while it is being torn down.
pub struct DisableableConnection<I> {
    inner: Box<dyn Connection<I>>,
    output: Option<Arc<dyn Disableable>>,
    disabled: AtomicBool,
    disposed: AtomicBool,
}

impl<I> DisableableConnection<I> {
    /// Guard `inner`.
    pub fn new(inner: Box<dyn Connection<I>>) -> Self {
        Self {
            inner,
            output: None,
            disabled: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Guard `inner` and the consumer it emits to.
    ///
    /// Disabling the connection disables `output` before the input side.
    pub fn with_output(inner: Box<dyn Connection<I>>, output: Arc<dyn Disableable>) -> Self {
        Self { output: Some(output), ..Self::new(inner) }
    }

    /// Whether `disable` (or `dispose`) has been called.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }
}

impl<I> Consumer<I> for DisableableConnection<I> {
    fn accept(&self, value: I) {
        if self.is_disabled() {
            trace!("dropping value: connection disabled");
            return;
        }
        self.inner.accept(value);
    }
}

impl<I> Disableable for DisableableConnection<I> {
    fn disable(&self) {
        if let Some(output) = &self.output {
            output.disable();
        }
        self.disabled.store(true, Ordering::Release);
    }
}

impl<I> Disposable for DisableableConnection<I> {
    fn dispose(&self) {
        self.disable();
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.inner.dispose();
        }
    }
}

/// Connectable whose connections, and the outputs handed to them, can be
/// disabled.
pub struct DisableableConnectable<I, O> {
    inner: Arc<dyn Connectable<I, O>>,
}

impl<I, O> DisableableConnectable<I, O>
where
    I: 'static,
    O: 'static,
{
    /// Guard connections made through `inner`.
    pub fn new(inner: Arc<dyn Connectable<I, O>>) -> Self {
        Self { inner }
    }

    /// Connect, keeping the concrete guard so the caller can disable it.
    pub fn connect_guarded(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<DisableableConnection<I>, ConnectionError> {
        let output = Arc::new(DisableableConsumer::new(output));
        let connection = self.inner.connect(Arc::clone(&output) as Arc<dyn Consumer<O>>)?;
        Ok(DisableableConnection::with_output(connection, output))
    }
}

impl<I, O> Connectable<I, O> for DisableableConnectable<I, O>
where
    I: 'static,
    O: 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        Ok(Box::new(self.connect_guarded(output)?))
    }
}

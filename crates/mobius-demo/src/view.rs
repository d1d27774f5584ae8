//! Terminal view: renders models to stdout and forwards user input.

use std::{
    fmt::Display,
    io::{self, Write},
    marker::PhantomData,
    sync::{Arc, Mutex, PoisonError},
};

use mobius_core::{Connectable, Connection, ConnectionError, Consumer, connection};
use tracing::{debug, error};

/// View that writes every model it receives as one line on stdout.
///
/// Events typed by the user are handed to the controller through
/// [`send`](Self::send), which uses the output consumer captured at connect
/// time.
pub struct TerminalView<M, E> {
    output: Mutex<Option<Arc<dyn Consumer<E>>>>,
    _models: PhantomData<fn(M)>,
}

impl<M, E> Default for TerminalView<M, E> {
    fn default() -> Self {
        Self { output: Mutex::new(None), _models: PhantomData }
    }
}

impl<M, E> TerminalView<M, E> {
    /// Unconnected view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward `event` to whoever the view is connected to.
    ///
    /// Returns false if the view is not connected.
    pub fn send(&self, event: E) -> bool {
        let output = self.output.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match output {
            Some(output) => {
                output.accept(event);
                true
            },
            None => false,
        }
    }
}

impl<M, E> Connectable<M, E> for TerminalView<M, E>
where
    M: Display + Send + 'static,
    E: Send + 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<E>>,
    ) -> Result<Box<dyn Connection<M>>, ConnectionError> {
        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
        debug!("terminal view connected");
        let rendering =
            connection::from_fn(render::<M>).on_dispose(|| debug!("terminal view disposed"));
        Ok(Box::new(rendering))
    }
}

/// Write one model as a line on stdout.
pub fn render<M: Display>(model: M) {
    if let Err(e) = writeln!(io::stdout().lock(), "{model}") {
        error!(error = %e, "failed to render model");
    }
}

//! Typed boundaries between the loop and its collaborators.
//!
//! A [`Connectable`] is a factory: handed an output [`Consumer`], it returns
//! an input [`Connection`]. The same shape is used for the effect handler
//! (effects in, events out) and for views (models in, events out).
//!
//! Closures implement [`Consumer`] (`Fn(T)`), [`Disposable`] (`Fn()`) and
//! [`Connectable`] directly. [`from_fn`] builds a [`Connection`] from a pair
//! of closures. [`AsyncConnectable`] runs an async handler per input on a
//! tokio runtime.

use std::{
    pin::Pin,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, trace};

use crate::{ConnectionError, Disableable, DisableableConsumer, WorkRunner, WorkRunnerFactory};

/// Receiver of values.
///
/// `accept` is infallible: a consumer that cannot handle a value logs and
/// drops it. Panics inside `accept` are contained by the loop at every
/// delivery boundary.
pub trait Consumer<T>: Send + Sync {
    /// Handle one value.
    fn accept(&self, value: T);
}

impl<T, C> Consumer<T> for C
where
    C: Fn(T) + Send + Sync,
{
    fn accept(&self, value: T) {
        self(value);
    }
}

/// Something that holds resources until it is disposed.
pub trait Disposable: Send + Sync {
    /// Release resources. Implementations must tolerate repeated calls.
    fn dispose(&self);
}

impl<D> Disposable for D
where
    D: Fn() + Send + Sync,
{
    fn dispose(&self) {
        self();
    }
}

/// Input side of a connection: accepts values until disposed.
///
/// Calling `accept` after `dispose` is unspecified unless the connection is
/// wrapped in a [`DisableableConnection`](crate::DisableableConnection).
pub trait Connection<I>: Consumer<I> + Disposable {}

impl<I, T> Connection<I> for T where T: Consumer<I> + Disposable + ?Sized {}

/// Factory for connections.
pub trait Connectable<I, O>: Send + Sync {
    /// Open a connection whose outputs are delivered to `output`.
    ///
    /// Fails with [`ConnectionError::LimitExceeded`] when the connectable
    /// only supports one concurrent connection and one is already open.
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError>;
}

impl<I, O, C> Connectable<I, O> for C
where
    C: Fn(Arc<dyn Consumer<O>>) -> Result<Box<dyn Connection<I>>, ConnectionError> + Send + Sync,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        self(output)
    }
}

fn release_nothing() {}

/// [`Connection`] built from closures. See [`from_fn`].
pub struct FnConnection<A, D = fn()> {
    accept: A,
    dispose: D,
}

/// Build a connection that passes every value to `accept`.
///
/// Disposing it does nothing until a release step is attached with
/// [`FnConnection::on_dispose`].
pub fn from_fn<I, A>(accept: A) -> FnConnection<A>
where
    A: Fn(I) + Send + Sync,
{
    FnConnection { accept, dispose: release_nothing }
}

impl<A, D> FnConnection<A, D> {
    /// Run `dispose` when the connection is disposed.
    pub fn on_dispose<R>(self, dispose: R) -> FnConnection<A, R>
    where
        R: Fn() + Send + Sync,
    {
        FnConnection { accept: self.accept, dispose }
    }
}

impl<I, A, D> Consumer<I> for FnConnection<A, D>
where
    A: Fn(I) + Send + Sync,
    D: Send + Sync,
{
    fn accept(&self, value: I) {
        (self.accept)(value);
    }
}

impl<A, D> Disposable for FnConnection<A, D>
where
    A: Send + Sync,
    D: Fn() + Send + Sync,
{
    fn dispose(&self) {
        (self.dispose)();
    }
}

/// Connectable that hands every input to a work runner before it reaches
/// the wrapped connection.
///
/// Each call to `connect` creates a fresh runner, so inputs of one
/// connection are delivered in order on that runner. Disposing the returned
/// connection disposes the runner first, then the wrapped connection.
pub struct WorkRunnerConnectable<I, O> {
    inner: Arc<dyn Connectable<I, O>>,
    runners: WorkRunnerFactory,
}

impl<I, O> WorkRunnerConnectable<I, O> {
    /// Wrap `inner`, creating one runner per connection from `runners`.
    pub fn new(inner: Arc<dyn Connectable<I, O>>, runners: WorkRunnerFactory) -> Self {
        Self { inner, runners }
    }
}

impl<I, O> Connectable<I, O> for WorkRunnerConnectable<I, O>
where
    I: Send + 'static,
    O: 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        let runner = self
            .runners
            .create()
            .map_err(|e| ConnectionError::RunnerUnavailable(e.to_string()))?;

        let connection = match self.inner.connect(output) {
            Ok(connection) => connection,
            Err(e) => {
                runner.dispose();
                return Err(e);
            },
        };

        Ok(Box::new(RunnerConnection { runner, connection: Arc::from(connection) }))
    }
}

struct RunnerConnection<I> {
    runner: Arc<dyn WorkRunner>,
    connection: Arc<dyn Connection<I>>,
}

impl<I: Send + 'static> Consumer<I> for RunnerConnection<I> {
    fn accept(&self, value: I) {
        let connection = Arc::clone(&self.connection);
        self.runner.post(Box::new(move || connection.accept(value)));
    }
}

impl<I: Send + 'static> Disposable for RunnerConnection<I> {
    fn dispose(&self) {
        trace!("disposing runner-backed connection");
        self.runner.dispose();
        self.connection.dispose();
    }
}

type Launch<I> = Box<dyn Fn(I) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Connectable whose inputs are handled by an async function on a tokio
/// runtime.
///
/// Every input spawns one task running `handler(input, output)` on the
/// runtime behind the handle, so inputs are handled concurrently and their
/// outputs may interleave. Disposing the connection stops output first, then
/// aborts every task still running. A task is cancelled at its next `.await`;
/// whatever it emits before that point is dropped.
pub struct AsyncConnectable<H> {
    handle: Handle,
    handler: Arc<H>,
}

impl<H> AsyncConnectable<H> {
    /// Handle inputs with `handler` on the runtime behind `handle`.
    pub fn new(handle: Handle, handler: H) -> Self {
        Self { handle, handler: Arc::new(handler) }
    }
}

impl<I, O, H, Fut> Connectable<I, O> for AsyncConnectable<H>
where
    I: Send + 'static,
    O: 'static,
    H: Fn(I, Arc<dyn Consumer<O>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        let output = Arc::new(DisableableConsumer::new(output));
        let handler = Arc::clone(&self.handler);
        let sink = Arc::clone(&output) as Arc<dyn Consumer<O>>;
        let launch: Launch<I> =
            Box::new(move |input: I| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin((*handler)(input, Arc::clone(&sink)))
            });

        Ok(Box::new(AsyncConnection {
            handle: self.handle.clone(),
            launch,
            output,
            disposed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }))
    }
}

struct AsyncConnection<I, O> {
    handle: Handle,
    launch: Launch<I>,
    output: Arc<DisableableConsumer<O>>,
    disposed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<I, O> Consumer<I> for AsyncConnection<I, O> {
    fn accept(&self, value: I) {
        if self.disposed.load(Ordering::Acquire) {
            trace!("dropping input: async connection disposed");
            return;
        }

        let task = self.handle.spawn((self.launch)(value));
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }
}

impl<I, O> Disposable for AsyncConnection<I, O> {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.output.disable();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        debug!(aborted = tasks.len(), "disposing async connection");
        for task in tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    type Connected = Result<Box<dyn Connection<u32>>, ConnectionError>;

    #[test]
    fn closure_connection_forwards_and_disposes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let disposed = Arc::new(AtomicUsize::new(0));

        let connection = {
            let seen = Arc::clone(&seen);
            let disposed = Arc::clone(&disposed);
            from_fn(move |value: u32| seen.lock().unwrap().push(value)).on_dispose(move || {
                disposed.fetch_add(1, Ordering::SeqCst);
            })
        };

        connection.accept(1);
        connection.accept(2);
        connection.dispose();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closure_connectable_echoes_to_output() {
        let echo = |output: Arc<dyn Consumer<u32>>| -> Connected {
            Ok(Box::new(from_fn(move |value: u32| output.accept(value + 1))))
        };

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |value: u32| seen.lock().unwrap().push(value)
        };

        let connection = echo.connect(Arc::new(sink)).unwrap();
        connection.accept(41);
        assert_eq!(*seen.lock().unwrap(), vec![42]);
    }

    #[test]
    fn runner_connectable_posts_through_runner() {
        let inner = |output: Arc<dyn Consumer<u32>>| -> Connected {
            Ok(Box::new(from_fn(move |value: u32| output.accept(value))))
        };
        let connectable = WorkRunnerConnectable::<u32, u32>::new(
            Arc::new(inner),
            WorkRunnerFactory::immediate(),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |value: u32| seen.lock().unwrap().push(value)
        };

        let connection = connectable.connect(Arc::new(sink)).unwrap();
        connection.accept(7);
        connection.dispose();
        connection.accept(8);

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn runner_connectable_propagates_connect_failure() {
        let refusing = |_output: Arc<dyn Consumer<u32>>| -> Connected {
            Err(ConnectionError::LimitExceeded)
        };
        let connectable = WorkRunnerConnectable::<u32, u32>::new(
            Arc::new(refusing),
            WorkRunnerFactory::immediate(),
        );

        let result = connectable.connect(Arc::new(|_value: u32| {}));
        assert_eq!(result.err(), Some(ConnectionError::LimitExceeded));
    }
}

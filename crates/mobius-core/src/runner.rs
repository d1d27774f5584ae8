//! Work runners: where and when delivered values are handled.
//!
//! A loop never calls observers or the effect handler from inside its drain
//! loop directly. Every delivery is posted to a [`WorkRunner`] as a [`Task`],
//! which may run it inline, on a dedicated thread, on a pool, or on a tokio
//! runtime.
//!
//! Every runner contains panics per task: a panicking task is logged with
//! `tracing::error!` and the runner keeps going.

use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam_channel::{Receiver, Sender};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, error, trace};

/// Unit of work posted to a runner.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling abstraction: run a task somewhere, at some point.
///
/// After `dispose`, a runner never starts a task it has not already started.
/// `dispose` may be called more than once and from any thread, including
/// from inside one of the runner's own tasks.
pub trait WorkRunner: Send + Sync {
    /// Schedule `task`. Dropped silently once the runner is disposed.
    fn post(&self, task: Task);

    /// Stop accepting and starting tasks.
    fn dispose(&self);
}

/// Run `f`, logging and swallowing any panic.
///
/// Returns `None` if `f` panicked.
pub(crate) fn isolate<R>(context: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(context, panic = panic_message(payload.as_ref()), "contained panic");
            None
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Runs every task inline on the posting thread.
#[derive(Debug, Default)]
pub struct ImmediateWorkRunner {
    disposed: AtomicBool,
}

impl ImmediateWorkRunner {
    /// Create an active runner.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkRunner for ImmediateWorkRunner {
    fn post(&self, task: Task) {
        if self.disposed.load(Ordering::Acquire) {
            trace!("dropping task: immediate runner disposed");
            return;
        }
        isolate("immediate runner task", task);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}

/// Channel-fed worker threads shared by the single-thread and pool runners.
struct ChannelRunner {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    disposed: Arc<AtomicBool>,
}

impl ChannelRunner {
    fn spawn(name: String, threads: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let disposed = Arc::new(AtomicBool::new(false));

        for index in 0..threads {
            let receiver = receiver.clone();
            let disposed = Arc::clone(&disposed);
            let thread_name = if threads == 1 { name.clone() } else { format!("{name}-{index}") };
            thread::Builder::new()
                .name(thread_name)
                .spawn(move || Self::work(&receiver, &disposed))?;
        }

        debug!(runner = %name, threads, "work runner started");
        Ok(Self { name, sender: Mutex::new(Some(sender)), disposed })
    }

    fn work(receiver: &Receiver<Task>, disposed: &AtomicBool) {
        for task in receiver {
            if disposed.load(Ordering::Acquire) {
                break;
            }
            isolate("work runner task", task);
        }
    }

    fn post(&self, task: Task) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) if !self.disposed.load(Ordering::Acquire) => {
                if sender.send(task).is_err() {
                    trace!(runner = %self.name, "dropping task: worker threads gone");
                }
            },
            _ => trace!(runner = %self.name, "dropping task: runner disposed"),
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        // Dropping the sender lets idle workers fall out of their receive loop.
        if self.sender.lock().unwrap_or_else(PoisonError::into_inner).take().is_some() {
            debug!(runner = %self.name, "work runner disposed");
        }
    }
}

/// Runs tasks one at a time, in posting order, on a dedicated named thread.
pub struct SingleThreadWorkRunner {
    inner: ChannelRunner,
}

impl SingleThreadWorkRunner {
    /// Spawn the runner thread.
    pub fn new(name: impl Into<String>) -> io::Result<Self> {
        Ok(Self { inner: ChannelRunner::spawn(name.into(), 1)? })
    }
}

impl WorkRunner for SingleThreadWorkRunner {
    fn post(&self, task: Task) {
        self.inner.post(task);
    }

    fn dispose(&self) {
        self.inner.dispose();
    }
}

/// Runs tasks on a fixed pool of named threads sharing one queue.
///
/// Tasks start in posting order but may complete in any order.
pub struct ThreadPoolWorkRunner {
    inner: ChannelRunner,
}

impl ThreadPoolWorkRunner {
    /// Spawn `threads` workers (at least one).
    pub fn new(name: impl Into<String>, threads: usize) -> io::Result<Self> {
        Ok(Self { inner: ChannelRunner::spawn(name.into(), threads)? })
    }
}

impl WorkRunner for ThreadPoolWorkRunner {
    fn post(&self, task: Task) {
        self.inner.post(task);
    }

    fn dispose(&self) {
        self.inner.dispose();
    }
}

/// Runs tasks on an existing tokio runtime.
///
/// Tasks are spawned on the runtime behind `handle`. Dispose aborts every
/// task that has not started yet.
pub struct TokioWorkRunner {
    handle: Handle,
    disposed: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioWorkRunner {
    /// Run tasks on the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle, disposed: Arc::new(AtomicBool::new(false)), tasks: Mutex::new(Vec::new()) }
    }

    /// Run tasks on the runtime the caller is executing in, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl WorkRunner for TokioWorkRunner {
    fn post(&self, task: Task) {
        if self.disposed.load(Ordering::Acquire) {
            trace!("dropping task: tokio runner disposed");
            return;
        }

        let disposed = Arc::clone(&self.disposed);
        let join = self.handle.spawn(async move {
            if !disposed.load(Ordering::Acquire) {
                isolate("tokio runner task", task);
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(join);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
    }
}

/// Shared constructor of work runners.
///
/// A loop asks its factories for one model runner and one effect runner when
/// it starts; a [`WorkRunnerConnectable`](crate::WorkRunnerConnectable) asks
/// for one runner per connection.
#[derive(Clone)]
pub struct WorkRunnerFactory {
    create: Arc<dyn Fn() -> io::Result<Arc<dyn WorkRunner>> + Send + Sync>,
}

impl WorkRunnerFactory {
    /// Build a factory from a constructor closure.
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> io::Result<Arc<dyn WorkRunner>> + Send + Sync + 'static,
    {
        Self { create: Arc::new(create) }
    }

    /// Create a runner.
    pub fn create(&self) -> io::Result<Arc<dyn WorkRunner>> {
        (self.create)()
    }

    /// Factory of [`ImmediateWorkRunner`]s.
    pub fn immediate() -> Self {
        Self::new(|| {
            let runner: Arc<dyn WorkRunner> = Arc::new(ImmediateWorkRunner::new());
            Ok(runner)
        })
    }

    /// Factory of [`SingleThreadWorkRunner`]s whose thread is named `name`.
    pub fn single_thread(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move || {
            let runner: Arc<dyn WorkRunner> = Arc::new(SingleThreadWorkRunner::new(name.clone())?);
            Ok(runner)
        })
    }

    /// Factory of [`ThreadPoolWorkRunner`]s with `threads` workers each.
    pub fn thread_pool(name: impl Into<String>, threads: usize) -> Self {
        let name = name.into();
        Self::new(move || {
            let runner: Arc<dyn WorkRunner> =
                Arc::new(ThreadPoolWorkRunner::new(name.clone(), threads)?);
            Ok(runner)
        })
    }

    /// Factory of [`TokioWorkRunner`]s on the runtime behind `handle`.
    pub fn tokio(handle: Handle) -> Self {
        Self::new(move || {
            let runner: Arc<dyn WorkRunner> = Arc::new(TokioWorkRunner::new(handle.clone()));
            Ok(runner)
        })
    }

    /// Factory that hands out the same runner every time.
    ///
    /// Disposing a loop disposes its runners, so a fixed runner only serves
    /// one loop. Mostly useful for tests that drive the runner by hand.
    pub fn fixed(runner: Arc<dyn WorkRunner>) -> Self {
        Self::new(move || Ok(Arc::clone(&runner)))
    }
}

impl std::fmt::Debug for WorkRunnerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkRunnerFactory").finish_non_exhaustive()
    }
}

//! Manually driven work runner.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use mobius_core::{Task, WorkRunner, WorkRunnerFactory};

/// Work runner that queues tasks until the test runs them.
///
/// Lets a test hold deliveries back, interleave other operations, and then
/// release them deterministically with [`run_all`](Self::run_all).
#[derive(Default)]
pub struct TestWorkRunner {
    tasks: Mutex<VecDeque<Task>>,
    disposed: AtomicBool,
}

impl TestWorkRunner {
    /// Empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory handing out `runner` to every loop that asks.
    pub fn factory(runner: &Arc<Self>) -> WorkRunnerFactory {
        WorkRunnerFactory::fixed(Arc::clone(runner) as Arc<dyn WorkRunner>)
    }

    /// Run queued tasks, including tasks posted while running, until the
    /// queue is empty. Returns how many ran.
    ///
    /// Tasks left in the queue when the runner is disposed are discarded.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            if self.is_disposed() {
                self.lock().clear();
                return ran;
            }
            let Some(task) = self.lock().pop_front() else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Whether `dispose` was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkRunner for TestWorkRunner {
    fn post(&self, task: Task) {
        if !self.is_disposed() {
            self.lock().push_back(task);
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}

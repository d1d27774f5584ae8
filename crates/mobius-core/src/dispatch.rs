//! Hand-off from the processor to a work runner.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::trace;

use crate::{Consumer, Disableable, WorkRunner, runner::isolate};

/// Posts every accepted value to a runner, where it is delivered to the
/// target inside a panic guard.
///
/// Once disabled, values are dropped both on `accept` and on tasks that were
/// already queued on the runner but have not started.
pub(crate) struct Dispatcher<T> {
    runner: Arc<dyn WorkRunner>,
    target: Arc<dyn Consumer<T>>,
    disabled: Arc<AtomicBool>,
    context: &'static str,
}

impl<T> Dispatcher<T> {
    pub(crate) fn new(
        runner: Arc<dyn WorkRunner>,
        target: Arc<dyn Consumer<T>>,
        context: &'static str,
    ) -> Self {
        Self { runner, target, disabled: Arc::new(AtomicBool::new(false)), context }
    }
}

impl<T: Send + 'static> Consumer<T> for Dispatcher<T> {
    fn accept(&self, value: T) {
        if self.disabled.load(Ordering::Acquire) {
            trace!(context = self.context, "dropping value: dispatcher disabled");
            return;
        }

        let target = Arc::clone(&self.target);
        let disabled = Arc::clone(&self.disabled);
        let context = self.context;
        self.runner.post(Box::new(move || {
            if disabled.load(Ordering::Acquire) {
                return;
            }
            isolate(context, || target.accept(value));
        }));
    }
}

impl<T> Disableable for Dispatcher<T> {
    fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ImmediateWorkRunner;

    #[test]
    fn delivers_until_disabled() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |value: u8| seen.lock().unwrap().push(value)
        };
        let dispatcher =
            Dispatcher::<u8>::new(Arc::new(ImmediateWorkRunner::new()), Arc::new(sink), "test");

        dispatcher.accept(1);
        dispatcher.disable();
        dispatcher.accept(2);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn panicking_target_does_not_escape() {
        let calls = Arc::new(Mutex::new(0));
        let sink = {
            let calls = Arc::clone(&calls);
            move |value: u8| {
                *calls.lock().unwrap() += 1;
                if value == 0 {
                    std::panic::panic_any("bad value");
                }
            }
        };
        let dispatcher =
            Dispatcher::<u8>::new(Arc::new(ImmediateWorkRunner::new()), Arc::new(sink), "test");

        dispatcher.accept(0);
        dispatcher.accept(1);

        assert_eq!(*calls.lock().unwrap(), 2);
    }
}

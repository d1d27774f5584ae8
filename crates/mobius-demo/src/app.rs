//! Counter domain: model, events, effects and the pure functions over them.

use std::{
    fmt,
    iter,
    sync::Arc,
    thread,
    time::Duration,
};

use mobius_core::{Connectable, Connection, ConnectionError, Consumer, First, Next, connection};
use tracing::{info, warn};

/// Counter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counter {
    /// Current count, never negative.
    pub value: u64,
    /// Delayed increments requested but not yet applied.
    pub pending: u32,
}

impl Counter {
    /// Counter starting at `value` with nothing pending.
    pub fn new(value: u64) -> Self {
        Self { value, pending: 0 }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pending == 0 {
            write!(f, "count: {}", self.value)
        } else {
            write!(f, "count: {} ({} pending)", self.value, self.pending)
        }
    }
}

/// Things that can happen to the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Add one now.
    Increment,
    /// Subtract one now, if above zero.
    Decrement,
    /// Go back to zero.
    Reset,
    /// Add one after the configured latency.
    Later,
    /// A delayed increment has completed.
    LaterDone,
}

/// Work the counter asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Wait, then report [`Event::LaterDone`].
    DelayIncrement,
    /// Log that the counter was reset from the given value.
    ReportReset(u64),
    /// Log that a decrement was refused.
    RefuseDecrement,
}

/// Counter transition function.
pub fn update(counter: &Counter, event: Event) -> Next<Counter, Effect> {
    match event {
        Event::Increment => Next::next(Counter { value: counter.value + 1, ..*counter }),
        Event::Decrement => match counter.value.checked_sub(1) {
            Some(value) => Next::next(Counter { value, ..*counter }),
            None => Next::dispatch([Effect::RefuseDecrement]),
        },
        Event::Reset => {
            Next::next_with(Counter { value: 0, ..*counter }, [Effect::ReportReset(counter.value)])
        },
        Event::Later => Next::next_with(
            Counter { pending: counter.pending + 1, ..*counter },
            [Effect::DelayIncrement],
        ),
        Event::LaterDone => Next::next(Counter {
            value: counter.value + 1,
            pending: counter.pending.saturating_sub(1),
        }),
    }
}

/// Resume delayed increments that were in flight when the last loop stopped.
pub fn init(counter: Counter) -> First<Counter, Effect> {
    let resumed = iter::repeat_n(Effect::DelayIncrement, counter.pending as usize);
    First::first_with(counter, resumed)
}

/// Effect handler: sleeps for delayed increments and logs the rest.
#[derive(Debug, Clone, Copy)]
pub struct CounterEffects {
    latency: Duration,
}

impl CounterEffects {
    /// Handler whose delayed increments take `latency`.
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Connectable<Effect, Event> for CounterEffects {
    fn connect(
        &self,
        output: Arc<dyn Consumer<Event>>,
    ) -> Result<Box<dyn Connection<Effect>>, ConnectionError> {
        let latency = self.latency;
        Ok(Box::new(connection::from_fn(move |effect: Effect| match effect {
            Effect::DelayIncrement => {
                thread::sleep(latency);
                output.accept(Event::LaterDone);
            },
            Effect::ReportReset(from) => info!(from, "counter reset"),
            Effect::RefuseDecrement => warn!("counter already at zero"),
        })))
    }
}

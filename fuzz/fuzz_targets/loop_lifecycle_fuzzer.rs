//! Fuzz target for the loop lifecycle
//!
//! Drive a loop with inline runners through arbitrary sequences of
//! dispatches, effect round trips, observer churn and disposal.
//!
//! # Invariants
//!
//! - Model equals a sequential fold of every event accepted before dispose
//! - Effects fed back synchronously are applied after the event that
//!   produced them, never nested inside it
//! - Every live observer's last model is the loop's current model
//! - After dispose, dispatch fails and the model never changes again

#![no_main]

use std::sync::{Arc, Mutex};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mobius_core::{
    Connection, ConnectionError, Consumer, LoopBuilder, LoopError, Next, ObserverHandle,
    WorkRunnerFactory, connection,
};

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Event {
    Add(u8),
    Echo(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum LoopOp {
    Dispatch(Event),
    Collaborator(Event),
    Observe,
    Cancel(u8),
    Dispose,
}

fn update(model: &u64, event: Event) -> Next<u64, u8> {
    match event {
        Event::Add(n) => Next::next(model.wrapping_add(u64::from(n))),
        Event::Echo(n) => Next::dispatch([n]),
    }
}

fn echo(events: Arc<dyn Consumer<Event>>) -> Result<Box<dyn Connection<u8>>, ConnectionError> {
    Ok(Box::new(connection::from_fn(move |n: u8| events.accept(Event::Add(n)))))
}

fn expected_after(model: u64, event: Event) -> u64 {
    match event {
        Event::Add(n) | Event::Echo(n) => model.wrapping_add(u64::from(n)),
    }
}

type Seen = Arc<Mutex<Option<u64>>>;

fuzz_target!(|ops: Vec<LoopOp>| {
    let mobius_loop = LoopBuilder::new(update, echo)
        .model_runner(WorkRunnerFactory::immediate())
        .effect_runner(WorkRunnerFactory::immediate())
        .start_from(0)
        .unwrap();
    let events = mobius_loop.event_consumer();

    let mut expected = 0u64;
    let mut disposed = false;
    let mut observers: Vec<(ObserverHandle, Seen)> = Vec::new();

    for op in ops {
        match op {
            LoopOp::Dispatch(event) => match mobius_loop.dispatch_event(event) {
                Ok(()) => {
                    assert!(!disposed, "dispatch accepted after dispose");
                    expected = expected_after(expected, event);
                },
                Err(LoopError::Disposed { .. }) => assert!(disposed),
                Err(other) => panic!("unexpected dispatch error: {other}"),
            },
            LoopOp::Collaborator(event) => {
                events.accept(event);
                if !disposed {
                    expected = expected_after(expected, event);
                }
            },
            LoopOp::Observe => {
                let seen: Seen = Arc::new(Mutex::new(None));
                let sink = {
                    let seen = Arc::clone(&seen);
                    move |model: u64| *seen.lock().unwrap() = Some(model)
                };
                match mobius_loop.observe(Arc::new(sink)) {
                    Ok(handle) => {
                        assert!(!disposed);
                        assert_eq!(*seen.lock().unwrap(), Some(expected));
                        observers.push((handle, seen));
                    },
                    Err(e) => assert!(disposed && e.is_lifecycle()),
                }
            },
            LoopOp::Cancel(index) => {
                if !observers.is_empty() {
                    let (handle, _) = observers.swap_remove(usize::from(index) % observers.len());
                    handle.cancel();
                }
            },
            LoopOp::Dispose => {
                mobius_loop.dispose();
                disposed = true;
            },
        }

        assert_eq!(mobius_loop.most_recent_model(), expected);
        assert_eq!(mobius_loop.is_disposed(), disposed);
        if !disposed {
            for (_, seen) in &observers {
                assert_eq!(*seen.lock().unwrap(), Some(expected));
            }
        }
    }
});

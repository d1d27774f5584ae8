//! Snapshot of the transitions a small counter loop applies.

#![allow(clippy::unwrap_used)]

use std::{fmt::Write, sync::Arc};

use mobius_core::{First, LoopBuilder, Next, WorkRunnerFactory};
use mobius_harness::{ForwardingConnectable, LoopTrace, TracingUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Increment,
    Decrement,
    Reset,
    ResetDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    ConfirmReset,
}

fn update(count: &i32, event: Event) -> Next<i32, Effect> {
    match event {
        Event::Increment => Next::next(count + 1),
        Event::Decrement if *count > 0 => Next::next(count - 1),
        Event::Decrement => Next::no_change(),
        Event::Reset => Next::dispatch([Effect::ConfirmReset]),
        Event::ResetDone => Next::next(0),
    }
}

#[test]
fn counter_transitions() {
    let trace = Arc::new(LoopTrace::new());
    let confirm = ForwardingConnectable::mapping(|Effect::ConfirmReset| Some(Event::ResetDone));
    let mobius_loop = LoopBuilder::new(TracingUpdate::new(update, Arc::clone(&trace)), confirm)
        .init(|count: i32| First::first(count.max(0)))
        .model_runner(WorkRunnerFactory::immediate())
        .effect_runner(WorkRunnerFactory::immediate())
        .start_from(-3)
        .unwrap();

    for event in [Event::Decrement, Event::Increment, Event::Increment, Event::Reset] {
        mobius_loop.dispatch_event(event).unwrap();
    }
    mobius_loop.dispose();

    let mut rendered = String::new();
    for t in trace.snapshot().transitions {
        let after = t.after.map_or_else(|| "-".to_string(), |m| m.to_string());
        writeln!(rendered, "{}: {} + {:?} => {}", t.index, t.before, t.event, after).unwrap();
    }

    insta::assert_snapshot!(rendered.trim_end(), @r"
    0: 0 + Decrement => -
    1: 0 + Increment => 1
    2: 1 + Increment => 2
    3: 2 + Reset => -
    4: 2 + ResetDone => 0
    ");
}

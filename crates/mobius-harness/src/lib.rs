//! Test support for Mobius loops.
//!
//! Collaborators that record what they receive, stub effect handlers and
//! views, a work runner the test drives by hand, and an event source the
//! test scripts. Everything here plugs into the same seams production code
//! uses, so tests exercise the real loop and controller.
//!
//! # Invariant Testing
//!
//! The `invariants` module records every transition a loop applies and
//! checks the recording against properties that hold for any schedule. Use
//! [`InvariantRegistry::standard()`] for the properties every loop must
//! satisfy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connectables;
mod event_source;
pub mod invariants;
mod recording;
mod runner;

pub use connectables::{
    EmitOnDisposeConnectable, ForwardingConnectable, NoopConnectable, NoopConnection,
};
pub use event_source::ScriptedEventSource;
pub use invariants::{
    Invariant, InvariantKind, InvariantRegistry, InvariantResult, LoopTrace,
    ModelsMatchTransitions, NoTransitionsAfterDispose, SequentialTransitions, TraceSnapshot,
    TracingUpdate, Transition, Violation,
};
pub use recording::{RecordingConnectable, RecordingConnection, RecordingConsumer};
pub use runner::TestWorkRunner;

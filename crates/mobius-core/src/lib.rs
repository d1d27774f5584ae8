//! Mobius loop engine
//!
//! Unidirectional dataflow: a pure update function turns events into new
//! models and effects, an effect handler turns effects into work and more
//! events, and the loop ties the two together.
//!
//! # Architecture
//!
//! ```text
//!   event ──> EventProcessor ──> Store.update ──> Next { model?, effects }
//!                 ^                                   │          │
//!                 │                         model runner    effect runner
//!                 │                                   │          │
//!                 │                              observers   effect handler
//!                 └──────────────── events ──────────────────────┘
//! ```
//!
//! Any thread may dispatch events. The [`EventProcessor`] guarantees that the
//! update function runs sequentially, in submission order, and that chains of
//! synchronously re-entrant events never grow the stack.
//!
//! # Components
//!
//! - [`Next`] / [`First`]: transition results
//! - [`Update`] / [`Init`]: user-supplied pure functions
//! - [`MobiusLoop`]: a running loop, its observers and its disposal protocol
//! - [`LoopBuilder`]: starts loops, implements [`LoopFactory`]
//! - [`MobiusLoopController`]: Init/Created/Running lifecycle for one view
//! - [`Connectable`] / [`Connection`] / [`Consumer`]: collaborator boundaries
//! - [`DisableableConnection`] and friends: two-phase shutdown guards
//! - [`WorkRunner`]: where deliveries run (inline, thread, pool, tokio)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use mobius_core::{Connection, ConnectionError, Consumer, LoopBuilder, Next, connection};
//!
//! type Connected = Result<Box<dyn Connection<()>>, ConnectionError>;
//!
//! let effects = |_events: Arc<dyn Consumer<u32>>| -> Connected {
//!     Ok(Box::new(connection::from_fn(|_effect: ()| {})))
//! };
//!
//! let counter = LoopBuilder::new(
//!     |count: &u32, step: u32| -> Next<u32, ()> { Next::next(count + step) },
//!     effects,
//! )
//! .effect_runner(mobius_core::WorkRunnerFactory::immediate());
//!
//! let mobius_loop = counter.start_from(0).unwrap();
//! mobius_loop.dispatch_event(2).unwrap();
//! mobius_loop.dispatch_event(3).unwrap();
//! assert_eq!(mobius_loop.most_recent_model(), 5);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod builder;
mod config;
pub mod connection;
mod controller;
mod disableable;
mod dispatch;
pub mod error;
pub mod event_source;
mod mobius_loop;
mod next;
pub mod processor;
mod runner;
mod store;
mod update;

pub use builder::{LoopBuilder, LoopFactory};
pub use config::{DEFAULT_LOOP_NAME, LoopConfig, RunnerKind};
pub use connection::{
    AsyncConnectable, Connectable, Connection, Consumer, Disposable, WorkRunnerConnectable,
};
pub use controller::{ControllerState, MobiusLoopController};
pub use disableable::{
    Disableable, DisableableConnectable, DisableableConnection, DisableableConsumer,
};
pub use error::{ConnectionError, LoopError};
pub use event_source::EventSource;
pub use mobius_loop::{MobiusLoop, ObserverHandle};
pub use next::{First, Next};
pub use processor::EventProcessor;
pub use runner::{
    ImmediateWorkRunner, SingleThreadWorkRunner, Task, ThreadPoolWorkRunner, TokioWorkRunner,
    WorkRunner, WorkRunnerFactory,
};
pub use store::Store;
pub use update::{Init, Update};

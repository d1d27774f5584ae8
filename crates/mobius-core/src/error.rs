//! Error types for the Mobius loop engine.
//!
//! Two layers: lifecycle errors (dispatching into a disposed loop, controller
//! operations attempted in the wrong state) and connection errors raised by a
//! [`Connectable`](crate::Connectable) at connect time.
//!
//! Failures inside user-supplied effect handlers and observers are not errors
//! in this sense. They are contained at the delivery boundary and logged, so
//! they never surface here.

use thiserror::Error;

use crate::controller::ControllerState;

/// Errors raised by a [`Connectable`](crate::Connectable) when connecting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connectable supports a single concurrent connection and one is
    /// already open.
    #[error("connection limit exceeded: connectable already has an active connection")]
    LimitExceeded,

    /// The work runner backing the connection could not be started
    #[error("work runner unavailable: {0}")]
    RunnerUnavailable(String),
}

/// Errors raised by loop and controller operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    /// The loop has started disposing or is disposed.
    #[error("loop already disposed: cannot {operation}")]
    Disposed {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Controller operation attempted from a state that does not allow it
    #[error("invalid state transition: cannot {operation} in state {state}")]
    InvalidState {
        /// Current state when error occurred
        state: ControllerState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// A collaborator refused the connection
    #[error("connect failed: {0}")]
    Connection(#[from] ConnectionError),

    /// Initial effects were supplied to a loop that also has an init function
    #[error("cannot pass in start effects to a loop with an init function")]
    InitialEffectsWithInit,

    /// A work runner for model or effect delivery could not be started
    #[error("work runner unavailable: {0}")]
    RunnerUnavailable(String),
}

impl LoopError {
    /// Returns true if this error is a lifecycle precondition failure.
    ///
    /// Lifecycle errors mean the caller used the loop or controller in the
    /// wrong order. They are never transient: retrying the same call without
    /// an intervening state change fails again.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Disposed { .. } | Self::InvalidState { .. })
    }
}

//! Pure transition functions supplied by the user.

use crate::{First, Next};

/// Pure state transition: `(model, event) -> (optional model, effects)`.
///
/// Called by exactly one worker at a time, never concurrently. Must not
/// block and must not perform I/O; describe the work as effects instead.
pub trait Update<M, E, F>: Send + Sync {
    /// Apply `event` to `model`.
    fn update(&self, model: &M, event: E) -> Next<M, F>;
}

impl<M, E, F, T> Update<M, E, F> for T
where
    T: Fn(&M, E) -> Next<M, F> + Send + Sync,
{
    fn update(&self, model: &M, event: E) -> Next<M, F> {
        self(model, event)
    }
}

/// Pure init function, applied once when a loop starts.
pub trait Init<M, F>: Send + Sync {
    /// Produce the initial model and effects from the starting model.
    fn init(&self, model: M) -> First<M, F>;
}

impl<M, F, T> Init<M, F> for T
where
    T: Fn(M) -> First<M, F> + Send + Sync,
{
    fn init(&self, model: M) -> First<M, F> {
        self(model)
    }
}

//! Invariant checking over recorded loop traces.
//!
//! Invariants are properties every loop run must satisfy no matter how its
//! events were scheduled. A [`TracingUpdate`] records each transition into a
//! shared [`LoopTrace`]; once the run is over, a [`TraceSnapshot`] of it is
//! checked against every registered [`Invariant`].
//!
//! # Usage
//!
//! ```ignore
//! let trace = Arc::new(LoopTrace::new());
//! let builder = LoopBuilder::new(TracingUpdate::new(update, Arc::clone(&trace)), handler);
//! // ... drive the loop, dispose it, then:
//! trace.mark_disposed();
//! InvariantRegistry::standard().assert_all(&trace.snapshot(), "after dispose");
//! ```

mod checks;
mod trace;

use std::fmt;

pub use checks::{ModelsMatchTransitions, NoTransitionsAfterDispose, SequentialTransitions};
pub use trace::{LoopTrace, TraceSnapshot, TracingUpdate, Transition};

/// Identifies an invariant in violation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// No two transitions ran at the same time.
    SequentialTransitions,
    /// Nothing was applied after the loop was disposed.
    NoTransitionsAfterDispose,
    /// Each transition started from the model the previous one produced.
    ModelsMatchTransitions,
    /// Invariant defined outside this crate.
    Custom(&'static str),
}

impl InvariantKind {
    /// Stable name for reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::SequentialTransitions => "sequential_transitions",
            Self::NoTransitionsAfterDispose => "no_transitions_after_dispose",
            Self::ModelsMatchTransitions => "models_match_transitions",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Which invariant failed.
    pub invariant: InvariantKind,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a finished (or paused) loop run.
pub trait Invariant<M, E>: Send + Sync {
    /// Identifier used in reports.
    fn kind(&self) -> InvariantKind;

    /// Check the invariant against `trace`.
    fn check(&self, trace: &TraceSnapshot<M, E>) -> InvariantResult;
}

/// Set of invariants run together.
pub struct InvariantRegistry<M, E> {
    invariants: Vec<Box<dyn Invariant<M, E>>>,
}

impl<M, E> Default for InvariantRegistry<M, E> {
    fn default() -> Self {
        Self { invariants: Vec::new() }
    }
}

impl<M, E> InvariantRegistry<M, E>
where
    M: PartialEq + fmt::Debug + 'static,
    E: fmt::Debug + 'static,
{
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the invariants every loop must satisfy:
    /// - [`SequentialTransitions`]
    /// - [`NoTransitionsAfterDispose`]
    /// - [`ModelsMatchTransitions`]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SequentialTransitions);
        registry.add(NoTransitionsAfterDispose);
        registry.add(ModelsMatchTransitions);
        registry
    }

    /// Register `invariant`.
    pub fn add<I: Invariant<M, E> + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant, collecting all violations.
    pub fn check_all(&self, trace: &TraceSnapshot<M, E>) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(trace).err()).collect();

        for violation in &violations {
            tracing::warn!(
                invariant = %violation.invariant,
                message = %violation.message,
                "invariant violated"
            );
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every invariant and panic with all violations if any fail.
    #[allow(clippy::panic)]
    #[track_caller]
    pub fn assert_all(&self, trace: &TraceSnapshot<M, E>, context: &str) {
        if let Err(violations) = self.check_all(trace) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no invariants are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry: InvariantRegistry<u32, u32> = InvariantRegistry::standard();
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
    }

    #[test]
    fn empty_trace_passes() {
        let registry: InvariantRegistry<u32, u32> = InvariantRegistry::standard();
        let trace = LoopTrace::new();
        assert!(registry.check_all(&trace.snapshot()).is_ok());
    }

    #[test]
    fn custom_kind_reports_its_name() {
        let violation =
            Violation { invariant: InvariantKind::Custom("even_models"), message: "got 3".into() };
        assert_eq!(violation.to_string(), "even_models: got 3");
    }
}

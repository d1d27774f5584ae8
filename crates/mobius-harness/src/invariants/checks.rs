//! Standard invariant checks.

use std::fmt::Debug;

use super::{Invariant, InvariantKind, InvariantResult, TraceSnapshot, Violation};

/// At most one transition runs at any moment.
///
/// Update functions are pure and the loop serializes them; two overlapping
/// calls mean the event processor let a second worker in.
pub struct SequentialTransitions;

impl<M, E> Invariant<M, E> for SequentialTransitions {
    fn kind(&self) -> InvariantKind {
        InvariantKind::SequentialTransitions
    }

    fn check(&self, trace: &TraceSnapshot<M, E>) -> InvariantResult {
        if trace.max_concurrent > 1 {
            return Err(Violation {
                invariant: InvariantKind::SequentialTransitions,
                message: format!("{} transitions ran concurrently", trace.max_concurrent),
            });
        }
        Ok(())
    }
}

/// No event is applied once the loop has been disposed.
pub struct NoTransitionsAfterDispose;

impl<M, E: Debug> Invariant<M, E> for NoTransitionsAfterDispose {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoTransitionsAfterDispose
    }

    fn check(&self, trace: &TraceSnapshot<M, E>) -> InvariantResult {
        let Some(at_dispose) = trace.transitions_at_dispose else {
            return Ok(());
        };
        if let Some(late) = trace.transitions.get(at_dispose) {
            return Err(Violation {
                invariant: InvariantKind::NoTransitionsAfterDispose,
                message: format!(
                    "{} transition(s) after dispose, first was event {:?}",
                    trace.transitions.len() - at_dispose,
                    late.event
                ),
            });
        }
        Ok(())
    }
}

/// Every transition starts from the model the previous one left behind, and
/// an observer attached from the start saw exactly those models.
///
/// When observed models are recorded, the first is the model the loop
/// started with (or init produced) and the rest must equal the produced
/// models in order.
pub struct ModelsMatchTransitions;

impl<M: PartialEq + Debug, E> Invariant<M, E> for ModelsMatchTransitions {
    fn kind(&self) -> InvariantKind {
        InvariantKind::ModelsMatchTransitions
    }

    fn check(&self, trace: &TraceSnapshot<M, E>) -> InvariantResult {
        for pair in trace.transitions.windows(2) {
            let [previous, current] = pair else { continue };
            let expected = previous.after.as_ref().unwrap_or(&previous.before);
            if &current.before != expected {
                return Err(Violation {
                    invariant: InvariantKind::ModelsMatchTransitions,
                    message: format!(
                        "transition {} started from {:?}, previous left {:?}",
                        current.index, current.before, expected
                    ),
                });
            }
        }

        let Some((start, observed)) = trace.observed_models.split_first() else {
            return Ok(());
        };
        if let Some(first) = trace.transitions.first()
            && &first.before != start
        {
            return Err(Violation {
                invariant: InvariantKind::ModelsMatchTransitions,
                message: format!(
                    "observer started at {start:?} but first transition saw {:?}",
                    first.before
                ),
            });
        }

        let produced: Vec<&M> = trace.produced_models().collect();
        let observed: Vec<&M> = observed.iter().collect();
        if produced != observed {
            return Err(Violation {
                invariant: InvariantKind::ModelsMatchTransitions,
                message: format!("observed {observed:?}, produced {produced:?}"),
            });
        }
        Ok(())
    }
}

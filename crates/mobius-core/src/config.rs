//! Loop configuration.

use crate::WorkRunnerFactory;

/// Default loop label.
pub const DEFAULT_LOOP_NAME: &str = "mobius";

/// Which kind of work runner to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerKind {
    /// Run on the posting thread
    #[default]
    Immediate,
    /// Run on one dedicated thread, in order
    SingleThread,
    /// Run on a fixed pool of threads
    ThreadPool {
        /// Worker thread count (at least one is started)
        threads: usize,
    },
}

impl RunnerKind {
    /// Factory for this kind. Threads are named after `name`.
    pub fn factory(&self, name: &str) -> WorkRunnerFactory {
        match *self {
            Self::Immediate => WorkRunnerFactory::immediate(),
            Self::SingleThread => WorkRunnerFactory::single_thread(name),
            Self::ThreadPool { threads } => WorkRunnerFactory::thread_pool(name, threads),
        }
    }
}

/// Loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Label attached to log records and runner thread names
    pub name: String,
    /// Runner delivering models to observers
    pub model_runner: RunnerKind,
    /// Runner delivering effects to the effect handler
    pub effect_runner: RunnerKind,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_LOOP_NAME.to_string(),
            model_runner: RunnerKind::Immediate,
            effect_runner: RunnerKind::SingleThread,
        }
    }
}

impl LoopConfig {
    /// Factory for the model runner. Threads are named `<name>-models`.
    pub fn model_runner_factory(&self) -> WorkRunnerFactory {
        self.model_runner.factory(&format!("{}-models", self.name))
    }

    /// Factory for the effect runner. Threads are named `<name>-effects`.
    pub fn effect_runner_factory(&self) -> WorkRunnerFactory {
        self.effect_runner.factory(&format!("{}-effects", self.name))
    }
}

//! Mobius counter demo.
//!
//! # Usage
//!
//! ```bash
//! # Start at 10, run delayed increments on four threads
//! mobius-demo --start 10 --effect-threads 4 --latency-ms 500
//! ```
//!
//! Commands, one per line on stdin: `+`, `-`, `reset`, `later`, `stop`,
//! `start`, `quit`. `stop` disposes the running loop and keeps its count;
//! `start` resumes from it, restarting any delayed increments still pending.

mod app;
mod view;

use std::{
    io::{self, BufRead, Write},
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use clap::Parser;
use mobius_core::{Connectable, LoopBuilder, LoopConfig, MobiusLoopController, RunnerKind};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    app::{Counter, CounterEffects, Effect, Event},
    view::TerminalView,
};

/// Counter driven by a Mobius loop
#[derive(Parser, Debug)]
#[command(name = "mobius-demo")]
#[command(about = "Terminal counter driven through a Mobius loop controller")]
#[command(version)]
struct Args {
    /// Initial count
    #[arg(long, default_value = "0")]
    start: u64,

    /// Threads handling effects
    #[arg(long, default_value = "2")]
    effect_threads: usize,

    /// Delay before a `later` increment lands, in milliseconds
    #[arg(long, default_value = "1000")]
    latency_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Event(Event),
    Stop,
    Start,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let command = match line.trim() {
        "+" => Command::Event(Event::Increment),
        "-" => Command::Event(Event::Decrement),
        "reset" => Command::Event(Event::Reset),
        "later" => Command::Event(Event::Later),
        "stop" => Command::Stop,
        "start" => Command::Start,
        "quit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

/// Read stdin on its own thread so the main thread only ever talks to the
/// controller. The channel closes at end of input.
fn spawn_input() -> io::Result<mpsc::Receiver<Command>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new().name("stdin".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                },
                None if line.trim().is_empty() => {},
                None => tracing::warn!(input = %line.trim(), "unknown command"),
            }
        }
    })?;
    Ok(rx)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = LoopConfig {
        name: "counter".into(),
        model_runner: RunnerKind::Immediate,
        effect_runner: RunnerKind::ThreadPool { threads: args.effect_threads.max(1) },
    };
    let builder = LoopBuilder::new(
        app::update,
        CounterEffects::new(Duration::from_millis(args.latency_ms)),
    )
    .init(app::init)
    .config(config);

    let controller: MobiusLoopController<Counter, Event, Effect> =
        MobiusLoopController::new(builder, Counter::new(args.start));
    let view = Arc::new(TerminalView::<Counter, Event>::new());

    controller.connect(Arc::clone(&view) as Arc<dyn Connectable<Counter, Event>>)?;
    controller.start()?;
    tracing::info!("counter running");

    for command in spawn_input()? {
        match command {
            Command::Event(event) => {
                if !controller.is_running() {
                    tracing::warn!(?event, "counter stopped, event dropped");
                }
                view.send(event);
            },
            Command::Stop => match controller.stop() {
                Ok(()) => tracing::info!(model = %controller.model(), "counter stopped"),
                Err(e) => tracing::warn!(error = %e, "stop refused"),
            },
            Command::Start => match controller.start() {
                Ok(()) => tracing::info!("counter resumed"),
                Err(e) => tracing::warn!(error = %e, "start refused"),
            },
            Command::Quit => break,
        }
    }

    if controller.is_running() {
        controller.stop()?;
    }
    controller.disconnect()?;

    writeln!(io::stdout().lock(), "final {}", controller.model())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_surrounding_whitespace() {
        assert_eq!(parse_command(" + "), Some(Command::Event(Event::Increment)));
        assert_eq!(parse_command("later\n"), Some(Command::Event(Event::Later)));
        assert_eq!(parse_command("stop"), Some(Command::Stop));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command("jump"), None);
    }
}

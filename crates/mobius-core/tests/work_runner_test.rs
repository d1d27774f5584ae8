//! Loops and connections on a tokio runtime.

#![allow(clippy::unwrap_used)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use mobius_core::{
    AsyncConnectable, Connectable, Connection, ConnectionError, Consumer, LoopBuilder, Next,
    TokioWorkRunner, WorkRunner, WorkRunnerConnectable, WorkRunnerFactory, connection,
};
use mobius_harness::{RecordingConnectable, RecordingConsumer};
use tokio::runtime::Handle;

const WAIT: Duration = Duration::from_secs(5);

type Connected = Result<Box<dyn Connection<u32>>, ConnectionError>;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn effects_run_on_the_runtime() {
    let update = |count: &u32, event: u32| -> Next<u32, u32> {
        if event == 0 { Next::dispatch([1, 1, 1]) } else { Next::next(count + event) }
    };
    let handler = |events: Arc<dyn Consumer<u32>>| -> Connected {
        Ok(Box::new(connection::from_fn(move |effect: u32| events.accept(effect))))
    };

    let mobius_loop = LoopBuilder::new(update, handler)
        .effect_runner(WorkRunnerFactory::tokio(Handle::current()))
        .start_from(0)
        .unwrap();
    let observer = Arc::new(RecordingConsumer::new());
    mobius_loop.observe(Arc::clone(&observer) as Arc<dyn Consumer<u32>>).unwrap();

    mobius_loop.dispatch_event(0).unwrap();

    let waiter = Arc::clone(&observer);
    let reached =
        tokio::task::spawn_blocking(move || waiter.wait_for_count(4, WAIT)).await.unwrap();
    assert!(reached);
    assert_eq!(mobius_loop.most_recent_model(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disposed_runner_skips_pending_tasks() {
    let runner = TokioWorkRunner::current().unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    runner.dispose();
    let counter = Arc::clone(&ran);
    runner.post(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connection_inputs_hop_onto_the_runtime() {
    let view: Arc<RecordingConnectable<u32, u32>> = Arc::new(RecordingConnectable::new());
    let wrapped = WorkRunnerConnectable::new(
        Arc::clone(&view) as Arc<dyn Connectable<u32, u32>>,
        WorkRunnerFactory::tokio(Handle::current()),
    );

    let connection = wrapped.connect(Arc::new(|_event: u32| {})).unwrap();
    connection.accept(7);

    let recorded = view.connection();
    let waiter = Arc::clone(&recorded);
    let reached =
        tokio::task::spawn_blocking(move || waiter.wait_for_count(1, WAIT)).await.unwrap();
    assert!(reached);
    recorded.assert_values(&[7]);

    connection.dispose();
    assert!(recorded.is_disposed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_effect_handler_feeds_events_back() {
    let update = |count: &u32, event: u32| -> Next<u32, u32> {
        if event == 0 { Next::dispatch([1, 2]) } else { Next::next(count + event) }
    };
    let handler = AsyncConnectable::new(
        Handle::current(),
        |effect: u32, events: Arc<dyn Consumer<u32>>| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            events.accept(effect);
        },
    );

    let mobius_loop = LoopBuilder::new(update, handler)
        .model_runner(WorkRunnerFactory::immediate())
        .effect_runner(WorkRunnerFactory::immediate())
        .start_from(0)
        .unwrap();
    let observer = Arc::new(RecordingConsumer::<u32>::new());
    mobius_loop.observe(Arc::clone(&observer) as Arc<dyn Consumer<u32>>).unwrap();

    mobius_loop.dispatch_event(0).unwrap();

    let waiter = Arc::clone(&observer);
    let reached =
        tokio::task::spawn_blocking(move || waiter.wait_for_count(3, WAIT)).await.unwrap();
    assert!(reached);
    assert_eq!(mobius_loop.most_recent_model(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_connection_emits_nothing_after_dispose() {
    let handler = AsyncConnectable::new(
        Handle::current(),
        |input: u32, output: Arc<dyn Consumer<u32>>| async move {
            if input > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            output.accept(input);
        },
    );
    let recorder = Arc::new(RecordingConsumer::<u32>::new());
    let connection = handler.connect(Arc::clone(&recorder) as Arc<dyn Consumer<u32>>).unwrap();

    connection.accept(0);
    connection.accept(1);
    let waiter = Arc::clone(&recorder);
    let reached =
        tokio::task::spawn_blocking(move || waiter.wait_for_count(1, WAIT)).await.unwrap();
    assert!(reached);

    connection.dispose();
    connection.accept(2);
    tokio::time::sleep(Duration::from_millis(100)).await;

    recorder.assert_values(&[0]);
}

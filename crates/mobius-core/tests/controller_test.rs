//! Controller lifecycle: state machine, model persistence and view binding.

#![allow(clippy::unwrap_used, clippy::ptr_arg)]

use std::{io, sync::Arc};

use mobius_core::{
    Connectable, ControllerState, LoopBuilder, LoopError, MobiusLoopController, Next, WorkRunner,
    WorkRunnerFactory,
};
use mobius_harness::{NoopConnectable, RecordingConnectable, TestWorkRunner};

type View = RecordingConnectable<String, String>;

fn append(model: &String, event: String) -> Next<String, String> {
    Next::next(format!("{model}{event}"))
}

fn builder() -> LoopBuilder<String, String, String> {
    LoopBuilder::new(append, NoopConnectable)
        .model_runner(WorkRunnerFactory::immediate())
        .effect_runner(WorkRunnerFactory::immediate())
}

fn controller() -> MobiusLoopController<String, String, String> {
    MobiusLoopController::new(builder(), "init".to_string())
}

fn connect(controller: &MobiusLoopController<String, String, String>) -> Arc<View> {
    let view = Arc::new(View::new());
    controller.connect(Arc::clone(&view) as Arc<dyn Connectable<String, String>>).unwrap();
    view
}

#[track_caller]
fn assert_invalid(result: Result<(), LoopError>, state: ControllerState) {
    let err = result.err().unwrap();
    assert!(matches!(err, LoopError::InvalidState { state: s, .. } if s == state), "{err}");
    assert!(err.to_string().contains(&state.to_string()), "{err}");
}

#[test]
fn operations_out_of_order_name_the_current_state() {
    let controller = controller();
    assert_invalid(controller.start(), ControllerState::Init);
    assert_invalid(controller.stop(), ControllerState::Init);
    assert_invalid(controller.disconnect(), ControllerState::Init);

    let view = connect(&controller);
    let again = controller.connect(Arc::clone(&view) as Arc<dyn Connectable<String, String>>);
    assert_invalid(again, ControllerState::Created);
    assert_invalid(controller.stop(), ControllerState::Created);

    controller.start().unwrap();
    assert_invalid(controller.start(), ControllerState::Running);
    assert_invalid(controller.disconnect(), ControllerState::Running);
    assert_invalid(controller.replace_model("other".into()), ControllerState::Running);
    assert_eq!(controller.state(), ControllerState::Running);
}

#[test]
fn restart_resumes_from_the_last_model() {
    let controller = controller();
    let view = connect(&controller);

    controller.start().unwrap();
    assert!(view.emit("!".into()));
    assert_eq!(controller.model(), "init!");
    controller.stop().unwrap();

    assert_eq!(controller.model(), "init!");
    controller.start().unwrap();
    view.connection().assert_values(&["init".into(), "init!".into(), "init!".into()]);
}

#[test]
fn replaced_model_is_used_by_next_start() {
    let controller = controller();
    controller.replace_model("restored".into()).unwrap();
    let _view = connect(&controller);

    controller.start().unwrap();
    assert_eq!(controller.model(), "restored");
    assert!(controller.is_running());
}

#[test]
fn view_events_are_dropped_while_stopped() {
    let controller = controller();
    let view = connect(&controller);

    assert!(view.emit("early".into()));
    controller.start().unwrap();
    controller.stop().unwrap();
    assert!(view.emit("late".into()));

    assert_eq!(controller.model(), "init");
}

#[test]
fn disconnect_disposes_view_and_silences_it() {
    let controller = controller();
    let view = Arc::new(View::single_connection());
    controller.connect(Arc::clone(&view) as Arc<dyn Connectable<String, String>>).unwrap();

    controller.start().unwrap();
    view.emit("2".into());
    controller.stop().unwrap();
    controller.disconnect().unwrap();

    let rendered = view.connection();
    rendered.assert_values(&["init".into(), "init2".into()]);
    assert!(rendered.is_disposed());
    assert_eq!(controller.state(), ControllerState::Init);

    controller.connect(Arc::clone(&view) as Arc<dyn Connectable<String, String>>).unwrap();
    controller.start().unwrap();
    assert_eq!(view.connect_count(), 2);
    assert_eq!(controller.model(), "init2");
}

#[test]
fn failed_start_leaves_controller_created() {
    let broken = builder().model_runner(WorkRunnerFactory::new(
        || -> io::Result<Arc<dyn WorkRunner>> { Err(io::Error::other("no runner")) },
    ));
    let controller = MobiusLoopController::new(broken, "init".to_string());
    let _view = connect(&controller);

    let err = controller.start().err().unwrap();
    assert!(matches!(err, LoopError::RunnerUnavailable(_)));
    assert_eq!(controller.state(), ControllerState::Created);
}

#[test]
fn models_reach_the_view_on_its_runner() {
    let runner = Arc::new(TestWorkRunner::new());
    let controller = controller().with_view_runner(TestWorkRunner::factory(&runner));
    let view = connect(&controller);

    controller.start().unwrap();
    view.emit("!".into());
    assert_eq!(view.connection().value_count(), 0);

    runner.run_all();
    view.connection().assert_values(&["init".into(), "init!".into()]);

    controller.stop().unwrap();
    controller.disconnect().unwrap();
    assert!(runner.is_disposed());
}

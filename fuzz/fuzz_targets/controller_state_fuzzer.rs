//! Fuzz target for the controller state machine
//!
//! Apply arbitrary operation sequences to a controller and to a reference
//! model of its three states, and compare every outcome.
//!
//! # Invariants
//!
//! - An operation succeeds exactly when the reference allows it
//! - Refused operations leave the state unchanged and name it in the error
//! - The saved model survives stop/start and is only replaceable when not
//!   running
//! - View events change the model only while running

#![no_main]

use std::sync::{Arc, Mutex, PoisonError};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mobius_core::{
    Connectable, Connection, ConnectionError, Consumer, ControllerState, LoopBuilder, LoopError,
    MobiusLoopController, Next, WorkRunnerFactory, connection,
};

#[derive(Debug, Clone, Copy, Arbitrary)]
enum ControllerOp {
    Connect,
    Start,
    Stop,
    Disconnect,
    Emit(u8),
    Replace(u8),
}

/// View that keeps the consumer it was connected with.
#[derive(Default)]
struct CapturingView {
    output: Mutex<Option<Arc<dyn Consumer<u8>>>>,
}

impl CapturingView {
    fn emit(&self, event: u8) {
        let output = self.output.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(output) = output {
            output.accept(event);
        }
    }
}

impl Connectable<u64, u8> for CapturingView {
    fn connect(
        &self,
        output: Arc<dyn Consumer<u8>>,
    ) -> Result<Box<dyn Connection<u64>>, ConnectionError> {
        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
        Ok(Box::new(connection::from_fn(|_model: u64| {})))
    }
}

fn update(model: &u64, event: u8) -> Next<u64, ()> {
    Next::next(model.wrapping_add(u64::from(event)))
}

fn no_effects(_events: Arc<dyn Consumer<u8>>) -> Result<Box<dyn Connection<()>>, ConnectionError> {
    Ok(Box::new(connection::from_fn(|_effect: ()| {})))
}

fn check(result: Result<(), LoopError>, allowed: bool, state: ControllerState) {
    match result {
        Ok(()) => assert!(allowed, "operation accepted in state {state}"),
        Err(e) => {
            assert!(!allowed, "operation refused: {e}");
            assert!(e.to_string().contains(&state.to_string()));
        },
    }
}

fuzz_target!(|ops: Vec<ControllerOp>| {
    let builder = LoopBuilder::new(update, no_effects)
        .model_runner(WorkRunnerFactory::immediate())
        .effect_runner(WorkRunnerFactory::immediate());
    let controller = MobiusLoopController::new(builder, 0u64);
    let mut view = Arc::new(CapturingView::default());

    let mut state = ControllerState::Init;
    let mut model = 0u64;

    for op in ops {
        match op {
            ControllerOp::Connect => {
                if state == ControllerState::Init {
                    view = Arc::new(CapturingView::default());
                }
                let result =
                    controller.connect(Arc::clone(&view) as Arc<dyn Connectable<u64, u8>>);
                check(result, state == ControllerState::Init, state);
                if state == ControllerState::Init {
                    state = ControllerState::Created;
                }
            },
            ControllerOp::Start => {
                check(controller.start(), state == ControllerState::Created, state);
                if state == ControllerState::Created {
                    state = ControllerState::Running;
                }
            },
            ControllerOp::Stop => {
                check(controller.stop(), state == ControllerState::Running, state);
                if state == ControllerState::Running {
                    state = ControllerState::Created;
                }
            },
            ControllerOp::Disconnect => {
                check(controller.disconnect(), state == ControllerState::Created, state);
                if state == ControllerState::Created {
                    state = ControllerState::Init;
                }
            },
            ControllerOp::Emit(event) => {
                view.emit(event);
                if state == ControllerState::Running {
                    model = model.wrapping_add(u64::from(event));
                }
            },
            ControllerOp::Replace(value) => {
                let allowed = state != ControllerState::Running;
                check(controller.replace_model(u64::from(value)), allowed, state);
                if allowed {
                    model = u64::from(value);
                }
            },
        }

        assert_eq!(controller.state(), state);
        assert_eq!(controller.is_running(), state == ControllerState::Running);
        assert_eq!(controller.model(), model);
    }
});

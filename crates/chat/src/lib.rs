/// Session controller orchestrating store and gateway.
pub mod controller;
/// Event contracts between the controller and the presentation shell.
pub mod events;
/// Session lifecycle state machine.
pub mod message;

pub use controller::{SessionController, SubmitOutcome};
pub use events::{SessionEvent, SessionEvents};
pub use message::{
    RequestTicket, SessionPhase, SessionTransition, TransitionRejection, TransitionResult,
};

//! Resumable practice sessions: snapshot model, persistence, the practice
//! state machine and the orchestrator tying them to the API.

pub mod machine;
pub mod practice;
pub mod snapshot;
pub mod store;

pub use machine::{Action, Outcome, Phase, Rejection};
pub use practice::{PracticeEvent, PracticeSession, SessionView};
pub use store::SessionStore;

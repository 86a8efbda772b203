//! Role transitions
//!
//! The state machine, its durable store, and the readiness rules that gate
//! and confirm a transition.

mod preconditions;
mod state;
mod store;

pub use preconditions::{is_confirmed, ReadinessPolicy};
pub use state::{TransitionKind, TransitionState};
pub use store::{AttemptMarker, PersistedState, StateStore};

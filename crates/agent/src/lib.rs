//! The turn controller — the heart of Deskpilot.
//!
//! A turn follows a fixed cycle:
//!
//! 1. **Send** the recent conversation window plus the enabled action
//!    schemas to the model gateway
//! 2. **Extract** a structured action call from the reply, if any
//! 3. **If a call**: execute it through the runtime (confirmation gate
//!    included), feed a capped rendering of the result back into the
//!    conversation, loop back to step 1
//! 4. **If plain text**: strip stray call syntax and return it as the
//!    final reply
//!
//! The loop ends when the model answers in text, the iteration budget
//! runs out, or the gateway fails; all three end states are explicit in
//! the returned [`TurnOutcome`].

pub mod controller;
pub mod render;

pub use controller::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_WINDOW, TurnController, TurnOutcome, TurnTermination,
};
pub use render::{DEFAULT_RENDER_LIMIT, FALLBACK_REPLY, clean_final_reply, feedback_for_model};

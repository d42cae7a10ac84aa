//! Application layer: editing session, screen modes and the workflows
//! that tie the flow model to storage and the practice timer.

pub mod state;

pub use state::*;

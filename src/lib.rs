//! tflow - Terminal Yoga Flow Builder
//!
//! Build ordered yoga flows from a pose catalog, group poses into sections,
//! reorder poses and whole sections, and practice a flow with a timer.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;

//! Presentation layer: ratatui screens and keyboard handling.

pub mod ui;
pub mod input;

pub use ui::*;
pub use input::*;

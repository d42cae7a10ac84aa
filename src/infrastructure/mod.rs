//! Infrastructure layer: configuration, logging and everything that touches
//! disk, network or the system clipboard.

pub mod catalog_source;
pub mod clipboard;
pub mod config;
pub mod files;
pub mod logging;
pub mod persistence;

pub use catalog_source::*;
pub use clipboard::*;
pub use config::*;
pub use files::*;
pub use logging::*;
pub use persistence::*;

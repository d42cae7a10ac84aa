pub mod models;
pub mod sequence;
pub mod reorder;
pub mod catalog;
pub mod practice;
pub mod share;
pub mod errors;

pub use models::*;
pub use reorder::*;
pub use catalog::*;
pub use practice::*;
pub use share::*;
pub use errors::*;

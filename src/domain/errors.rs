use thiserror::Error;

use super::models::SectionId;

/// Rejections raised by flow and section operations.
///
/// Every variant is a no-op: the flow is left exactly as it was before the
/// call, and the message is meant to be shown to the user as a notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("Position {position} is out of range (flow has {len} poses)")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("Pose is already at that position")]
    SamePosition,
    #[error("Pose {position} is already grouped in section '{section}'")]
    AlreadyGrouped { position: usize, section: String },
    #[error("Pose is already in section '{0}'")]
    AlreadyInSection(String),
    #[error("Section has no poses")]
    EmptySection,
    #[error("Unknown section: {0}")]
    UnknownSection(SectionId),
    #[error("A section cannot be dropped onto itself")]
    SameSection,
    #[error("No poses selected")]
    NothingSelected,
    #[error("Flow has no poses to practice")]
    EmptyFlow,
}

pub type FlowResult<T> = Result<T, FlowError>;

/// Reasons a shared or downloaded flow could not be imported.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import payload is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("Share code is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Import payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Import payload is not UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("Invalid flow: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

pub type ImportResult<T> = Result<T, ImportError>;

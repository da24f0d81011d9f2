/// Error types for presentation-level operations
use crate::opc::OpcError;
use crate::xml::XmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PptxError {
    #[error("Slide index {index} out of range; presentation has {count} slide(s)")]
    SlideOutOfRange { index: usize, count: usize },

    #[error("Invalid presentation: {0}")]
    InvalidPresentation(String),

    #[error("Relationships file not found: {0}")]
    RelsNotFound(String),

    #[error("Relationship '{r_id}' not found in '{part}'")]
    RelationshipIdNotFound { part: String, r_id: String },

    #[error("Relationship target '{target}' not found from '{part}'")]
    TargetNotFound { part: String, target: String },

    #[error(transparent)]
    Opc(#[from] OpcError),

    #[error("XML error: {0}")]
    Xml(#[from] XmlError),
}

pub type Result<T> = std::result::Result<T, PptxError>;

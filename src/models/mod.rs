pub mod artifact;
pub mod document;
pub mod enums;

pub use artifact::*;
pub use document::*;
pub use enums::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Missing patient identifier")]
    MissingIdentifier,
}

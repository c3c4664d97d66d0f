use std::fmt;

/// Errors produced while decoding model values from their stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownVariant { field: &'static str, value: String },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownVariant { field, value } => {
                write!(f, "unknown {field}: {value}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;

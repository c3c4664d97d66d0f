use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MediaError::NotFound(_))
    }
}

impl From<lumen_model::ModelError> for MediaError {
    fn from(err: lumen_model::ModelError) -> Self {
        MediaError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

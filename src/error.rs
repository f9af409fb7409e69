//! Error types for Destilar

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No checkpoint at {checkpoint:?} and no teacher model (looked for {teacher:?})")]
    NoCheckpointAvailable {
        checkpoint: PathBuf,
        teacher: Option<PathBuf>,
    },

    #[error("{term} loss failed: {reason}")]
    Loss { term: String, reason: String },

    #[error("Metric error: {0}")]
    Metric(String),

    #[error("Image error: {0}")]
    Image(String),
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for SVM training, prediction and model I/O

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Model does not support probability estimates: {0}")]
    ProbabilityUnavailable(String),

    #[error("Invalid model file: {0}")]
    ModelFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, SVMError>;

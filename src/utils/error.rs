//! Error types and handling
//!
//! Errors raised by configuration and capture handling.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Command template error: {0}")]
    Template(String),
}

impl AppError {
    /// Short machine-readable code for log fields
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Template(_) => "TEMPLATE_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

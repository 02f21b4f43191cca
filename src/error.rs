//! Error types for feedhub.

use thiserror::Error;

/// Common error type for feedhub.
#[derive(Error, Debug)]
pub enum FeedhubError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for configuration or input values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Source could not be fetched or parsed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Filter rule could not be evaluated.
    #[error("filter error: {0}")]
    Filter(String),

    /// Notification delivery failed.
    #[error("notify error: {0}")]
    Notify(String),

    /// Feed rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// Template error.
    #[error("template error: {0}")]
    Template(#[from] crate::template::TemplateError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected failure, such as a panicked computation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for FeedhubError {
    fn from(e: sqlx::Error) -> Self {
        FeedhubError::Database(e.to_string())
    }
}

/// Result type alias for feedhub operations.
pub type Result<T> = std::result::Result<T, FeedhubError>;

use thiserror::Error;

/// Errors produced by pure domain validation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
}

use thiserror::Error;

/// Errors from the object storage layer. SDK errors are flattened to
/// their full display chain; callers only branch on success/failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("s3 {op} failed for {key:?}: {message}")]
    Operation {
        op: &'static str,
        key: String,
        message: String,
    },
}

impl StorageError {
    pub(crate) fn operation(
        op: &'static str,
        key: impl Into<String>,
        error: impl std::fmt::Display,
    ) -> Self {
        StorageError::Operation {
            op,
            key: key.into(),
            message: error.to_string(),
        }
    }
}

//! Error type for synchronization runs.
//!
//! Remote-side failures (listing pages, detail fetches, artifact
//! downloads) are absorbed where they happen and surface as counters,
//! so the variants here cover only the failures that abort a whole
//! run: the database, the object store's listing call, and bad input.

use thiserror::Error;

use nfse_cloud::StorageError;
use nfse_core::CoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

//! Synchronization engine for mirrored fiscal service notes.
//!
//! Pulls notes from the remote API and the artifact bucket, reconciles
//! them against the stored rows, and keeps artifacts and access links
//! current. One [`SyncEngine`] instance drives all run modes; each
//! public run method logs itself to `sync_logs`.

pub mod artifacts;
pub mod config;
pub mod engine;
pub mod error;
pub mod links;
pub mod paginator;
pub mod reconcile;
pub mod repair;
pub mod resolver;
pub mod upsert;

pub use config::SyncConfig;
pub use engine::{RunOutcome, SyncEngine};
pub use error::SyncError;

//! Sync run log entity model and DTO.

use nfse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the append-only `sync_logs` table: one engine invocation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncLog {
    pub id: DbId,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    /// `completed` or `failed`.
    pub status: String,
    pub found_count: i32,
    pub synced_count: i32,
    pub error_summary: Option<String>,
    /// Free-form run context: source, filters.
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for appending a run log.
#[derive(Debug, Clone)]
pub struct NewSyncLog {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub status: String,
    pub found_count: i32,
    pub synced_count: i32,
    pub error_summary: Option<String>,
    pub metadata: serde_json::Value,
}

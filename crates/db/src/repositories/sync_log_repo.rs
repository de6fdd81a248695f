//! Repository for the append-only `sync_logs` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewSyncLog, SyncLog};

/// Column list for `sync_logs` queries.
const LOG_COLUMNS: &str = "\
    id, started_at, finished_at, status, \
    found_count, synced_count, error_summary, metadata, created_at";

/// Append-only run log access.
pub struct SyncLogRepo;

impl SyncLogRepo {
    /// Record one engine invocation.
    pub async fn insert(pool: &PgPool, input: &NewSyncLog) -> Result<SyncLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_logs (\
                id, started_at, finished_at, status, \
                found_count, synced_count, error_summary, metadata, created_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now()) \
             RETURNING {LOG_COLUMNS}"
        );
        sqlx::query_as::<_, SyncLog>(&query)
            .bind(Uuid::new_v4())
            .bind(input.started_at)
            .bind(input.finished_at)
            .bind(&input.status)
            .bind(input.found_count)
            .bind(input.synced_count)
            .bind(input.error_summary.as_deref())
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }
}

//! Company entity model.

use nfse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `companies` table. Companies are provisioned outside
/// the engine; the sync only reads them and stamps `last_sync_at`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Company {
    pub id: DbId,
    pub name: String,
    /// CNPJ as provisioned, either punctuated or raw digits.
    pub tax_id: String,
    pub active: bool,
    pub last_sync_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

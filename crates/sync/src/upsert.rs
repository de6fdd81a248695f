//! Persistence of one reconciled note.

use sqlx::PgPool;

use nfse_core::identity::IdentityAction;
use nfse_db::models::{ServiceNote, UpsertNote};
use nfse_db::repositories::ServiceNoteRepo;

/// Apply a resolved action to the store.
///
/// An upgrade writes the row under its new identity first and deletes
/// the superseded row only after that write has returned, so a crash in
/// between leaves a duplicate rather than a loss.
pub async fn apply(
    pool: &PgPool,
    action: &IdentityAction,
    note: &UpsertNote,
) -> Result<ServiceNote, sqlx::Error> {
    match action {
        IdentityAction::Insert { .. } => ServiceNoteRepo::insert(pool, note).await,
        IdentityAction::Update { identity } => write_under(pool, identity, note).await,
        IdentityAction::Upgrade {
            identity,
            superseded,
        } => {
            let row = write_under(pool, identity, note).await?;
            if ServiceNoteRepo::delete_by_identity(pool, superseded).await? {
                tracing::info!(identity, superseded, "identity upgraded");
            }
            Ok(row)
        }
    }
}

/// Merge into the row under `identity`, inserting when the row is gone
/// (deleted between resolution and write).
async fn write_under(
    pool: &PgPool,
    identity: &str,
    note: &UpsertNote,
) -> Result<ServiceNote, sqlx::Error> {
    match ServiceNoteRepo::update_by_identity(pool, identity, note).await? {
        Some(row) => Ok(row),
        None => ServiceNoteRepo::insert(pool, note).await,
    }
}

//! Bulk refresh of presigned access links.
//!
//! Presigned links expire on their own schedule, so this pass walks
//! every active note with a mirrored artifact and rewrites its links
//! from the stored bucket keys. Each note is handled on its own; a
//! presign or write failure is counted and the walk moves on.

use std::time::Duration;

use sqlx::PgPool;

use nfse_cloud::ObjectStore;
use nfse_db::repositories::ServiceNoteRepo;

use crate::error::SyncError;

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkRefreshOutcome {
    pub scanned: usize,
    pub refreshed: usize,
    pub errors: usize,
}

pub async fn refresh_links(
    pool: &PgPool,
    store: &ObjectStore,
    ttl: Duration,
) -> Result<LinkRefreshOutcome, SyncError> {
    let notes = ServiceNoteRepo::list_active_with_artifacts(pool).await?;
    let mut outcome = LinkRefreshOutcome {
        scanned: notes.len(),
        ..Default::default()
    };

    for note in notes {
        let identity = note.canonical_identity.as_str();
        let mut failed = false;

        let pdf = presign(store, note.artifact_path_pdf.as_deref(), ttl, identity, &mut failed).await;
        let xml = presign(store, note.artifact_path_xml.as_deref(), ttl, identity, &mut failed).await;

        if pdf.is_some() || xml.is_some() {
            match ServiceNoteRepo::update_links(pool, note.id, pdf.as_deref(), xml.as_deref()).await
            {
                Ok(_) => outcome.refreshed += 1,
                Err(error) => {
                    tracing::warn!(identity, error = %error, "link write failed");
                    failed = true;
                }
            }
        }
        if failed {
            outcome.errors += 1;
        }
    }

    tracing::info!(
        scanned = outcome.scanned,
        refreshed = outcome.refreshed,
        errors = outcome.errors,
        "link refresh finished"
    );
    Ok(outcome)
}

async fn presign(
    store: &ObjectStore,
    key: Option<&str>,
    ttl: Duration,
    identity: &str,
    failed: &mut bool,
) -> Option<String> {
    let key = key?;
    match store.presign_get(key, ttl).await {
        Ok(url) => Some(url),
        Err(error) => {
            tracing::warn!(identity, key, error = %error, "presigning failed");
            *failed = true;
            None
        }
    }
}

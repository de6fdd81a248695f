//! Identity resolution against the store.
//!
//! Decision logic lives in [`nfse_core::identity`]; this module feeds it
//! the lookup results. The official id is probed first and the content
//! key only on a miss, so one resolution costs at most two queries.

use sqlx::PgPool;

use nfse_core::identity::{self, IdentityAction, IdentityCandidate};
use nfse_db::models::ServiceNote;
use nfse_db::repositories::ServiceNoteRepo;

/// A resolved candidate: what to do, and the row it merges into or
/// supersedes when one exists.
#[derive(Debug)]
pub struct Resolved {
    pub action: IdentityAction,
    pub existing: Option<ServiceNote>,
}

/// Resolve a candidate against stored rows. Returns `None` for
/// candidates with no usable identity at all.
pub async fn resolve(
    pool: &PgPool,
    candidate: &IdentityCandidate,
) -> Result<Option<Resolved>, sqlx::Error> {
    let mut official_row = None;
    if let Some(id) = candidate.official_id.as_deref() {
        official_row = ServiceNoteRepo::find_by_identity(pool, id).await?;
    }

    let mut content_row = None;
    if official_row.is_none() {
        if let (Some(number), Some(issuer)) = (
            candidate.invoice_number.as_deref(),
            candidate.issuer_tax_id.as_deref(),
        ) {
            content_row = ServiceNoteRepo::find_by_content_key(pool, number, issuer).await?;
        }
    }

    let action = identity::resolve_action(
        candidate,
        official_row.as_ref().map(|row| row.canonical_identity.as_str()),
        content_row.as_ref().map(|row| row.canonical_identity.as_str()),
    );
    Ok(action.map(|action| Resolved {
        action,
        existing: official_row.or(content_row),
    }))
}

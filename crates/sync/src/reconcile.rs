//! Field-level reconciliation of one note.
//!
//! Merge priority per field: fresh source data beats stored data, stored
//! data beats defaults. The write set produced here leans on the
//! repository's merge semantics for the stored side (`None` keeps the
//! column), and applies the value rules that need the loaded row: a
//! non-positive fresh total never replaces a stored positive one, and
//! completeness is judged against the merged state, not the fresh data
//! alone.

use chrono::NaiveDate;

use nfse_core::cnpj;
use nfse_core::payload::NoteDraft;
use nfse_core::status::{Provenance, RecordStatus, SyncStatus};
use nfse_core::types::DbId;
use nfse_db::models::{ServiceNote, UpsertNote};

use crate::artifacts::{ArtifactLinks, ArtifactPaths};

/// Issue date recorded when no source ever supplied one.
pub(crate) fn default_issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date")
}

/// Build the write set for one reconciled note.
///
/// `existing` is the row the identity resolution found, if any. The
/// invoice number falls back to the stored one and finally to the
/// identity itself, so the column never goes empty.
pub fn build_note(
    draft: &NoteDraft,
    existing: Option<&ServiceNote>,
    identity: &str,
    paths: &ArtifactPaths,
    links: &ArtifactLinks,
    provenance: Provenance,
    owning_company_id: Option<DbId>,
) -> UpsertNote {
    let invoice_number = draft
        .invoice_number
        .clone()
        .or_else(|| existing.map(|row| row.invoice_number.clone()))
        .unwrap_or_else(|| identity.to_string());
    let issue_date = draft
        .issue_date
        .or(existing.map(|row| row.issue_date))
        .unwrap_or_else(default_issue_date);
    let total_value = if draft.total_value > 0.0 {
        draft.total_value
    } else {
        existing
            .map(|row| row.total_value)
            .filter(|v| *v > 0.0)
            .unwrap_or(0.0)
    };
    let recipient_known = draft.recipient_payload.is_some()
        || existing.is_some_and(|row| row.recipient_payload.is_some());
    let sync_status = if total_value > 0.0 && recipient_known {
        SyncStatus::Synced
    } else {
        SyncStatus::Partial
    };

    UpsertNote {
        canonical_identity: identity.to_string(),
        invoice_number,
        series: draft.series.clone(),
        official_id_of_origin: draft.origin_id.clone(),
        official_status: draft.official_status.clone(),
        access_key: draft.access_key.clone(),
        issuer_tax_id: draft.issuer_tax_id.as_deref().map(cnpj::display),
        recipient_tax_id: draft.recipient_tax_id.as_deref().map(cnpj::display),
        issuer_payload: draft.issuer_payload.clone(),
        recipient_payload: draft.recipient_payload.clone(),
        issue_date,
        total_value,
        artifact_path_pdf: paths.pdf.clone(),
        artifact_path_xml: paths.xml.clone(),
        access_link_pdf: links.pdf.clone(),
        access_link_xml: links.xml.clone(),
        sync_status: sync_status.as_str().to_string(),
        status: RecordStatus::Active.as_str().to_string(),
        source_provenance: provenance.as_str().to_string(),
        owning_company_id: owning_company_id.or_else(|| existing.and_then(|row| row.owning_company_id)),
    }
}

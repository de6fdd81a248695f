//! Service note entity model and write DTO.

use chrono::NaiveDate;
use nfse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `service_notes` table: one mirrored fiscal note.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ServiceNote {
    pub id: DbId,
    /// Unique identity: the official source id, or the deterministic
    /// `{number}_{issuer_digits}` fallback.
    pub canonical_identity: String,
    pub invoice_number: String,
    pub series: Option<String>,
    pub official_id_of_origin: Option<String>,
    pub official_status: Option<String>,
    pub access_key: Option<String>,
    /// Punctuated display form when known.
    pub issuer_tax_id: Option<String>,
    pub recipient_tax_id: Option<String>,
    pub issuer_payload: Option<serde_json::Value>,
    pub recipient_payload: Option<serde_json::Value>,
    pub issue_date: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub total_value: f64,
    pub artifact_path_pdf: Option<String>,
    pub artifact_path_xml: Option<String>,
    pub access_link_pdf: Option<String>,
    pub access_link_xml: Option<String>,
    pub sync_status: String,
    pub status: String,
    pub source_provenance: String,
    pub owning_company_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Field set produced by one reconciliation, ready to insert under a new
/// identity or merge into an existing row. `None` means "unknown": the
/// repository keeps whatever the row already has for that column.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertNote {
    pub canonical_identity: String,
    pub invoice_number: String,
    pub series: Option<String>,
    pub official_id_of_origin: Option<String>,
    pub official_status: Option<String>,
    pub access_key: Option<String>,
    pub issuer_tax_id: Option<String>,
    pub recipient_tax_id: Option<String>,
    pub issuer_payload: Option<serde_json::Value>,
    pub recipient_payload: Option<serde_json::Value>,
    pub issue_date: NaiveDate,
    /// `0.0` means "no positive value known"; a stored positive total is
    /// never overwritten by it.
    pub total_value: f64,
    pub artifact_path_pdf: Option<String>,
    pub artifact_path_xml: Option<String>,
    pub access_link_pdf: Option<String>,
    pub access_link_xml: Option<String>,
    pub sync_status: String,
    pub status: String,
    pub source_provenance: String,
    pub owning_company_id: Option<DbId>,
}

//! Repository for the `service_notes` table.
//!
//! Write semantics matter here: merges keep previously known values
//! (`COALESCE`) so a partial source never erases a complete one, and a
//! stored positive total survives an incoming zero.

use chrono::Datelike;
use nfse_core::cnpj;
use nfse_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ServiceNote, UpsertNote};

/// Column list for `service_notes` queries.
const NOTE_COLUMNS: &str = "\
    id, canonical_identity, invoice_number, series, \
    official_id_of_origin, official_status, access_key, \
    issuer_tax_id, recipient_tax_id, issuer_payload, recipient_payload, \
    issue_date, year, month, day, total_value, \
    artifact_path_pdf, artifact_path_xml, access_link_pdf, access_link_xml, \
    sync_status, status, source_provenance, owning_company_id, \
    created_at, updated_at";

/// CRUD for mirrored notes.
pub struct ServiceNoteRepo;

impl ServiceNoteRepo {
    /// Find a note by its canonical identity.
    pub async fn find_by_identity(
        pool: &PgPool,
        identity: &str,
    ) -> Result<Option<ServiceNote>, sqlx::Error> {
        let query = format!(
            "SELECT {NOTE_COLUMNS} FROM service_notes WHERE canonical_identity = $1"
        );
        sqlx::query_as::<_, ServiceNote>(&query)
            .bind(identity)
            .fetch_optional(pool)
            .await
    }

    /// Find a note by its content key. The issuer is compared in both
    /// stored forms because historical rows mix punctuated and raw.
    pub async fn find_by_content_key(
        pool: &PgPool,
        invoice_number: &str,
        issuer_tax_id: &str,
    ) -> Result<Option<ServiceNote>, sqlx::Error> {
        let (formatted, raw) = cnpj::both_forms(issuer_tax_id);
        let query = format!(
            "SELECT {NOTE_COLUMNS} FROM service_notes \
             WHERE invoice_number = $1 AND issuer_tax_id IN ($2, $3) \
             ORDER BY created_at LIMIT 1"
        );
        sqlx::query_as::<_, ServiceNote>(&query)
            .bind(invoice_number)
            .bind(formatted)
            .bind(raw)
            .fetch_optional(pool)
            .await
    }

    /// Insert a new note row.
    pub async fn insert(pool: &PgPool, input: &UpsertNote) -> Result<ServiceNote, sqlx::Error> {
        let query = format!(
            "INSERT INTO service_notes (\
                id, canonical_identity, invoice_number, series, \
                official_id_of_origin, official_status, access_key, \
                issuer_tax_id, recipient_tax_id, issuer_payload, recipient_payload, \
                issue_date, year, month, day, total_value, \
                artifact_path_pdf, artifact_path_xml, access_link_pdf, access_link_xml, \
                sync_status, status, source_provenance, owning_company_id, \
                created_at, updated_at\
             ) VALUES (\
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                $17, $18, $19, $20, $21, $22, $23, $24, now(), now()\
             ) RETURNING {NOTE_COLUMNS}"
        );
        sqlx::query_as::<_, ServiceNote>(&query)
            .bind(Uuid::new_v4())
            .bind(&input.canonical_identity)
            .bind(&input.invoice_number)
            .bind(input.series.as_deref())
            .bind(input.official_id_of_origin.as_deref())
            .bind(input.official_status.as_deref())
            .bind(input.access_key.as_deref())
            .bind(input.issuer_tax_id.as_deref())
            .bind(input.recipient_tax_id.as_deref())
            .bind(input.issuer_payload.as_ref())
            .bind(input.recipient_payload.as_ref())
            .bind(input.issue_date)
            .bind(input.issue_date.year())
            .bind(input.issue_date.month() as i32)
            .bind(input.issue_date.day() as i32)
            .bind(input.total_value)
            .bind(input.artifact_path_pdf.as_deref())
            .bind(input.artifact_path_xml.as_deref())
            .bind(input.access_link_pdf.as_deref())
            .bind(input.access_link_xml.as_deref())
            .bind(&input.sync_status)
            .bind(&input.status)
            .bind(&input.source_provenance)
            .bind(input.owning_company_id)
            .fetch_one(pool)
            .await
    }

    /// Merge a reconciled field set into the row under `identity`.
    ///
    /// Unknown (`None`) fields keep the stored value, and a stored
    /// positive total is kept when the incoming one is not positive.
    /// Returns `None` when no row carries that identity.
    pub async fn update_by_identity(
        pool: &PgPool,
        identity: &str,
        input: &UpsertNote,
    ) -> Result<Option<ServiceNote>, sqlx::Error> {
        let query = format!(
            "UPDATE service_notes SET \
                invoice_number = $2, \
                series = COALESCE($3, series), \
                official_id_of_origin = COALESCE($4, official_id_of_origin), \
                official_status = COALESCE($5, official_status), \
                access_key = COALESCE($6, access_key), \
                issuer_tax_id = COALESCE($7, issuer_tax_id), \
                recipient_tax_id = COALESCE($8, recipient_tax_id), \
                issuer_payload = COALESCE($9, issuer_payload), \
                recipient_payload = COALESCE($10, recipient_payload), \
                issue_date = $11, \
                year = $12, \
                month = $13, \
                day = $14, \
                total_value = CASE WHEN $15 > 0 THEN $15 ELSE total_value END, \
                artifact_path_pdf = COALESCE($16, artifact_path_pdf), \
                artifact_path_xml = COALESCE($17, artifact_path_xml), \
                access_link_pdf = COALESCE($18, access_link_pdf), \
                access_link_xml = COALESCE($19, access_link_xml), \
                sync_status = $20, \
                status = $21, \
                source_provenance = $22, \
                owning_company_id = COALESCE($23, owning_company_id), \
                updated_at = now() \
             WHERE canonical_identity = $1 \
             RETURNING {NOTE_COLUMNS}"
        );
        sqlx::query_as::<_, ServiceNote>(&query)
            .bind(identity)
            .bind(&input.invoice_number)
            .bind(input.series.as_deref())
            .bind(input.official_id_of_origin.as_deref())
            .bind(input.official_status.as_deref())
            .bind(input.access_key.as_deref())
            .bind(input.issuer_tax_id.as_deref())
            .bind(input.recipient_tax_id.as_deref())
            .bind(input.issuer_payload.as_ref())
            .bind(input.recipient_payload.as_ref())
            .bind(input.issue_date)
            .bind(input.issue_date.year())
            .bind(input.issue_date.month() as i32)
            .bind(input.issue_date.day() as i32)
            .bind(input.total_value)
            .bind(input.artifact_path_pdf.as_deref())
            .bind(input.artifact_path_xml.as_deref())
            .bind(input.access_link_pdf.as_deref())
            .bind(input.access_link_xml.as_deref())
            .bind(&input.sync_status)
            .bind(&input.status)
            .bind(&input.source_provenance)
            .bind(input.owning_company_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a superseded row. Callers must have durably written the
    /// replacement first.
    pub async fn delete_by_identity(pool: &PgPool, identity: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM service_notes WHERE canonical_identity = $1")
            .bind(identity)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active notes that have at least one mirrored artifact, for link
    /// refreshing.
    pub async fn list_active_with_artifacts(
        pool: &PgPool,
    ) -> Result<Vec<ServiceNote>, sqlx::Error> {
        let query = format!(
            "SELECT {NOTE_COLUMNS} FROM service_notes \
             WHERE status = 'active' \
               AND (artifact_path_pdf IS NOT NULL OR artifact_path_xml IS NOT NULL) \
             ORDER BY created_at"
        );
        sqlx::query_as::<_, ServiceNote>(&query).fetch_all(pool).await
    }

    /// Notes still missing a positive total or a structured recipient,
    /// oldest first. The repair pass works through these.
    pub async fn list_incomplete(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<ServiceNote>, sqlx::Error> {
        let query = format!(
            "SELECT {NOTE_COLUMNS} FROM service_notes \
             WHERE total_value <= 0 OR recipient_payload IS NULL \
             ORDER BY created_at LIMIT $1"
        );
        sqlx::query_as::<_, ServiceNote>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Write freshly presigned links, touching nothing else. `None`
    /// keeps the stored link for that kind.
    pub async fn update_links(
        pool: &PgPool,
        id: DbId,
        access_link_pdf: Option<&str>,
        access_link_xml: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE service_notes SET \
                access_link_pdf = COALESCE($2, access_link_pdf), \
                access_link_xml = COALESCE($3, access_link_xml), \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(access_link_pdf)
        .bind(access_link_xml)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

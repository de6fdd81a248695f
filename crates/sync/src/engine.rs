//! Run modes and the per-item pipeline.
//!
//! Every public method is one engine invocation and leaves one row in
//! `sync_logs`. Failures are handled at the smallest scope that can
//! contain them: a bad item or window is counted and skipped, and only
//! failures that sink the whole run (the database, the bucket listing,
//! rejected input) surface as errors.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;

use nfse_cloud::ObjectStore;
use nfse_core::cnpj;
use nfse_core::identity::IdentityCandidate;
use nfse_core::payload::NoteDraft;
use nfse_core::period::{self, DateWindow};
use nfse_core::status::{Provenance, RunStatus};
use nfse_core::storage_key::{self, ParsedKey};
use nfse_core::types::{DbId, Timestamp};
use nfse_db::models::NewSyncLog;
use nfse_db::repositories::{CompanyRepo, ServiceNoteRepo, SyncLogRepo};
use nfse_plugnotas::NoteSource;

use crate::artifacts::{self, ArtifactPaths};
use crate::error::SyncError;
use crate::links::{self, LinkRefreshOutcome};
use crate::paginator::PeriodPaginator;
use crate::reconcile;
use crate::repair::{self, RepairOutcome};
use crate::resolver;
use crate::upsert;

/// Aggregate counters for one run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunOutcome {
    pub found: usize,
    pub synced: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunOutcome {
    fn absorb(&mut self, other: RunOutcome) {
        self.found += other.found;
        self.synced += other.synced;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

enum ItemOutcome {
    Synced,
    Skipped,
}

pub struct SyncEngine<S: NoteSource> {
    pool: PgPool,
    source: S,
    store: ObjectStore,
    page_size: usize,
    link_ttl: Duration,
}

impl<S: NoteSource> SyncEngine<S> {
    pub fn new(
        pool: PgPool,
        source: S,
        store: ObjectStore,
        page_size: usize,
        link_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            source,
            store,
            page_size,
            link_ttl,
        }
    }

    // -----------------------------------------------------------------------
    // Run modes
    // -----------------------------------------------------------------------

    /// Mirror one company's notes over an explicit date range.
    pub async fn sync_company(
        &self,
        tax_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RunOutcome, SyncError> {
        let started_at = Utc::now();
        let result = self.sync_company_inner(tax_id, from, to).await;
        let metadata = json!({
            "source": Provenance::RemoteApi.as_str(),
            "cnpj_filter": cnpj::digits(tax_id),
        });
        self.record_run(started_at, metadata, &result).await;
        result
    }

    /// Scheduled pass: every active company, previous plus current
    /// calendar month.
    pub async fn sync_all(&self) -> Result<RunOutcome, SyncError> {
        let started_at = Utc::now();
        let result = self.sync_all_inner().await;
        let metadata = json!({
            "source": Provenance::RemoteApi.as_str(),
            "scope": "all-active",
        });
        self.record_run(started_at, metadata, &result).await;
        result
    }

    /// Rebuild note rows from what the bucket actually holds.
    pub async fn sync_storage(&self, recipient: Option<&str>) -> Result<RunOutcome, SyncError> {
        let started_at = Utc::now();
        let result = self.sync_storage_inner(recipient).await;
        let mut metadata = json!({ "source": Provenance::StorageListing.as_str() });
        if let Some(recipient) = recipient {
            metadata["cnpj_filter"] = json!(cnpj::digits(recipient));
        }
        self.record_run(started_at, metadata, &result).await;
        result
    }

    /// Re-presign the access links of every active note with a mirrored
    /// artifact.
    pub async fn refresh_links(&self) -> Result<LinkRefreshOutcome, SyncError> {
        let started_at = Utc::now();
        let result = links::refresh_links(&self.pool, &self.store, self.link_ttl).await;
        let (status, found, synced, summary) = match &result {
            Ok(o) => (
                RunStatus::Completed,
                o.scanned,
                o.refreshed,
                (o.errors > 0).then(|| format!("{} errors", o.errors)),
            ),
            Err(e) => (RunStatus::Failed, 0, 0, Some(e.to_string())),
        };
        self.append_log(started_at, status, found, synced, summary, json!({"source": "link-refresh"}))
            .await;
        result
    }

    /// Work through stored rows still missing a positive total or a
    /// structured recipient.
    pub async fn repair_incomplete(&self, limit: i64) -> Result<RepairOutcome, SyncError> {
        let started_at = Utc::now();
        let result = self.repair_inner(limit).await;
        let (status, found, synced, summary) = match &result {
            Ok(o) => (
                RunStatus::Completed,
                o.scanned,
                o.repaired,
                (o.misses + o.errors > 0)
                    .then(|| format!("{} misses, {} errors", o.misses, o.errors)),
            ),
            Err(e) => (RunStatus::Failed, 0, 0, Some(e.to_string())),
        };
        self.append_log(started_at, status, found, synced, summary, json!({"source": "repair"}))
            .await;
        result
    }

    // -----------------------------------------------------------------------
    // Remote listing passes
    // -----------------------------------------------------------------------

    async fn sync_company_inner(
        &self,
        tax_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RunOutcome, SyncError> {
        let target = cnpj::require_digits(tax_id)?;
        let company = CompanyRepo::find_by_tax_id(&self.pool, &target).await?;
        let windows = period::windows(from, to);
        tracing::info!(cnpj = %target, from = %from, to = %to, windows = windows.len(), "company sync started");

        let outcome = self
            .sync_windows(&target, company.as_ref().map(|c| c.id), windows)
            .await;

        if let Some(company) = &company {
            if let Err(error) = CompanyRepo::touch_last_sync(&self.pool, company.id).await {
                tracing::warn!(company = %company.name, error = %error, "last-sync stamp failed");
            }
        }
        tracing::info!(
            found = outcome.found,
            synced = outcome.synced,
            skipped = outcome.skipped,
            errors = outcome.errors,
            "company sync finished"
        );
        Ok(outcome)
    }

    async fn sync_all_inner(&self) -> Result<RunOutcome, SyncError> {
        let companies = CompanyRepo::list_active(&self.pool).await?;
        let windows = period::recent_month_windows(Utc::now().date_naive());
        tracing::info!(companies = companies.len(), "scheduled sync started");

        let mut total = RunOutcome::default();
        for company in companies {
            let target = cnpj::digits(&company.tax_id);
            if target.len() != 14 {
                tracing::warn!(company = %company.name, tax_id = %company.tax_id, "company has no usable CNPJ");
                total.errors += 1;
                continue;
            }
            let outcome = self
                .sync_windows(&target, Some(company.id), windows.clone())
                .await;
            tracing::info!(
                company = %company.name,
                found = outcome.found,
                synced = outcome.synced,
                errors = outcome.errors,
                "company pass finished"
            );
            if let Err(error) = CompanyRepo::touch_last_sync(&self.pool, company.id).await {
                tracing::warn!(company = %company.name, error = %error, "last-sync stamp failed");
            }
            total.absorb(outcome);
        }
        Ok(total)
    }

    /// One listing pass over a set of windows. Bad items and bad windows
    /// are absorbed into the counters.
    async fn sync_windows(
        &self,
        target: &str,
        company_id: Option<DbId>,
        windows: Vec<DateWindow>,
    ) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        let mut pages = PeriodPaginator::new(&self.source, target, windows, self.page_size);
        while let Some(raw) = pages.next().await {
            outcome.found += 1;
            match self
                .process_item(&raw, Some(target), company_id, Provenance::RemoteApi)
                .await
            {
                Ok(ItemOutcome::Synced) => outcome.synced += 1,
                Ok(ItemOutcome::Skipped) => outcome.skipped += 1,
                Err(error) => {
                    tracing::warn!(error = %error, "listing item failed");
                    outcome.errors += 1;
                }
            }
        }
        outcome.errors += pages.window_errors();
        outcome
    }

    /// Reconcile and persist one raw payload.
    ///
    /// `default_recipient` fills the recipient tax id when the payload
    /// itself carries none: the listing was queried for that CNPJ, so
    /// the attribution is safe.
    async fn process_item(
        &self,
        raw: &Value,
        default_recipient: Option<&str>,
        company_hint: Option<DbId>,
        provenance: Provenance,
    ) -> Result<ItemOutcome, SyncError> {
        let mut draft = NoteDraft::from_raw(raw);
        let mut detail: Option<Value> = None;
        if draft.needs_detail() {
            if let Some(id) = draft.official_id.clone() {
                match self.source.fetch_detail(&id).await {
                    Ok(full) if full.is_object() => {
                        draft = draft.overlay(NoteDraft::from_raw(&full));
                        detail = Some(full);
                    }
                    Ok(_) => tracing::debug!(official_id = %id, "detail reply was not an object"),
                    Err(error) => {
                        tracing::warn!(official_id = %id, error = %error, "detail fetch failed")
                    }
                }
            }
        }
        let effective = detail.as_ref().unwrap_or(raw);
        if draft.recipient_tax_id.is_none() {
            draft.recipient_tax_id = default_recipient.map(str::to_owned);
        }

        let candidate = IdentityCandidate {
            official_id: draft.official_id.clone(),
            invoice_number: draft.invoice_number.clone(),
            issuer_tax_id: draft.issuer_tax_id.clone(),
        };
        let Some(resolved) = resolver::resolve(&self.pool, &candidate).await? else {
            tracing::warn!("listing item has no usable identity; skipped");
            return Ok(ItemOutcome::Skipped);
        };

        let owning_company_id = match company_hint {
            Some(id) => Some(id),
            None => match draft.recipient_tax_id.as_deref() {
                Some(recipient) => CompanyRepo::find_by_tax_id(&self.pool, recipient)
                    .await?
                    .map(|c| c.id),
                None => None,
            },
        };

        let paths = artifacts::mirror(&self.source, &self.store, &draft, effective).await;
        let links = artifacts::resolve_links(
            &self.source,
            &self.store,
            &draft,
            effective,
            &paths,
            self.link_ttl,
        )
        .await;
        let note = reconcile::build_note(
            &draft,
            resolved.existing.as_ref(),
            resolved.action.identity(),
            &paths,
            &links,
            provenance,
            owning_company_id,
        );
        upsert::apply(&self.pool, &resolved.action, &note).await?;
        Ok(ItemOutcome::Synced)
    }

    // -----------------------------------------------------------------------
    // Storage listing pass
    // -----------------------------------------------------------------------

    async fn sync_storage_inner(&self, recipient: Option<&str>) -> Result<RunOutcome, SyncError> {
        let prefix = match recipient {
            Some(recipient) => storage_key::recipient_prefix(&cnpj::require_digits(recipient)?),
            None => "notas/".to_string(),
        };
        let keys = self.store.list_keys(&prefix).await?;
        let groups = group_keys(&keys);
        tracing::info!(prefix, keys = keys.len(), notes = groups.len(), "storage listing scanned");

        let mut outcome = RunOutcome {
            found: groups.len(),
            ..Default::default()
        };
        for group in groups {
            match self.process_stored_group(&group).await {
                Ok(ItemOutcome::Synced) => outcome.synced += 1,
                Ok(ItemOutcome::Skipped) => outcome.skipped += 1,
                Err(error) => {
                    tracing::warn!(
                        invoice = %group.parsed.invoice_number,
                        issuer = %group.parsed.issuer_tax_id,
                        error = %error,
                        "storage note failed"
                    );
                    outcome.errors += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Register one note found in the bucket. These rows resolve by
    /// content key and stay partial until a remote pass enriches them.
    async fn process_stored_group(&self, stored: &StoredNote) -> Result<ItemOutcome, SyncError> {
        let parsed = &stored.parsed;
        let draft = NoteDraft {
            invoice_number: Some(parsed.invoice_number.clone()),
            issuer_tax_id: Some(parsed.issuer_tax_id.clone()),
            recipient_tax_id: Some(parsed.recipient_tax_id.clone()),
            issue_date: Some(parsed.issue_date),
            ..Default::default()
        };
        let candidate = IdentityCandidate {
            official_id: None,
            invoice_number: draft.invoice_number.clone(),
            issuer_tax_id: draft.issuer_tax_id.clone(),
        };
        let Some(resolved) = resolver::resolve(&self.pool, &candidate).await? else {
            return Ok(ItemOutcome::Skipped);
        };
        let company = CompanyRepo::find_by_tax_id(&self.pool, &parsed.recipient_tax_id).await?;

        let links = artifacts::resolve_links(
            &self.source,
            &self.store,
            &draft,
            &Value::Null,
            &stored.paths,
            self.link_ttl,
        )
        .await;
        let note = reconcile::build_note(
            &draft,
            resolved.existing.as_ref(),
            resolved.action.identity(),
            &stored.paths,
            &links,
            Provenance::StorageListing,
            company.map(|c| c.id),
        );
        upsert::apply(&self.pool, &resolved.action, &note).await?;
        Ok(ItemOutcome::Synced)
    }

    // -----------------------------------------------------------------------
    // Repair pass
    // -----------------------------------------------------------------------

    async fn repair_inner(&self, limit: i64) -> Result<RepairOutcome, SyncError> {
        let notes = ServiceNoteRepo::list_incomplete(&self.pool, limit).await?;
        let mut outcome = RepairOutcome {
            scanned: notes.len(),
            ..Default::default()
        };
        tracing::info!(scanned = outcome.scanned, "repair pass started");

        for note in notes {
            let identity = note.canonical_identity.clone();
            match repair::fetch_replacement(&self.source, &note).await {
                Ok(Some(raw)) => {
                    let recipient = note
                        .recipient_tax_id
                        .as_deref()
                        .map(cnpj::digits)
                        .filter(|d| d.len() == 14);
                    match self
                        .process_item(
                            &raw,
                            recipient.as_deref(),
                            note.owning_company_id,
                            Provenance::RemoteApi,
                        )
                        .await
                    {
                        Ok(ItemOutcome::Synced) => outcome.repaired += 1,
                        Ok(ItemOutcome::Skipped) => outcome.misses += 1,
                        Err(error) => {
                            tracing::warn!(identity, error = %error, "repair write failed");
                            outcome.errors += 1;
                        }
                    }
                }
                Ok(None) => {
                    tracing::debug!(identity, "remote has nothing for this row");
                    outcome.misses += 1;
                }
                Err(error) => {
                    tracing::warn!(identity, error = %error, "repair probe failed");
                    outcome.errors += 1;
                }
            }
        }
        tracing::info!(
            repaired = outcome.repaired,
            misses = outcome.misses,
            errors = outcome.errors,
            "repair pass finished"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Run logging
    // -----------------------------------------------------------------------

    async fn record_run(
        &self,
        started_at: Timestamp,
        metadata: Value,
        result: &Result<RunOutcome, SyncError>,
    ) {
        let (status, found, synced, summary) = match result {
            Ok(o) => (
                RunStatus::Completed,
                o.found,
                o.synced,
                (o.skipped + o.errors > 0)
                    .then(|| format!("{} skipped, {} errors", o.skipped, o.errors)),
            ),
            Err(e) => (RunStatus::Failed, 0, 0, Some(e.to_string())),
        };
        self.append_log(started_at, status, found, synced, summary, metadata)
            .await;
    }

    /// Run logs are best-effort: a failed write must not fail the run it
    /// describes.
    async fn append_log(
        &self,
        started_at: Timestamp,
        status: RunStatus,
        found: usize,
        synced: usize,
        error_summary: Option<String>,
        metadata: Value,
    ) {
        let entry = NewSyncLog {
            started_at,
            finished_at: Utc::now(),
            status: status.as_str().to_string(),
            found_count: found as i32,
            synced_count: synced as i32,
            error_summary,
            metadata,
        };
        if let Err(error) = SyncLogRepo::insert(&self.pool, &entry).await {
            tracing::warn!(error = %error, "run log write failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Storage listing grouping
// ---------------------------------------------------------------------------

/// One note's artifacts as listed in the bucket.
#[derive(Debug)]
struct StoredNote {
    parsed: ParsedKey,
    paths: ArtifactPaths,
}

/// Group listed keys into notes: the PDF and XML of one note share
/// everything but the extension. Keys outside the canonical layout are
/// ignored. Ordering is deterministic.
fn group_keys(keys: &[String]) -> Vec<StoredNote> {
    let mut groups: BTreeMap<(String, String, String, NaiveDate), StoredNote> = BTreeMap::new();
    for key in keys {
        let Some(parsed) = storage_key::parse(key) else {
            tracing::debug!(key, "key outside the artifact layout");
            continue;
        };
        let slot = groups
            .entry((
                parsed.recipient_tax_id.clone(),
                parsed.issuer_tax_id.clone(),
                parsed.invoice_number.clone(),
                parsed.issue_date,
            ))
            .or_insert_with(|| StoredNote {
                parsed: parsed.clone(),
                paths: ArtifactPaths::default(),
            });
        slot.paths.set(parsed.kind, key.clone());
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_and_xml_of_one_note_group_together() {
        let keys = vec![
            "notas/25249058000102/2025/03/NFSe_14-03-2025_433_12345678000199.pdf".to_string(),
            "notas/25249058000102/2025/03/NFSe_14-03-2025_433_12345678000199.xml".to_string(),
        ];
        let groups = group_keys(&keys);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].paths.pdf.as_deref(), Some(keys[0].as_str()));
        assert_eq!(groups[0].paths.xml.as_deref(), Some(keys[1].as_str()));
        assert_eq!(groups[0].parsed.invoice_number, "433");
    }

    #[test]
    fn foreign_keys_are_ignored() {
        let keys = vec![
            "notas/25249058000102/2025/03/recibo.pdf".to_string(),
            "exports/2025.csv".to_string(),
        ];
        assert!(group_keys(&keys).is_empty());
    }

    #[test]
    fn different_issue_dates_are_different_notes() {
        // Same number and parties, reissued under another date.
        let keys = vec![
            "notas/25249058000102/2025/03/NFSe_14-03-2025_433_12345678000199.pdf".to_string(),
            "notas/25249058000102/2025/04/NFSe_02-04-2025_433_12345678000199.pdf".to_string(),
        ];
        let groups = group_keys(&keys);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn grouping_is_deterministic_regardless_of_listing_order() {
        let mut keys = vec![
            "notas/25249058000102/2025/03/NFSe_14-03-2025_9_12345678000199.pdf".to_string(),
            "notas/25249058000102/2025/03/NFSe_14-03-2025_2_12345678000199.pdf".to_string(),
        ];
        let forward: Vec<String> = group_keys(&keys)
            .iter()
            .map(|g| g.parsed.invoice_number.clone())
            .collect();
        keys.reverse();
        let reversed: Vec<String> = group_keys(&keys)
            .iter()
            .map(|g| g.parsed.invoice_number.clone())
            .collect();
        assert_eq!(forward, reversed);
    }
}

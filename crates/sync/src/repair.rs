//! Re-fetch strategy for incomplete rows.
//!
//! Rows that never got a positive total or a structured recipient are
//! re-probed against the remote: by the detail endpoint when their
//! identity is an official id, by a content-key search otherwise. The
//! engine feeds whatever comes back through the ordinary reconcile
//! pipeline, so a row that resurfaces under a proper official id is
//! upgraded on the way.

use serde_json::Value;

use nfse_core::cnpj;
use nfse_core::identity;
use nfse_db::models::ServiceNote;
use nfse_plugnotas::{NoteSource, PlugnotasError};

#[derive(Debug, Default, Clone, Copy)]
pub struct RepairOutcome {
    pub scanned: usize,
    pub repaired: usize,
    /// Rows the remote no longer answers for.
    pub misses: usize,
    pub errors: usize,
}

/// How to re-fetch one incomplete note.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairProbe {
    ById(String),
    BySearch {
        invoice_number: String,
        issuer_tax_id: String,
        recipient_tax_id: Option<String>,
    },
}

/// Decide the probe for a stored row. Rows with a fallback identity and
/// no usable issuer cannot be probed at all.
pub fn probe_for(note: &ServiceNote) -> Option<RepairProbe> {
    if identity::is_official_id(&note.canonical_identity) {
        return Some(RepairProbe::ById(note.canonical_identity.clone()));
    }
    let issuer = full_digits(note.issuer_tax_id.as_deref())?;
    Some(RepairProbe::BySearch {
        invoice_number: note.invoice_number.clone(),
        issuer_tax_id: issuer,
        recipient_tax_id: full_digits(note.recipient_tax_id.as_deref()),
    })
}

/// Run the probe. `Ok(None)` means the remote had nothing for this row.
pub async fn fetch_replacement<S: NoteSource + ?Sized>(
    source: &S,
    note: &ServiceNote,
) -> Result<Option<Value>, PlugnotasError> {
    match probe_for(note) {
        None => Ok(None),
        Some(RepairProbe::ById(id)) => {
            let raw = source.fetch_detail(&id).await?;
            Ok(Some(raw).filter(Value::is_object))
        }
        Some(RepairProbe::BySearch {
            invoice_number,
            issuer_tax_id,
            recipient_tax_id,
        }) => {
            let hits = source
                .search(&invoice_number, &issuer_tax_id, recipient_tax_id.as_deref())
                .await?;
            Ok(hits.into_iter().next())
        }
    }
}

fn full_digits(raw: Option<&str>) -> Option<String> {
    raw.map(cnpj::digits).filter(|d| d.len() == 14)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use nfse_core::period::DateWindow;
    use nfse_core::storage_key::ArtifactKind;
    use nfse_plugnotas::ListingPage;

    const OFFICIAL: &str = "65f0a1b2c3d4e5f60718293a";

    fn note(identity: &str, number: &str, issuer: Option<&str>, recipient: Option<&str>) -> ServiceNote {
        ServiceNote {
            id: Uuid::new_v4(),
            canonical_identity: identity.to_string(),
            invoice_number: number.to_string(),
            series: None,
            official_id_of_origin: None,
            official_status: None,
            access_key: None,
            issuer_tax_id: issuer.map(str::to_owned),
            recipient_tax_id: recipient.map(str::to_owned),
            issuer_payload: None,
            recipient_payload: None,
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            year: 2025,
            month: 3,
            day: 14,
            total_value: 0.0,
            artifact_path_pdf: None,
            artifact_path_xml: None,
            access_link_pdf: None,
            access_link_xml: None,
            sync_status: "partial".to_string(),
            status: "active".to_string(),
            source_provenance: "remote-api".to_string(),
            owning_company_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn official_identity_probes_by_id() {
        let n = note(OFFICIAL, "433", Some("25.249.058/0001-02"), None);
        assert_eq!(probe_for(&n), Some(RepairProbe::ById(OFFICIAL.to_string())));
    }

    #[test]
    fn fallback_identity_probes_by_search_with_clean_digits() {
        let n = note(
            "433_25249058000102",
            "433",
            Some("25.249.058/0001-02"),
            Some("11.222.333/0001-81"),
        );
        assert_eq!(
            probe_for(&n),
            Some(RepairProbe::BySearch {
                invoice_number: "433".to_string(),
                issuer_tax_id: "25249058000102".to_string(),
                recipient_tax_id: Some("11222333000181".to_string()),
            })
        );
    }

    #[test]
    fn fallback_identity_without_issuer_is_unprobeable() {
        let n = note("433_", "433", None, None);
        assert_eq!(probe_for(&n), None);
    }

    /// Serves one canned detail and one canned search result.
    struct CannedSource {
        detail: Value,
        hits: Vec<Value>,
    }

    #[async_trait]
    impl NoteSource for CannedSource {
        async fn fetch_page(
            &self,
            _recipient_tax_id: &str,
            _window: DateWindow,
            _page_size: usize,
            _cursor: Option<&str>,
        ) -> Result<ListingPage, PlugnotasError> {
            unimplemented!()
        }

        async fn fetch_detail(&self, _official_id: &str) -> Result<Value, PlugnotasError> {
            Ok(self.detail.clone())
        }

        async fn search(
            &self,
            _invoice_number: &str,
            _issuer_tax_id: &str,
            _recipient_tax_id: Option<&str>,
        ) -> Result<Vec<Value>, PlugnotasError> {
            Ok(self.hits.clone())
        }

        async fn fetch_artifact(&self, _url: &str) -> Result<Vec<u8>, PlugnotasError> {
            unimplemented!()
        }

        fn artifact_endpoint(&self, _kind: ArtifactKind, _official_id: &str) -> String {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn by_id_probe_filters_non_object_replies() {
        let source = CannedSource {
            detail: Value::Null,
            hits: vec![],
        };
        let n = note(OFFICIAL, "433", None, None);
        assert_eq!(fetch_replacement(&source, &n).await.unwrap(), None);
    }

    #[tokio::test]
    async fn search_probe_takes_the_first_hit() {
        let source = CannedSource {
            detail: Value::Null,
            hits: vec![json!({"id": OFFICIAL}), json!({"id": "other"})],
        };
        let n = note("433_25249058000102", "433", Some("25249058000102"), None);
        let hit = fetch_replacement(&source, &n).await.unwrap();
        assert_eq!(hit, Some(json!({"id": OFFICIAL})));
    }

    #[tokio::test]
    async fn unprobeable_note_is_a_miss() {
        let source = CannedSource {
            detail: json!({"id": OFFICIAL}),
            hits: vec![json!({"id": OFFICIAL})],
        };
        let n = note("433_", "433", None, None);
        assert_eq!(fetch_replacement(&source, &n).await.unwrap(), None);
    }
}

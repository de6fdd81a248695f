//! Artifact mirroring and access-link resolution.
//!
//! Each note carries up to two artifacts (PDF and XML). Mirroring copies
//! them from the remote into the bucket under the canonical key layout,
//! skipping objects that are already there. Every failure along the way
//! is logged and leaves that one artifact behind; it never fails the
//! note itself.

use std::time::Duration;

use serde_json::Value;

use nfse_cloud::ObjectStore;
use nfse_core::payload::{self, NoteDraft};
use nfse_core::storage_key::{self, ArtifactKind};
use nfse_plugnotas::NoteSource;

use crate::reconcile::default_issue_date;

/// Confirmed bucket keys per artifact kind. A key is recorded only when
/// the object is known to exist, either found in place or uploaded this
/// pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactPaths {
    pub pdf: Option<String>,
    pub xml: Option<String>,
}

impl ArtifactPaths {
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::Pdf => self.pdf.as_deref(),
            ArtifactKind::Xml => self.xml.as_deref(),
        }
    }

    pub fn set(&mut self, kind: ArtifactKind, key: String) {
        match kind {
            ArtifactKind::Pdf => self.pdf = Some(key),
            ArtifactKind::Xml => self.xml = Some(key),
        }
    }
}

/// Resolved access links per artifact kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactLinks {
    pub pdf: Option<String>,
    pub xml: Option<String>,
}

impl ArtifactLinks {
    fn set(&mut self, kind: ArtifactKind, link: Option<String>) {
        match kind {
            ArtifactKind::Pdf => self.pdf = link,
            ArtifactKind::Xml => self.xml = link,
        }
    }
}

/// Mirror both artifacts of a note into the bucket.
///
/// The canonical key needs the recipient, issuer and invoice number;
/// drafts missing any of them are not mirrored at all.
pub async fn mirror<S: NoteSource + ?Sized>(
    source: &S,
    store: &ObjectStore,
    draft: &NoteDraft,
    raw: &Value,
) -> ArtifactPaths {
    let mut paths = ArtifactPaths::default();
    let (Some(recipient), Some(issuer), Some(number)) = (
        draft.recipient_tax_id.as_deref(),
        draft.issuer_tax_id.as_deref(),
        draft.invoice_number.as_deref(),
    ) else {
        return paths;
    };
    let issue_date = draft.issue_date.unwrap_or_else(default_issue_date);

    for kind in ArtifactKind::ALL {
        let key = storage_key::build(recipient, issuer, number, issue_date, kind);
        match store.exists(&key).await {
            Ok(true) => paths.set(kind, key),
            Ok(false) => {
                let Some(url) = download_url(source, raw, kind, draft.official_id.as_deref())
                else {
                    continue;
                };
                match source.fetch_artifact(&url).await {
                    Ok(bytes) => match store.put(&key, bytes, kind.content_type()).await {
                        Ok(()) => paths.set(kind, key),
                        Err(error) => {
                            tracing::warn!(key, error = %error, "artifact upload failed");
                        }
                    },
                    Err(error) => {
                        tracing::warn!(%kind, url, error = %error, "artifact download failed");
                    }
                }
            }
            Err(error) => {
                tracing::warn!(key, error = %error, "artifact existence check failed");
            }
        }
    }
    paths
}

/// Resolve the access links for both artifact kinds. A presigning
/// failure on a confirmed key falls through to the remote URLs.
pub async fn resolve_links<S: NoteSource + ?Sized>(
    source: &S,
    store: &ObjectStore,
    draft: &NoteDraft,
    raw: &Value,
    paths: &ArtifactPaths,
    ttl: Duration,
) -> ArtifactLinks {
    let mut links = ArtifactLinks::default();
    for kind in ArtifactKind::ALL {
        let presigned = match paths.get(kind) {
            Some(key) => match store.presign_get(key, ttl).await {
                Ok(url) => Some(url),
                Err(error) => {
                    tracing::warn!(key, error = %error, "presigning failed");
                    None
                }
            },
            None => None,
        };
        let link = choose_link(presigned, raw, kind, draft.official_id.as_deref(), |k, id| {
            source.artifact_endpoint(k, id)
        });
        links.set(kind, link);
    }
    links
}

/// Pick the access link for one artifact kind: a presigned storage link
/// first, then a URL carried inline in the payload, then the canonical
/// remote endpoint (addressable only when the note has an official id).
pub fn choose_link(
    presigned: Option<String>,
    raw: &Value,
    kind: ArtifactKind,
    official_id: Option<&str>,
    endpoint: impl FnOnce(ArtifactKind, &str) -> String,
) -> Option<String> {
    presigned
        .or_else(|| payload::artifact_url(raw, kind.as_str()))
        .or_else(|| official_id.map(|id| endpoint(kind, id)))
}

/// Where to download one artifact from: the inline payload URL when
/// present, else the canonical endpoint.
fn download_url<S: NoteSource + ?Sized>(
    source: &S,
    raw: &Value,
    kind: ArtifactKind,
    official_id: Option<&str>,
) -> Option<String> {
    payload::artifact_url(raw, kind.as_str())
        .or_else(|| official_id.map(|id| source.artifact_endpoint(kind, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OFFICIAL: &str = "65f0a1b2c3d4e5f60718293a";

    fn endpoint(kind: ArtifactKind, id: &str) -> String {
        format!("https://api.test/nfse/{kind}/{id}")
    }

    #[test]
    fn presigned_link_wins_over_everything() {
        let raw = json!({"pdf": "https://cdn.example/n.pdf"});
        let link = choose_link(
            Some("https://bucket/signed".into()),
            &raw,
            ArtifactKind::Pdf,
            Some(OFFICIAL),
            endpoint,
        );
        assert_eq!(link.as_deref(), Some("https://bucket/signed"));
    }

    #[test]
    fn payload_url_beats_the_endpoint() {
        let raw = json!({"pdf": "https://cdn.example/n.pdf"});
        let link = choose_link(None, &raw, ArtifactKind::Pdf, Some(OFFICIAL), endpoint);
        assert_eq!(link.as_deref(), Some("https://cdn.example/n.pdf"));
    }

    #[test]
    fn object_form_url_is_used() {
        let raw = json!({"xml": {"url": "https://cdn.example/n.xml"}});
        let link = choose_link(None, &raw, ArtifactKind::Xml, None, endpoint);
        assert_eq!(link.as_deref(), Some("https://cdn.example/n.xml"));
    }

    #[test]
    fn endpoint_needs_an_official_id() {
        let raw = json!({});
        let with_id = choose_link(None, &raw, ArtifactKind::Xml, Some(OFFICIAL), endpoint);
        assert_eq!(
            with_id.as_deref(),
            Some("https://api.test/nfse/xml/65f0a1b2c3d4e5f60718293a")
        );
        assert_eq!(choose_link(None, &raw, ArtifactKind::Xml, None, endpoint), None);
    }

    #[test]
    fn non_http_payload_value_falls_through() {
        let raw = json!({"pdf": "pending"});
        let link = choose_link(None, &raw, ArtifactKind::Pdf, Some(OFFICIAL), endpoint);
        assert_eq!(
            link.as_deref(),
            Some("https://api.test/nfse/pdf/65f0a1b2c3d4e5f60718293a")
        );
    }
}

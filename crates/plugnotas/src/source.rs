//! Source seam between the sync engine and the remote API.

use async_trait::async_trait;
use nfse_core::period::DateWindow;
use nfse_core::storage_key::ArtifactKind;
use serde_json::Value;

use crate::api::{ActorRole, ListingPage, PlugnotasApi, PlugnotasError};

/// The remote operations the sync engine consumes. [`PlugnotasApi`] is
/// the production implementation; engine tests substitute their own.
///
/// The engine mirrors notes the tax id *received*, so listing always
/// queries the recipient role.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// One page of the period listing for a recipient CNPJ.
    async fn fetch_page(
        &self,
        recipient_tax_id: &str,
        window: DateWindow,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ListingPage, PlugnotasError>;

    /// Full record of one note.
    async fn fetch_detail(&self, official_id: &str) -> Result<Value, PlugnotasError>;

    /// Search by content key.
    async fn search(
        &self,
        invoice_number: &str,
        issuer_tax_id: &str,
        recipient_tax_id: Option<&str>,
    ) -> Result<Vec<Value>, PlugnotasError>;

    /// Artifact bytes from an already-resolved URL.
    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, PlugnotasError>;

    /// Canonical artifact URL for a note with an official id.
    fn artifact_endpoint(&self, kind: ArtifactKind, official_id: &str) -> String;
}

#[async_trait]
impl NoteSource for PlugnotasApi {
    async fn fetch_page(
        &self,
        recipient_tax_id: &str,
        window: DateWindow,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ListingPage, PlugnotasError> {
        self.list_period(recipient_tax_id, window, ActorRole::Recipient, page_size, cursor)
            .await
    }

    async fn fetch_detail(&self, official_id: &str) -> Result<Value, PlugnotasError> {
        self.get_note(official_id).await
    }

    async fn search(
        &self,
        invoice_number: &str,
        issuer_tax_id: &str,
        recipient_tax_id: Option<&str>,
    ) -> Result<Vec<Value>, PlugnotasError> {
        self.search_notes(invoice_number, issuer_tax_id, recipient_tax_id)
            .await
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, PlugnotasError> {
        self.download_url(url).await
    }

    fn artifact_endpoint(&self, kind: ArtifactKind, official_id: &str) -> String {
        PlugnotasApi::artifact_endpoint(self, kind, official_id)
    }
}

//! REST API client for the PlugNotas HTTP endpoints.
//!
//! Wraps the period listing (cursor-paged), note detail, note search,
//! and artifact download endpoints using [`reqwest`]. Authentication is
//! a static `X-API-KEY` header on every request.

use nfse_core::period::DateWindow;
use nfse_core::storage_key::ArtifactKind;
use serde::Deserialize;
use serde_json::Value;

/// Default production endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.plugnotas.com.br";

/// Role the queried CNPJ plays in a period listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// The CNPJ issued the notes (`ator=1`).
    Provider = 1,
    /// The CNPJ received the notes (`ator=2`).
    Recipient = 2,
}

/// One page of the period listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub items: Vec<Value>,
    /// Opaque continuation cursor; absent on the last page.
    pub next_cursor: Option<String>,
}

/// Errors from the PlugNotas REST layer.
#[derive(Debug, thiserror::Error)]
pub enum PlugnotasError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// PlugNotas returned a non-2xx status code.
    #[error("PlugNotas API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Wire shape of the period listing body.
#[derive(Debug, Deserialize, Default)]
struct PeriodBody {
    #[serde(default)]
    notas: Vec<Value>,
    #[serde(rename = "hashProximaPagina")]
    hash_proxima_pagina: Option<String>,
}

/// HTTP client for one PlugNotas account.
pub struct PlugnotasApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PlugnotasApi {
    /// Create a new API client.
    ///
    /// * `base_url` - endpoint root, usually [`DEFAULT_BASE_URL`].
    /// * `api_key` - account key sent as `X-API-KEY`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Fetch one page of the national NFS-e period listing for a CNPJ.
    ///
    /// Sends `GET /nfse/nacional/{cnpj}/consultar/periodo`. The window
    /// must not exceed the remote's maximum span; pass the cursor from
    /// the previous page to continue.
    pub async fn list_period(
        &self,
        tax_id: &str,
        window: DateWindow,
        actor: ActorRole,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ListingPage, PlugnotasError> {
        let mut params = vec![
            ("dataInicial", window.start.format("%Y-%m-%d").to_string()),
            ("dataFinal", window.end.format("%Y-%m-%d").to_string()),
            ("ator", (actor as u8).to_string()),
            ("quantidade", page_size.to_string()),
        ];
        if let Some(hash) = cursor {
            params.push(("hashProximaPagina", hash.to_string()));
        }

        let response = self
            .client
            .get(format!(
                "{}/nfse/nacional/{}/consultar/periodo",
                self.base_url, tax_id
            ))
            .header("X-API-KEY", &self.api_key)
            .query(&params)
            .send()
            .await?;

        let body: Value = Self::parse_response(response).await?;
        Ok(parse_listing(body))
    }

    /// Fetch the full record of one note by official id.
    pub async fn get_note(&self, official_id: &str) -> Result<Value, PlugnotasError> {
        let response = self
            .client
            .get(format!("{}/nfse/{}", self.base_url, official_id))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Search notes by invoice number and issuer, optionally narrowed to
    /// a recipient. Returns the raw result array.
    pub async fn search_notes(
        &self,
        invoice_number: &str,
        issuer_tax_id: &str,
        recipient_tax_id: Option<&str>,
    ) -> Result<Vec<Value>, PlugnotasError> {
        let mut params = vec![
            ("numero", invoice_number.to_string()),
            ("cnpjPrestador", issuer_tax_id.to_string()),
        ];
        if let Some(recipient) = recipient_tax_id {
            params.push(("cnpjTomador", recipient.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/nfse", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .query(&params)
            .send()
            .await?;

        let body: Value = Self::parse_response(response).await?;
        match body {
            Value::Array(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    /// Download an artifact from an already-resolved URL. The API key
    /// header is sent either way; foreign hosts ignore it.
    pub async fn download_url(&self, url: &str) -> Result<Vec<u8>, PlugnotasError> {
        let response = self
            .client
            .get(url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Canonical artifact URL for a note with an official id.
    pub fn artifact_endpoint(&self, kind: ArtifactKind, official_id: &str) -> String {
        format!("{}/nfse/{}/{}", self.base_url, kind.as_str(), official_id)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`PlugnotasError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PlugnotasError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PlugnotasError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PlugnotasError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Interpret a period listing body. The endpoint normally answers with
/// `{notas, hashProximaPagina}` but has been observed returning a bare
/// array; both shapes are accepted, anything else counts as empty.
fn parse_listing(body: Value) -> ListingPage {
    match body {
        Value::Array(items) => ListingPage {
            items,
            next_cursor: None,
        },
        body @ Value::Object(_) => {
            let parsed: PeriodBody = serde_json::from_value(body).unwrap_or_default();
            ListingPage {
                items: parsed.notas,
                next_cursor: parsed.hash_proxima_pagina,
            }
        }
        _ => ListingPage::default(),
    }
}

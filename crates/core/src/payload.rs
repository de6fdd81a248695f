//! Raw API payload extraction.
//!
//! The remote returns loosely-typed JSON: monetary fields may be numbers
//! or nested objects, parties may be structured objects or bare tax-id
//! strings, dates come in three formats, and numbers are sometimes JSON
//! numbers instead of strings. Everything here flattens that into a
//! [`NoteDraft`] the rest of the pipeline can trust.

use chrono::NaiveDate;
use serde_json::Value;

use crate::cnpj;
use crate::identity;

/// Extracted, normalized view of one raw listing or detail payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    /// Official source id (`id`), when the payload carries one.
    pub official_id: Option<String>,
    /// Invoice number: `numeroNfse`, falling back to `numero`, falling
    /// back to the official id.
    pub invoice_number: Option<String>,
    pub series: Option<String>,
    /// Issuance-origin document id (`idDPS` / `id_dps`).
    pub origin_id: Option<String>,
    /// Issuer-side situation code (`situacao`).
    pub official_status: Option<String>,
    /// Fiscal access key (`chaveAcessoNfse`).
    pub access_key: Option<String>,
    /// Issuer tax id, digits form.
    pub issuer_tax_id: Option<String>,
    /// Recipient tax id, digits form.
    pub recipient_tax_id: Option<String>,
    /// Raw issuer object, kept only when structured.
    pub issuer_payload: Option<Value>,
    /// Raw recipient object, kept only when structured.
    pub recipient_payload: Option<Value>,
    pub issue_date: Option<NaiveDate>,
    /// Resolved monetary total; `0.0` when no positive value was found.
    pub total_value: f64,
}

impl NoteDraft {
    /// Extract a draft from one raw payload.
    pub fn from_raw(raw: &Value) -> Self {
        let official_id = string_field(raw, "id");
        let invoice_number = string_field(raw, "numeroNfse")
            .or_else(|| string_field(raw, "numero"))
            .or_else(|| official_id.clone());
        NoteDraft {
            invoice_number,
            series: string_field(raw, "serie"),
            origin_id: string_field(raw, "idDPS").or_else(|| string_field(raw, "id_dps")),
            official_status: string_field(raw, "situacao"),
            access_key: string_field(raw, "chaveAcessoNfse"),
            issuer_tax_id: party_tax_id(raw.get("prestador")),
            recipient_tax_id: party_tax_id(raw.get("tomador")),
            issuer_payload: structured_party(raw.get("prestador")),
            recipient_payload: structured_party(raw.get("tomador")),
            issue_date: string_field(raw, "emissao").and_then(|s| parse_issue_date(&s)),
            total_value: resolve_total(raw),
            official_id,
        }
    }

    /// Overlay a detail fetch onto a listing-level draft: the detail wins
    /// for every field it supplies, the listing fills the gaps. A detail
    /// without a positive total keeps the listing's total.
    pub fn overlay(self, detail: NoteDraft) -> NoteDraft {
        NoteDraft {
            official_id: detail.official_id.or(self.official_id),
            invoice_number: detail.invoice_number.or(self.invoice_number),
            series: detail.series.or(self.series),
            origin_id: detail.origin_id.or(self.origin_id),
            official_status: detail.official_status.or(self.official_status),
            access_key: detail.access_key.or(self.access_key),
            issuer_tax_id: detail.issuer_tax_id.or(self.issuer_tax_id),
            recipient_tax_id: detail.recipient_tax_id.or(self.recipient_tax_id),
            issuer_payload: detail.issuer_payload.or(self.issuer_payload),
            recipient_payload: detail.recipient_payload.or(self.recipient_payload),
            issue_date: detail.issue_date.or(self.issue_date),
            total_value: if detail.total_value > 0.0 {
                detail.total_value
            } else {
                self.total_value
            },
        }
    }

    /// Whether a detail fetch can still improve this draft: the recipient
    /// is unstructured or no positive total was found, and the official
    /// id is well-formed so the detail endpoint can be addressed at all.
    pub fn needs_detail(&self) -> bool {
        let id_ok = self
            .official_id
            .as_deref()
            .is_some_and(identity::is_official_id);
        id_ok && (self.recipient_payload.is_none() || self.total_value <= 0.0)
    }
}

/// Resolve the monetary total of a raw payload. First strictly-positive
/// hit wins: top-level `valorServico`, then the first `servico[]` item's
/// nested `valor.servico`, then the alternate `valor` / `total` fields
/// (each either a bare number or an object with a `servico` member).
/// Nothing positive resolves to `0.0`.
pub fn resolve_total(raw: &Value) -> f64 {
    if let Some(v) = positive(raw.get("valorServico")) {
        return v;
    }
    let nested = raw
        .get("servico")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("valor"))
        .and_then(|v| v.get("servico"));
    if let Some(v) = positive(nested) {
        return v;
    }
    for field in ["valor", "total"] {
        let amount = raw.get(field).and_then(member_or_number);
        if let Some(v) = amount.filter(|v| *v > 0.0) {
            return v;
        }
    }
    0.0
}

/// Parse an issue date: ISO datetimes are truncated to their date part,
/// and both `YYYY-MM-DD` and `DD/MM/YYYY` plain dates are accepted.
pub fn parse_issue_date(raw: &str) -> Option<NaiveDate> {
    let head: String = raw.chars().take(10).collect();
    let head = head.replace('/', "-");
    NaiveDate::parse_from_str(&head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&head, "%d-%m-%Y"))
        .ok()
}

/// Tax id of a party field: `cpfCnpj` of a structured object, or the
/// bare string itself when it cleans to a full CNPJ.
pub fn party_tax_id(party: Option<&Value>) -> Option<String> {
    match party? {
        Value::Object(map) => {
            let id = map.get("cpfCnpj").and_then(value_as_string)?;
            Some(cnpj::digits(&id)).filter(|d| !d.is_empty())
        }
        Value::String(s) => Some(cnpj::digits(s)).filter(|d| d.len() == 14),
        _ => None,
    }
}

/// Download URL carried inline in the payload: either a literal
/// `http...` string or a `{url: ...}` object. Anything else is ignored
/// so the caller can fall through to the canonical endpoint.
pub fn artifact_url(raw: &Value, field: &str) -> Option<String> {
    match raw.get(field)? {
        Value::String(s) if s.starts_with("http") => Some(s.clone()),
        Value::Object(map) => map
            .get("url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        _ => None,
    }
}

fn structured_party(party: Option<&Value>) -> Option<Value> {
    party.filter(|v| v.is_object()).cloned()
}

/// String-ish field access: JSON strings pass through, JSON numbers are
/// rendered (invoice numbers arrive both ways). Empty strings count as
/// absent.
fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(value_as_string)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn positive(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| *v > 0.0)
}

fn member_or_number(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => map.get("servico").and_then(Value::as_f64),
        other => other.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_prefers_primary_field() {
        let raw = json!({"valorServico": 150.5, "servico": [{"valor": {"servico": 10.0}}]});
        assert_eq!(resolve_total(&raw), 150.5);
    }

    #[test]
    fn total_zero_primary_falls_through_to_nested() {
        let raw = json!({"valorServico": 0, "servico": [{"valor": {"servico": 42.0}}]});
        assert_eq!(resolve_total(&raw), 42.0);
    }

    #[test]
    fn total_falls_back_to_valor_object() {
        let raw = json!({"valor": {"servico": 12.3}});
        assert_eq!(resolve_total(&raw), 12.3);
    }

    #[test]
    fn total_falls_back_to_bare_total_number() {
        let raw = json!({"total": 99});
        assert_eq!(resolve_total(&raw), 99.0);
    }

    #[test]
    fn total_defaults_to_zero() {
        assert_eq!(resolve_total(&json!({})), 0.0);
        assert_eq!(resolve_total(&json!({"valorServico": null, "servico": []})), 0.0);
    }

    #[test]
    fn issue_date_from_iso_datetime() {
        let d = parse_issue_date("2025-03-14T10:22:01.000Z").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn issue_date_from_plain_iso() {
        let d = parse_issue_date("2025-03-14").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn issue_date_from_brazilian_form() {
        let d = parse_issue_date("14/03/2025").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn issue_date_garbage_is_none() {
        assert_eq!(parse_issue_date("soon"), None);
        assert_eq!(parse_issue_date(""), None);
    }

    #[test]
    fn party_tax_id_from_structured_object() {
        let raw = json!({"cpfCnpj": "25.249.058/0001-02", "razaoSocial": "ACME"});
        assert_eq!(
            party_tax_id(Some(&raw)),
            Some("25249058000102".to_string())
        );
    }

    #[test]
    fn party_tax_id_from_bare_string() {
        let raw = json!("25249058000102");
        assert_eq!(
            party_tax_id(Some(&raw)),
            Some("25249058000102".to_string())
        );
    }

    #[test]
    fn party_tax_id_rejects_short_bare_string() {
        let raw = json!("ACME LTDA");
        assert_eq!(party_tax_id(Some(&raw)), None);
    }

    #[test]
    fn artifact_url_literal_string() {
        let raw = json!({"pdf": "https://cdn.example/n.pdf"});
        assert_eq!(
            artifact_url(&raw, "pdf"),
            Some("https://cdn.example/n.pdf".to_string())
        );
    }

    #[test]
    fn artifact_url_object_form() {
        let raw = json!({"xml": {"url": "https://cdn.example/n.xml"}});
        assert_eq!(
            artifact_url(&raw, "xml"),
            Some("https://cdn.example/n.xml".to_string())
        );
    }

    #[test]
    fn artifact_url_non_http_string_is_ignored() {
        let raw = json!({"pdf": "pending"});
        assert_eq!(artifact_url(&raw, "pdf"), None);
    }

    #[test]
    fn draft_extracts_core_fields() {
        let raw = json!({
            "id": "65f0a1b2c3d4e5f60718293a",
            "numeroNfse": 433,
            "serie": "1",
            "situacao": "CONCLUIDO",
            "emissao": "2025-03-14T10:22:01.000Z",
            "valorServico": 150.0,
            "prestador": {"cpfCnpj": "25249058000102"},
            "tomador": {"cpfCnpj": "11222333000181"},
        });
        let draft = NoteDraft::from_raw(&raw);
        assert_eq!(draft.official_id.as_deref(), Some("65f0a1b2c3d4e5f60718293a"));
        assert_eq!(draft.invoice_number.as_deref(), Some("433"));
        assert_eq!(draft.issuer_tax_id.as_deref(), Some("25249058000102"));
        assert_eq!(draft.recipient_tax_id.as_deref(), Some("11222333000181"));
        assert_eq!(draft.total_value, 150.0);
        assert!(draft.recipient_payload.is_some());
        assert_eq!(
            draft.issue_date,
            Some(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap())
        );
    }

    #[test]
    fn draft_number_falls_back_to_official_id() {
        let raw = json!({"id": "65f0a1b2c3d4e5f60718293a"});
        let draft = NoteDraft::from_raw(&raw);
        assert_eq!(
            draft.invoice_number.as_deref(),
            Some("65f0a1b2c3d4e5f60718293a")
        );
    }

    #[test]
    fn needs_detail_on_bare_string_party() {
        let raw = json!({
            "id": "65f0a1b2c3d4e5f60718293a",
            "valorServico": 10.0,
            "tomador": "11222333000181",
        });
        assert!(NoteDraft::from_raw(&raw).needs_detail());
    }

    #[test]
    fn needs_detail_on_zero_total() {
        let raw = json!({
            "id": "65f0a1b2c3d4e5f60718293a",
            "tomador": {"cpfCnpj": "11222333000181"},
        });
        assert!(NoteDraft::from_raw(&raw).needs_detail());
    }

    #[test]
    fn no_detail_when_structured_and_valued() {
        let raw = json!({
            "id": "65f0a1b2c3d4e5f60718293a",
            "valorServico": 10.0,
            "tomador": {"cpfCnpj": "11222333000181"},
        });
        assert!(!NoteDraft::from_raw(&raw).needs_detail());
    }

    #[test]
    fn no_detail_with_malformed_official_id() {
        let raw = json!({"id": "NFSE-2024-000433", "tomador": "11222333000181"});
        assert!(!NoteDraft::from_raw(&raw).needs_detail());
    }

    #[test]
    fn overlay_detail_wins_where_supplied() {
        let listing = NoteDraft::from_raw(&json!({
            "id": "65f0a1b2c3d4e5f60718293a",
            "numero": "433",
            "serie": "1",
            "tomador": "11222333000181",
        }));
        let detail = NoteDraft::from_raw(&json!({
            "id": "65f0a1b2c3d4e5f60718293a",
            "numeroNfse": "433",
            "valorServico": 77.0,
            "tomador": {"cpfCnpj": "11222333000181", "endereco": {"municipio": "Recife"}},
        }));
        let merged = listing.overlay(detail);
        assert_eq!(merged.total_value, 77.0);
        assert_eq!(merged.series.as_deref(), Some("1")); // listing fills the gap
        assert!(merged.recipient_payload.is_some());
    }

    #[test]
    fn overlay_keeps_listing_total_when_detail_has_none() {
        let listing = NoteDraft {
            total_value: 150.0,
            ..Default::default()
        };
        let detail = NoteDraft::default();
        assert_eq!(listing.overlay(detail).total_value, 150.0);
    }
}

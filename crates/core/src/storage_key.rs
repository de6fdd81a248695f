//! Bucket key layout for mirrored artifacts.
//!
//! Every artifact lives under
//! `notas/{recipient}/{year}/{month}/NFSe_{dd}-{mm}-{yyyy}_{number}_{issuer}.{pdf|xml}`.
//! The folder segment carries the year/month the file was filed under,
//! which historically drifts from the real issue date; the file name is
//! authoritative, so parsing reads the date from there and ignores the
//! folder.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern matching a well-formed artifact key.
pub const KEY_PATTERN: &str =
    r"^notas/(\d{14})/(\d{4})/(\d{2})/NFSe_(\d{2})-(\d{2})-(\d{4})_(\d+)_(\d{14})\.(pdf|xml)$";

/// Compiled key regex. Compiled once, reused forever.
static KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(KEY_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Artifact kind
// ---------------------------------------------------------------------------

/// The two artifact flavors mirrored per note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Pdf,
    Xml,
}

impl ArtifactKind {
    /// Both kinds, in the order they are mirrored.
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Pdf, ArtifactKind::Xml];

    /// File extension / remote endpoint segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xml => "xml",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// MIME type used when uploading.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xml => "application/xml",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parse / build
// ---------------------------------------------------------------------------

/// Fields recovered from a well-formed artifact key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    /// Recipient CNPJ, digits form (the folder owner).
    pub recipient_tax_id: String,
    /// Issuer CNPJ, digits form.
    pub issuer_tax_id: String,
    pub invoice_number: String,
    /// Issue date as written in the file name.
    pub issue_date: NaiveDate,
    pub kind: ArtifactKind,
}

/// Parse an artifact key. Returns `None` for keys outside the layout or
/// with an impossible file-name date.
pub fn parse(key: &str) -> Option<ParsedKey> {
    let caps = KEY_RE.captures(key)?;
    let day: u32 = caps[4].parse().ok()?;
    let month: u32 = caps[5].parse().ok()?;
    let year: i32 = caps[6].parse().ok()?;
    let issue_date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(ParsedKey {
        recipient_tax_id: caps[1].to_string(),
        issuer_tax_id: caps[8].to_string(),
        invoice_number: caps[7].to_string(),
        issue_date,
        kind: ArtifactKind::from_str(&caps[9])?,
    })
}

/// Build the canonical key for one artifact. The folder segment is
/// derived from the issue date.
pub fn build(
    recipient_tax_id: &str,
    issuer_tax_id: &str,
    invoice_number: &str,
    issue_date: NaiveDate,
    kind: ArtifactKind,
) -> String {
    format!(
        "notas/{}/{}/{:02}/NFSe_{:02}-{:02}-{}_{}_{}.{}",
        recipient_tax_id,
        issue_date.year(),
        issue_date.month(),
        issue_date.day(),
        issue_date.month(),
        issue_date.year(),
        invoice_number,
        issuer_tax_id,
        kind.as_str()
    )
}

/// Listing prefix for one recipient's artifacts.
pub fn recipient_prefix(recipient_tax_id: &str) -> String {
    format!("notas/{recipient_tax_id}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parse_well_formed_key() {
        let key = "notas/25249058000102/2026/02/NFSe_10-02-2026_12345_12345678000199.pdf";
        let parsed = parse(key).unwrap();
        assert_eq!(parsed.recipient_tax_id, "25249058000102");
        assert_eq!(parsed.issuer_tax_id, "12345678000199");
        assert_eq!(parsed.invoice_number, "12345");
        assert_eq!(parsed.issue_date, d(2026, 2, 10));
        assert_eq!(parsed.kind, ArtifactKind::Pdf);
    }

    #[test]
    fn parse_trusts_file_name_date_over_folder() {
        // Filed under 2026/02 but issued 2025-12-30.
        let key = "notas/25249058000102/2026/02/NFSe_30-12-2025_433_12345678000199.xml";
        let parsed = parse(key).unwrap();
        assert_eq!(parsed.issue_date, d(2025, 12, 30));
        assert_eq!(parsed.kind, ArtifactKind::Xml);
    }

    #[test]
    fn parse_rejects_foreign_layouts() {
        assert!(parse("notas/25249058000102/2026/02/recibo.pdf").is_none());
        assert!(parse("backup/notas/25249058000102/2026/02/NFSe_10-02-2026_1_12345678000199.pdf").is_none());
        assert!(parse("notas/252490580001/2026/02/NFSe_10-02-2026_1_12345678000199.pdf").is_none());
        assert!(parse("notas/25249058000102/2026/02/NFSe_10-02-2026_1_12345678000199.txt").is_none());
    }

    #[test]
    fn parse_rejects_impossible_dates() {
        let key = "notas/25249058000102/2026/02/NFSe_31-02-2026_433_12345678000199.pdf";
        assert!(parse(key).is_none());
    }

    #[test]
    fn build_then_parse_round_trips() {
        let key = build(
            "25249058000102",
            "12345678000199",
            "433",
            d(2025, 3, 14),
            ArtifactKind::Xml,
        );
        assert_eq!(
            key,
            "notas/25249058000102/2025/03/NFSe_14-03-2025_433_12345678000199.xml"
        );
        let parsed = parse(&key).unwrap();
        assert_eq!(parsed.invoice_number, "433");
        assert_eq!(parsed.issue_date, d(2025, 3, 14));
    }

    #[test]
    fn recipient_prefix_shape() {
        assert_eq!(
            recipient_prefix("25249058000102"),
            "notas/25249058000102/"
        );
    }

    #[test]
    fn kind_round_trip() {
        for kind in ArtifactKind::ALL {
            assert_eq!(ArtifactKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ArtifactKind::from_str("zip"), None);
    }
}

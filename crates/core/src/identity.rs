//! Canonical identity rules.
//!
//! The two sources disagree on identifiers: the remote API issues an
//! official 24-char id, while storage-derived rows may only know the
//! invoice number and issuer. Every stored row carries exactly one
//! canonical identity; the rules here decide which one, and what to do
//! when a row surfaces again under a better identifier.

use crate::cnpj;

/// A candidate's identifying fields, as extracted from one source item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityCandidate {
    pub official_id: Option<String>,
    pub invoice_number: Option<String>,
    pub issuer_tax_id: Option<String>,
}

/// What the store should do with a resolved candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityAction {
    /// No row matches; insert under this identity.
    Insert { identity: String },
    /// A row already carries this identity; merge into it.
    Update { identity: String },
    /// A row exists under a superseded identity. The caller must write
    /// the row under `identity` first and delete `superseded` only after
    /// that write is durable.
    Upgrade { identity: String, superseded: String },
}

impl IdentityAction {
    /// The identity the merged record will be stored under.
    pub fn identity(&self) -> &str {
        match self {
            IdentityAction::Insert { identity }
            | IdentityAction::Update { identity }
            | IdentityAction::Upgrade { identity, .. } => identity,
        }
    }
}

/// Whether a string is a well-formed official source id: 24 ASCII
/// lowercase hex chars.
pub fn is_official_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// The deterministic identity for records without an official id:
/// `{invoice_number}_{issuer_digits}`.
pub fn fallback_identity(invoice_number: &str, issuer_tax_id: &str) -> String {
    format!("{invoice_number}_{}", cnpj::digits(issuer_tax_id))
}

/// Decide the store action for a candidate, given the lookup results.
///
/// `official_hit` is the identity of a row found under the candidate's
/// official id; `content_hit` the identity of a row found under the
/// `(invoice_number, issuer)` content key. First hit wins. Candidates
/// with no official id and no complete content key are unresolvable and
/// yield `None`.
pub fn resolve_action(
    candidate: &IdentityCandidate,
    official_hit: Option<&str>,
    content_hit: Option<&str>,
) -> Option<IdentityAction> {
    if let Some(id) = &candidate.official_id {
        if official_hit.is_some() {
            return Some(IdentityAction::Update {
                identity: id.clone(),
            });
        }
        if let Some(existing) = content_hit {
            if existing != id {
                return Some(IdentityAction::Upgrade {
                    identity: id.clone(),
                    superseded: existing.to_string(),
                });
            }
            return Some(IdentityAction::Update {
                identity: id.clone(),
            });
        }
        return Some(IdentityAction::Insert {
            identity: id.clone(),
        });
    }

    // No official id: the content key is the only handle on the record.
    let number = candidate.invoice_number.as_deref()?;
    let issuer = candidate.issuer_tax_id.as_deref()?;
    match content_hit {
        Some(existing) => Some(IdentityAction::Update {
            identity: existing.to_string(),
        }),
        None => Some(IdentityAction::Insert {
            identity: fallback_identity(number, issuer),
        }),
    }
}

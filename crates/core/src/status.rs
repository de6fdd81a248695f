//! Status vocabularies shared across the mirror.
//!
//! All values are stored as text columns; the enums here are the single
//! source of truth for the accepted strings.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Record status
// ---------------------------------------------------------------------------

/// Lifecycle state of a stored note row. Rows superseded by an identity
/// upgrade are deleted rather than flipped, but manually imported rows
/// may still carry `legacy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Legacy,
}

impl RecordStatus {
    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Legacy => "legacy",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "legacy" => Some(Self::Legacy),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sync status
// ---------------------------------------------------------------------------

/// How complete the last reconciliation of a row was. `partial` marks
/// rows still missing a positive total or a structured recipient; the
/// repair pass targets those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Partial,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "synced" => Some(Self::Synced),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Source provenance
// ---------------------------------------------------------------------------

/// Which pipeline last wrote a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    RemoteApi,
    StorageListing,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteApi => "remote-api",
            Self::StorageListing => "storage-listing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "remote-api" => Some(Self::RemoteApi),
            "storage-listing" => Some(Self::StorageListing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Outcome of one engine invocation, as recorded in `sync_logs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_status_round_trip() {
        for s in [RecordStatus::Active, RecordStatus::Legacy] {
            assert_eq!(RecordStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(RecordStatus::from_str("archived"), None);
    }

    #[test]
    fn sync_status_round_trip() {
        for s in [SyncStatus::Synced, SyncStatus::Partial] {
            assert_eq!(SyncStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(SyncStatus::from_str(""), None);
    }

    #[test]
    fn provenance_is_kebab_case() {
        assert_eq!(Provenance::RemoteApi.as_str(), "remote-api");
        assert_eq!(
            Provenance::from_str("storage-listing"),
            Some(Provenance::StorageListing)
        );
        assert_eq!(Provenance::from_str("storage_listing"), None);
    }

    #[test]
    fn run_status_display_matches_as_str() {
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert_eq!(RunStatus::Failed.to_string(), "failed");
    }
}

//! Metadata BLOB payload model
//!
//! Only the fields needed to source trust anchors are modeled; the BLOB
//! carries far more per-authenticator detail than this system consumes.
//! Field names follow the camelCase wire format.

use base64::engine::general_purpose::STANDARD as BASE64_STD;
use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anchor::AuthenticatorIdentifier;

/// Payload of a verified metadata BLOB.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlob {
    #[serde(default)]
    pub legal_header: Option<String>,
    /// Serial number of the BLOB; strictly monotonic across publications.
    pub no: u64,
    /// Date by which the next BLOB will be published.
    pub next_update: NaiveDate,
    pub entries: Vec<BlobEntry>,
}

/// One authenticator model entry in the BLOB.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobEntry {
    /// FIDO2 authenticator model identifier.
    #[serde(default)]
    pub aaguid: Option<Uuid>,
    /// U2F attestation certificate key identifiers (hex).
    #[serde(default)]
    pub attestation_certificate_key_identifiers: Option<Vec<String>>,
    #[serde(default)]
    pub metadata_statement: Option<MetadataStatement>,
    #[serde(default)]
    pub status_reports: Vec<StatusReport>,
    #[serde(default)]
    pub time_of_last_status_change: Option<NaiveDate>,
}

/// Trust-relevant subset of a metadata statement, shared between BLOB
/// entries and local statement files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStatement {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub aaguid: Option<Uuid>,
    #[serde(default)]
    pub protocol_family: Option<String>,
    #[serde(default)]
    pub attestation_certificate_key_identifiers: Option<Vec<String>>,
    /// Base64 (standard) DER certificates anchoring this model's
    /// attestation chains.
    #[serde(default)]
    pub attestation_root_certificates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: AuthenticatorStatus,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

/// Certification status of an authenticator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticatorStatus {
    NotFidoCertified,
    SelfAssertionSubmitted,
    FidoCertified,
    FidoCertifiedL1,
    // The published format spells the "plus" levels in lowercase.
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    FidoCertifiedL2,
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    FidoCertifiedL3,
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
    UpdateAvailable,
    Revoked,
    UserVerificationBypass,
    AttestationKeyCompromise,
    UserKeyRemoteCompromise,
    UserKeyPhysicalCompromise,
    #[serde(other)]
    Unknown,
}

impl BlobEntry {
    /// An entry with a `REVOKED` status report contributes no trust.
    pub fn is_revoked(&self) -> bool {
        self.status_reports
            .iter()
            .any(|r| r.status == AuthenticatorStatus::Revoked)
    }

    /// Whether this entry describes the given authenticator.
    pub fn matches(&self, identifier: &AuthenticatorIdentifier) -> bool {
        match identifier {
            AuthenticatorIdentifier::Aaguid(aaguid) => {
                self.aaguid.as_ref() == Some(aaguid)
                    || self
                        .metadata_statement
                        .as_ref()
                        .is_some_and(|s| s.aaguid.as_ref() == Some(aaguid))
            }
            AuthenticatorIdentifier::AttestationKeyId(key_id) => {
                let in_list = |ids: &Option<Vec<String>>| {
                    ids.as_ref()
                        .is_some_and(|ids| ids.iter().any(|id| id.eq_ignore_ascii_case(key_id)))
                };
                in_list(&self.attestation_certificate_key_identifiers)
                    || self
                        .metadata_statement
                        .as_ref()
                        .is_some_and(|s| in_list(&s.attestation_certificate_key_identifiers))
            }
        }
    }

    /// Decode the entry's attestation root certificates to DER.
    ///
    /// Undecodable entries are skipped with a warning rather than
    /// poisoning the rest of the catalog.
    pub fn trust_anchor_ders(&self) -> Vec<Vec<u8>> {
        let Some(statement) = self.metadata_statement.as_ref() else {
            return Vec::new();
        };
        statement
            .attestation_root_certificates
            .iter()
            .filter_map(|b64| match BASE64_STD.decode(b64) {
                Ok(der) => Some(der),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        description = statement.description.as_deref().unwrap_or("<unnamed>"),
                        "Skipping undecodable attestation root certificate"
                    );
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = include_str!("../../tests/fixtures/payload.json");

    fn fixture_blob() -> MetadataBlob {
        serde_json::from_str(PAYLOAD).unwrap()
    }

    #[test]
    fn test_parse_fixture_payload() {
        let blob = fixture_blob();
        assert_eq!(blob.no, 42);
        assert_eq!(blob.entries.len(), 3);
        assert_eq!(
            blob.next_update,
            NaiveDate::from_ymd_opt(2099, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_aaguid_entry_matches() {
        let blob = fixture_blob();
        let aaguid: Uuid = "a1b2c3d4-0000-4000-8000-000000000001".parse().unwrap();
        let id = AuthenticatorIdentifier::Aaguid(aaguid);
        assert!(blob.entries[0].matches(&id));
        assert!(!blob.entries[1].matches(&id));
    }

    #[test]
    fn test_key_identifier_matches_case_insensitively() {
        let blob = fixture_blob();
        let id = AuthenticatorIdentifier::AttestationKeyId(
            "A0B1C2D3E4F5061728394A5B6C7D8E9F00112233".to_string(),
        );
        assert!(blob.entries[1].matches(&id));
        assert!(!blob.entries[0].matches(&id));
    }

    #[test]
    fn test_revoked_entry_detected() {
        let blob = fixture_blob();
        assert!(!blob.entries[0].is_revoked());
        assert!(blob.entries[2].is_revoked());
    }

    #[test]
    fn test_anchor_ders_decode() {
        let blob = fixture_blob();
        let ders = blob.entries[0].trust_anchor_ders();
        assert_eq!(ders.len(), 1);
        // DER SEQUENCE tag
        assert_eq!(ders[0][0], 0x30);
    }

    #[test]
    fn test_unknown_status_tolerated() {
        let report: StatusReport =
            serde_json::from_str(r#"{"status":"SOME_FUTURE_STATUS"}"#).unwrap();
        assert_eq!(report.status, AuthenticatorStatus::Unknown);
    }
}

//! Local metadata-statement provider
//!
//! Metadata statements are per-model JSON files in a configured directory,
//! used to supplement (or stand in for) remote BLOB trust data. The
//! directory is read once at startup, non-recursively. Local statements
//! are an optional enhancement: every failure path here degrades to
//! "absent" instead of failing initialization.

use std::fs;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::anchor::{AuthenticatorIdentifier, TrustAnchor};
use crate::mds::blob::MetadataStatement;

/// The set of metadata statements loaded from one directory.
///
/// Only ever constructed with at least one statement; "present but
/// empty" is not a state this type can represent.
pub struct LocalStatements {
    statements: Vec<MetadataStatement>,
}

impl LocalStatements {
    /// Load every statement file in `dir`, if it is a non-empty directory.
    ///
    /// Returns `None` when the path is empty, is not a directory, cannot
    /// be listed, or yields no parseable statements. Individual
    /// unparseable files are skipped with a warning.
    pub fn load(dir: &str) -> Option<Self> {
        if dir.is_empty() {
            return None;
        }
        let path = Path::new(dir);
        if !path.is_dir() {
            debug!(dir, "Metadata statement path is not a directory");
            return None;
        }

        let listing = match fs::read_dir(path) {
            Ok(listing) => listing,
            Err(e) => {
                error!(dir, error = %e, "Failed to list metadata statement directory");
                return None;
            }
        };

        let mut statements = Vec::new();
        for entry in listing.flatten() {
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }
            match fs::read(&file_path) {
                Ok(bytes) => match serde_json::from_slice::<MetadataStatement>(&bytes) {
                    Ok(statement) => statements.push(statement),
                    Err(e) => {
                        warn!(file = %file_path.display(), error = %e,
                            "Skipping unparseable metadata statement");
                    }
                },
                Err(e) => {
                    warn!(file = %file_path.display(), error = %e,
                        "Skipping unreadable metadata statement");
                }
            }
        }

        if statements.is_empty() {
            debug!(dir, "No metadata statements found in the configured directory");
            return None;
        }

        debug!(dir, count = statements.len(), "Loaded local metadata statements");
        Some(Self { statements })
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Anchors from every statement describing the given authenticator.
    pub fn trust_anchors_for(&self, identifier: &AuthenticatorIdentifier) -> Vec<TrustAnchor> {
        use base64::engine::general_purpose::STANDARD as BASE64_STD;
        use base64::Engine;

        let mut anchors = Vec::new();
        for statement in &self.statements {
            let matches = match identifier {
                AuthenticatorIdentifier::Aaguid(aaguid) => {
                    statement.aaguid.as_ref() == Some(aaguid)
                }
                AuthenticatorIdentifier::AttestationKeyId(key_id) => statement
                    .attestation_certificate_key_identifiers
                    .as_ref()
                    .is_some_and(|ids| ids.iter().any(|id| id.eq_ignore_ascii_case(key_id))),
            };
            if !matches {
                continue;
            }
            for b64 in &statement.attestation_root_certificates {
                let der = match BASE64_STD.decode(b64) {
                    Ok(der) => der,
                    Err(e) => {
                        warn!(error = %e, "Skipping undecodable statement root certificate");
                        continue;
                    }
                };
                match TrustAnchor::from_der(der) {
                    Ok(anchor) => anchors.push(anchor),
                    Err(e) => {
                        warn!(error = %e, "Skipping invalid statement root certificate");
                    }
                }
            }
        }
        anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture_dir() -> String {
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/statements").to_string()
    }

    #[test]
    fn test_empty_path_is_absent() {
        assert!(LocalStatements::load("").is_none());
    }

    #[test]
    fn test_missing_directory_is_absent() {
        assert!(LocalStatements::load("/nonexistent/statements").is_none());
    }

    #[test]
    fn test_empty_directory_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalStatements::load(dir.path().to_str().unwrap()).is_none());
    }

    #[test]
    fn test_loads_fixture_statements() {
        let statements = LocalStatements::load(&fixture_dir()).unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_anchor_lookup_by_aaguid() {
        let statements = LocalStatements::load(&fixture_dir()).unwrap();
        let id = AuthenticatorIdentifier::Aaguid(
            "a1b2c3d4-0000-4000-8000-000000000003".parse().unwrap(),
        );
        let anchors = statements.trust_anchors_for(&id);
        assert_eq!(anchors.len(), 1);
        assert!(anchors[0].subject().contains("Attestation Root C"));
    }

    #[test]
    fn test_anchor_lookup_by_key_identifier() {
        let statements = LocalStatements::load(&fixture_dir()).unwrap();
        let id = AuthenticatorIdentifier::key_id("FFEEDDCCBBAA99887766554433221100FFEEDDCC");
        let anchors = statements.trust_anchors_for(&id);
        assert_eq!(anchors.len(), 1);
        assert!(anchors[0].subject().contains("Attestation Root B"));
    }

    #[test]
    fn test_unknown_identifier_yields_no_anchors() {
        let statements = LocalStatements::load(&fixture_dir()).unwrap();
        let id = AuthenticatorIdentifier::Aaguid(uuid::Uuid::nil());
        assert!(statements.trust_anchors_for(&id).is_empty());
    }

    #[test]
    fn test_unparseable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut good = std::fs::File::create(dir.path().join("good.json")).unwrap();
        good.write_all(
            br#"{"description":"ok","aaguid":"a1b2c3d4-0000-4000-8000-0000000000aa"}"#,
        )
        .unwrap();
        let mut bad = std::fs::File::create(dir.path().join("bad.json")).unwrap();
        bad.write_all(b"{ not json").unwrap();

        let statements = LocalStatements::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_directory_of_only_bad_files_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{ not json").unwrap();
        assert!(LocalStatements::load(dir.path().to_str().unwrap()).is_none());
    }
}

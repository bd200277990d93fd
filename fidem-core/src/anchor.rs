//! Trust anchors and the aggregating anchor repository
//!
//! A trust anchor is a root or intermediate certificate that vouches for
//! an authenticator model's attestation chain. Anchors come from two
//! structurally different sources (remote metadata BLOBs and local
//! statement files); the repository presents them behind one query
//! capability: "given an authenticator identifier, return the matching
//! anchors". The set of repository shapes is closed, so it is an enum
//! rather than a trait object.

use std::fmt;

use uuid::Uuid;
use x509_parser::prelude::*;

use crate::error::{FidemError, Result};
use crate::mds::provider::MdsBlobProvider;
use crate::statements::LocalStatements;

/// One trust anchor: an owned DER certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    der: Vec<u8>,
    subject: String,
}

impl TrustAnchor {
    /// Build an anchor from DER bytes, validating that they parse.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| FidemError::CertificateFormat(format!("invalid anchor DER: {e}")))?;
        let subject = cert.subject().to_string();
        Ok(Self { der, subject })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// How an authenticator model identifies itself in attestation metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatorIdentifier {
    /// FIDO2 model identifier.
    Aaguid(Uuid),
    /// U2F attestation certificate key identifier (hex).
    AttestationKeyId(String),
}

impl AuthenticatorIdentifier {
    /// Normalized key-identifier constructor (lowercase hex).
    pub fn key_id(hex_id: impl Into<String>) -> Self {
        Self::AttestationKeyId(hex_id.into().to_lowercase())
    }
}

impl fmt::Display for AuthenticatorIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aaguid(aaguid) => write!(f, "aaguid:{aaguid}"),
            Self::AttestationKeyId(id) => write!(f, "keyId:{id}"),
        }
    }
}

/// Anchors sourced from successfully refreshed remote BLOB providers.
pub struct BlobAnchorRepository {
    providers: Vec<MdsBlobProvider>,
}

impl BlobAnchorRepository {
    pub fn new(providers: Vec<MdsBlobProvider>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[MdsBlobProvider] {
        &self.providers
    }

    pub fn find_anchors(&self, identifier: &AuthenticatorIdentifier) -> Vec<TrustAnchor> {
        self.providers
            .iter()
            .flat_map(|p| p.trust_anchors_for(identifier))
            .collect()
    }
}

/// Anchors sourced from local metadata-statement files.
pub struct StatementAnchorRepository {
    statements: LocalStatements,
}

impl StatementAnchorRepository {
    pub fn new(statements: LocalStatements) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &LocalStatements {
        &self.statements
    }

    pub fn find_anchors(&self, identifier: &AuthenticatorIdentifier) -> Vec<TrustAnchor> {
        self.statements.trust_anchors_for(identifier)
    }
}

/// The logical trust-anchor repository backing the validator.
pub enum TrustAnchorRepository {
    /// Remote BLOB providers only.
    Blob(BlobAnchorRepository),
    /// Local statement files only.
    Statements(StatementAnchorRepository),
    /// Both sources; queries fan out to each.
    Aggregate {
        blob: BlobAnchorRepository,
        statements: StatementAnchorRepository,
    },
}

impl TrustAnchorRepository {
    /// Combine the available sources into one repository.
    ///
    /// The aggregate shape exists only when both sources are present; a
    /// lone source is used directly, and no repository exists at all
    /// when neither source does.
    pub fn aggregate(
        blob: Option<BlobAnchorRepository>,
        statements: Option<StatementAnchorRepository>,
    ) -> Option<Self> {
        match (blob, statements) {
            (Some(blob), Some(statements)) => Some(Self::Aggregate { blob, statements }),
            (Some(blob), None) => Some(Self::Blob(blob)),
            (None, Some(statements)) => Some(Self::Statements(statements)),
            (None, None) => None,
        }
    }

    /// All anchors vouching for the given authenticator.
    pub fn find_anchors(&self, identifier: &AuthenticatorIdentifier) -> Vec<TrustAnchor> {
        match self {
            Self::Blob(blob) => blob.find_anchors(identifier),
            Self::Statements(statements) => statements.find_anchors(identifier),
            Self::Aggregate { blob, statements } => {
                let mut anchors = blob.find_anchors(identifier);
                anchors.extend(statements.find_anchors(identifier));
                anchors
            }
        }
    }
}

impl fmt::Debug for TrustAnchorRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob(b) => write!(f, "TrustAnchorRepository::Blob({} providers)", b.providers.len()),
            Self::Statements(s) => write!(
                f,
                "TrustAnchorRepository::Statements({} statements)",
                s.statements.len()
            ),
            Self::Aggregate { blob, statements } => write!(
                f,
                "TrustAnchorRepository::Aggregate({} providers + {} statements)",
                blob.providers.len(),
                statements.statements.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_A_DER: &[u8] = include_bytes!("../tests/fixtures/att_root_a.der");

    #[test]
    fn test_anchor_from_valid_der() {
        let anchor = TrustAnchor::from_der(ROOT_A_DER.to_vec()).unwrap();
        assert!(anchor.subject().contains("Fidem Test Attestation Root A"));
    }

    #[test]
    fn test_anchor_from_garbage_der() {
        let err = TrustAnchor::from_der(vec![0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, FidemError::CertificateFormat(_)));
    }

    #[test]
    fn test_identifier_display() {
        let id = AuthenticatorIdentifier::key_id("A0B1C2");
        assert_eq!(id.to_string(), "keyId:a0b1c2");
    }

    #[test]
    fn test_aggregate_requires_a_source() {
        assert!(TrustAnchorRepository::aggregate(None, None).is_none());
    }
}

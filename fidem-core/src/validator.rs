//! Attestation certificate-path validation
//!
//! The validator is the one long-lived artifact of initialization. Given
//! an authenticator identifier and its attestation certificate chain
//! (leaf first, DER), it checks structural chain validity and requires
//! the chain to terminate at a trust anchor known to the repository. A
//! chain that carries its own self-signed root is rejected under the
//! full-chain-prohibited policy: an authenticator vouching for itself
//! proves nothing.

use x509_parser::prelude::*;

use crate::anchor::{AuthenticatorIdentifier, TrustAnchorRepository};
use crate::error::{FidemError, Result};

/// Successful anchoring of an attestation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPath {
    /// Subject of the anchor that vouches for the chain.
    pub anchor_subject: String,
    /// Number of certificates in the presented chain.
    pub chain_len: usize,
}

/// Certificate-path validator over an aggregated trust-anchor repository.
pub struct CertPathValidator {
    repository: TrustAnchorRepository,
    full_chain_prohibited: bool,
}

impl CertPathValidator {
    /// Wrap a repository with the fixed production policy: full
    /// self-signed chains are prohibited.
    pub fn new(repository: TrustAnchorRepository) -> Self {
        Self {
            repository,
            full_chain_prohibited: true,
        }
    }

    pub fn repository(&self) -> &TrustAnchorRepository {
        &self.repository
    }

    pub fn full_chain_prohibited(&self) -> bool {
        self.full_chain_prohibited
    }

    /// Validate an attestation certificate chain (leaf first, DER).
    pub fn validate(
        &self,
        identifier: &AuthenticatorIdentifier,
        chain_der: &[Vec<u8>],
    ) -> Result<TrustPath> {
        if chain_der.is_empty() {
            return Err(FidemError::InvalidChain(
                "empty attestation certificate chain".to_string(),
            ));
        }

        let parsed: Vec<X509Certificate> = chain_der
            .iter()
            .map(|der| {
                X509Certificate::from_der(der)
                    .map(|(_, cert)| cert)
                    .map_err(|e| FidemError::InvalidChain(format!("unparsable certificate: {e}")))
            })
            .collect::<Result<_>>()?;

        let now = chrono::Utc::now().timestamp();
        for cert in &parsed {
            let validity = cert.validity();
            if now < validity.not_before.timestamp() || now > validity.not_after.timestamp() {
                return Err(FidemError::InvalidChain(format!(
                    "certificate outside its validity window: {}",
                    cert.subject()
                )));
            }
        }

        for pair in parsed.windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            if child.issuer().as_raw() != parent.subject().as_raw() {
                return Err(FidemError::InvalidChain(format!(
                    "'{}' is not issued by the next chain certificate '{}'",
                    child.subject(),
                    parent.subject()
                )));
            }
            child
                .verify_signature(Some(parent.public_key()))
                .map_err(|_| {
                    FidemError::InvalidChain(format!(
                        "signature check failed for '{}'",
                        child.subject()
                    ))
                })?;
        }

        let last = &parsed[parsed.len() - 1];
        let last_der = &chain_der[chain_der.len() - 1];
        let self_signed = last.subject().as_raw() == last.issuer().as_raw()
            && last.verify_signature(None).is_ok();
        if self_signed && self.full_chain_prohibited {
            return Err(FidemError::FullChainProhibited);
        }

        let anchors = self.repository.find_anchors(identifier);
        if anchors.is_empty() {
            return Err(FidemError::UntrustedAttestation(format!(
                "no trust anchors registered for {identifier}"
            )));
        }

        for anchor in &anchors {
            if anchor.der() == last_der.as_slice() {
                return Ok(TrustPath {
                    anchor_subject: anchor.subject().to_string(),
                    chain_len: chain_der.len(),
                });
            }
            let Ok((_, anchor_cert)) = X509Certificate::from_der(anchor.der()) else {
                continue;
            };
            if last.issuer().as_raw() == anchor_cert.subject().as_raw()
                && last.verify_signature(Some(anchor_cert.public_key())).is_ok()
            {
                return Ok(TrustPath {
                    anchor_subject: anchor.subject().to_string(),
                    chain_len: chain_der.len(),
                });
            }
        }

        Err(FidemError::UntrustedAttestation(format!(
            "no configured trust anchor vouches for the chain presented by {identifier}"
        )))
    }
}

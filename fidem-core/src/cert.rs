//! Root certificate loading
//!
//! Loads the single MDS root certificate that anchors trust in remote
//! metadata BLOBs. A missing file and an unparsable file are reported as
//! distinct errors since both are fatal to remote-provider construction.

use std::fs;

use x509_parser::prelude::*;

use crate::error::{FidemError, Result};

/// An X.509 root certificate, immutable once loaded.
///
/// Owns its DER encoding; `x509-parser` borrows from the input, so the
/// certificate is re-parsed on demand from the owned bytes.
#[derive(Debug, Clone)]
pub struct RootCertificate {
    der: Vec<u8>,
    subject: String,
}

impl RootCertificate {
    /// Load exactly one X.509 certificate (PEM or DER) from a file.
    pub fn load(path: &str) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            FidemError::CertificateSource(format!("cannot read '{path}': {e}"))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse a certificate from raw PEM or DER bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let der = if bytes.starts_with(b"-----BEGIN") {
            let block = ::pem::parse(bytes)
                .map_err(|e| FidemError::CertificateFormat(format!("invalid PEM: {e}")))?;
            if block.tag() != "CERTIFICATE" {
                return Err(FidemError::CertificateFormat(format!(
                    "expected a CERTIFICATE block, found {}",
                    block.tag()
                )));
            }
            block.into_contents()
        } else {
            bytes.to_vec()
        };

        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| FidemError::CertificateFormat(format!("invalid X.509 DER: {e}")))?;
        let subject = cert.subject().to_string();

        Ok(Self { der, subject })
    }

    /// DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Parse the owned DER into a borrowed certificate view.
    pub fn parse(&self) -> Result<X509Certificate<'_>> {
        let (_, cert) = X509Certificate::from_der(&self.der)
            .map_err(|e| FidemError::CertificateFormat(format!("invalid X.509 DER: {e}")))?;
        Ok(cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_PEM: &[u8] = include_bytes!("../tests/fixtures/mds_root.pem");
    const ROOT_DER: &[u8] = include_bytes!("../tests/fixtures/mds_root.der");

    #[test]
    fn test_load_pem_certificate() {
        let cert = RootCertificate::from_bytes(ROOT_PEM).unwrap();
        assert!(cert.subject().contains("Fidem Test Metadata Root"));
        assert!(!cert.der().is_empty());
    }

    #[test]
    fn test_load_der_certificate() {
        let cert = RootCertificate::from_bytes(ROOT_DER).unwrap();
        assert!(cert.subject().contains("Fidem Test Metadata Root"));
    }

    #[test]
    fn test_pem_and_der_agree() {
        let from_pem = RootCertificate::from_bytes(ROOT_PEM).unwrap();
        let from_der = RootCertificate::from_bytes(ROOT_DER).unwrap();
        assert_eq!(from_pem.der(), from_der.der());
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let err = RootCertificate::load("/nonexistent/root.pem").unwrap_err();
        assert!(matches!(err, FidemError::CertificateSource(_)));
    }

    #[test]
    fn test_garbage_is_format_error() {
        let err = RootCertificate::from_bytes(b"not a certificate").unwrap_err();
        assert!(matches!(err, FidemError::CertificateFormat(_)));
    }

    #[test]
    fn test_non_certificate_pem_rejected() {
        let block = ::pem::Pem::new("PRIVATE KEY", vec![1, 2, 3]);
        let encoded = ::pem::encode(&block);
        let err = RootCertificate::from_bytes(encoded.as_bytes()).unwrap_err();
        assert!(matches!(err, FidemError::CertificateFormat(_)));
    }
}

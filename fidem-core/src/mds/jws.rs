//! Compact-JWS verification for metadata BLOBs
//!
//! A BLOB is a JWS whose protected header carries the signing certificate
//! chain (`x5c`). Verification proceeds in two steps: the chain is
//! verified structurally and cryptographically up to the pinned MDS root
//! certificate, then the payload signature is checked against the leaf
//! certificate's public key. Only after both steps is the payload parsed
//! and released.

use base64::engine::general_purpose::{STANDARD as BASE64_STD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;
use x509_parser::revocation_list::CertificateRevocationList;

use crate::cert::RootCertificate;
use crate::error::{FidemError, Result};
use crate::mds::blob::MetadataBlob;

/// A payload that passed chain and signature verification, together with
/// the DER signing chain (leaf first) for optional revocation checking.
#[derive(Debug)]
pub struct VerifiedBlob {
    pub payload: MetadataBlob,
    pub signing_chain: Vec<Vec<u8>>,
}

/// Verify a compact-JWS BLOB against the pinned root certificate.
pub fn verify_blob(token: &str, root: &RootCertificate) -> Result<VerifiedBlob> {
    let header = decode_header(token)
        .map_err(|e| FidemError::BlobParse(format!("invalid JWS header: {e}")))?;

    if !matches!(header.alg, Algorithm::RS256 | Algorithm::ES256) {
        return Err(FidemError::BlobVerification(format!(
            "unsupported BLOB signing algorithm {:?}",
            header.alg
        )));
    }

    let x5c = header.x5c.ok_or_else(|| {
        FidemError::BlobVerification("JWS header carries no x5c signing chain".to_string())
    })?;

    let signing_chain: Vec<Vec<u8>> = x5c
        .iter()
        .map(|b64| {
            BASE64_STD
                .decode(b64)
                .map_err(|e| FidemError::BlobParse(format!("undecodable x5c certificate: {e}")))
        })
        .collect::<Result<_>>()?;

    verify_chain_to_root(&signing_chain, root)?;

    let (_, leaf) = X509Certificate::from_der(&signing_chain[0])
        .map_err(|e| FidemError::BlobParse(format!("invalid x5c leaf certificate: {e}")))?;
    let decoding_key = decoding_key_for(&leaf, header.alg)?;

    let mut validation = Validation::new(header.alg);
    // BLOB freshness is governed by nextUpdate, not JWT registered claims.
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<MetadataBlob>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::Json(_) => {
                FidemError::BlobParse(format!("invalid BLOB payload: {e}"))
            }
            _ => FidemError::BlobVerification(format!("BLOB signature verification failed: {e}")),
        }
    })?;

    Ok(VerifiedBlob {
        payload: data.claims,
        signing_chain,
    })
}

/// Verify the x5c chain (leaf first) up to the pinned root.
///
/// Each certificate must be within its validity window, each link must
/// chain by issuer/subject and signature, and the final certificate must
/// either be the root itself or be directly issued and signed by it.
fn verify_chain_to_root(chain: &[Vec<u8>], root: &RootCertificate) -> Result<()> {
    if chain.is_empty() {
        return Err(FidemError::BlobVerification(
            "empty x5c signing chain".to_string(),
        ));
    }

    let parsed: Vec<X509Certificate> = chain
        .iter()
        .map(|der| {
            X509Certificate::from_der(der)
                .map(|(_, cert)| cert)
                .map_err(|e| {
                    FidemError::BlobVerification(format!("invalid x5c certificate: {e}"))
                })
        })
        .collect::<Result<_>>()?;

    let now = chrono::Utc::now().timestamp();
    for cert in &parsed {
        let validity = cert.validity();
        if now < validity.not_before.timestamp() || now > validity.not_after.timestamp() {
            return Err(FidemError::BlobVerification(format!(
                "x5c certificate outside its validity window: {}",
                cert.subject()
            )));
        }
    }

    for pair in parsed.windows(2) {
        let (child, parent) = (&pair[0], &pair[1]);
        if child.issuer().as_raw() != parent.subject().as_raw() {
            return Err(FidemError::BlobVerification(format!(
                "broken x5c chain: '{}' not issued by '{}'",
                child.subject(),
                parent.subject()
            )));
        }
        child
            .verify_signature(Some(parent.public_key()))
            .map_err(|_| {
                FidemError::BlobVerification(format!(
                    "x5c signature check failed for '{}'",
                    child.subject()
                ))
            })?;
    }

    // Anchor the last chain element at the pinned root.
    let last_der = &chain[chain.len() - 1];
    let last = &parsed[parsed.len() - 1];
    if last_der.as_slice() == root.der() {
        return Ok(());
    }
    let root_cert = root.parse()?;
    if last.issuer().as_raw() != root_cert.subject().as_raw() {
        return Err(FidemError::BlobVerification(format!(
            "signing chain does not terminate at the configured root (got issuer '{}')",
            last.issuer()
        )));
    }
    last.verify_signature(Some(root_cert.public_key()))
        .map_err(|_| {
            FidemError::BlobVerification(
                "signing chain not signed by the configured root".to_string(),
            )
        })
}

/// Build a payload-verification key from the leaf certificate's SPKI.
fn decoding_key_for(leaf: &X509Certificate, alg: Algorithm) -> Result<DecodingKey> {
    let public_key = leaf.public_key().parsed().map_err(|e| {
        FidemError::BlobVerification(format!("unparsable leaf public key: {e}"))
    })?;

    match (alg, public_key) {
        (Algorithm::RS256, PublicKey::RSA(rsa)) => {
            let n = URL_SAFE_NO_PAD.encode(strip_leading_zeros(rsa.modulus));
            let e = URL_SAFE_NO_PAD.encode(strip_leading_zeros(rsa.exponent));
            DecodingKey::from_rsa_components(&n, &e).map_err(|e| {
                FidemError::BlobVerification(format!("unusable RSA signing key: {e}"))
            })
        }
        (Algorithm::ES256, PublicKey::EC(point)) => {
            let data = point.data();
            // Uncompressed SEC1 point: 0x04 || X || Y
            if data.len() != 65 || data[0] != 0x04 {
                return Err(FidemError::BlobVerification(
                    "unsupported EC point encoding in leaf certificate".to_string(),
                ));
            }
            let x = URL_SAFE_NO_PAD.encode(&data[1..33]);
            let y = URL_SAFE_NO_PAD.encode(&data[33..65]);
            DecodingKey::from_ec_components(&x, &y).map_err(|e| {
                FidemError::BlobVerification(format!("unusable EC signing key: {e}"))
            })
        }
        (alg, _) => Err(FidemError::BlobVerification(format!(
            "leaf key type does not match signing algorithm {alg:?}"
        ))),
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Collect HTTP(S) CRL distribution URLs referenced by a signing chain.
pub(crate) fn crl_distribution_urls(chain: &[Vec<u8>]) -> Vec<String> {
    let mut urls = Vec::new();
    for der in chain {
        let Ok((_, cert)) = X509Certificate::from_der(der) else {
            continue;
        };
        for ext in cert.extensions() {
            let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() else {
                continue;
            };
            for point in &points.points {
                let Some(DistributionPointName::FullName(names)) = &point.distribution_point
                else {
                    continue;
                };
                for name in names {
                    if let GeneralName::URI(uri) = name {
                        if uri.starts_with("http://") || uri.starts_with("https://") {
                            urls.push(uri.to_string());
                        }
                    }
                }
            }
        }
    }
    urls
}

/// Reject the chain if any certificate's serial appears in the given CRLs.
pub(crate) fn check_revocation(chain: &[Vec<u8>], crl_ders: &[Vec<u8>]) -> Result<()> {
    let mut revoked_serials: Vec<Vec<u8>> = Vec::new();
    for der in crl_ders {
        let (_, crl) = CertificateRevocationList::from_der(der)
            .map_err(|e| FidemError::BlobVerification(format!("invalid CRL: {e}")))?;
        for revoked in crl.iter_revoked_certificates() {
            revoked_serials.push(revoked.raw_serial().to_vec());
        }
    }

    for der in chain {
        let Ok((_, cert)) = X509Certificate::from_der(der) else {
            continue;
        };
        if revoked_serials
            .iter()
            .any(|serial| serial.as_slice() == cert.raw_serial())
        {
            return Err(FidemError::BlobVerification(format!(
                "signing certificate '{}' is revoked",
                cert.subject()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB_JWT: &str = include_str!("../../tests/fixtures/blob.jwt");
    const ROGUE_JWT: &str = include_str!("../../tests/fixtures/rogue_blob.jwt");
    const TAMPERED_JWT: &str = include_str!("../../tests/fixtures/tampered_blob.jwt");
    const ROOT_PEM: &[u8] = include_bytes!("../../tests/fixtures/mds_root.pem");
    const ROGUE_ROOT_PEM: &[u8] = include_bytes!("../../tests/fixtures/rogue_root.pem");

    fn root() -> RootCertificate {
        RootCertificate::from_bytes(ROOT_PEM).unwrap()
    }

    #[test]
    fn test_verify_valid_blob() {
        let verified = verify_blob(BLOB_JWT, &root()).unwrap();
        assert_eq!(verified.payload.no, 42);
        assert_eq!(verified.payload.entries.len(), 3);
        assert_eq!(verified.signing_chain.len(), 1);
    }

    #[test]
    fn test_reject_blob_signed_by_untrusted_chain() {
        let err = verify_blob(ROGUE_JWT, &root()).unwrap_err();
        assert!(matches!(err, FidemError::BlobVerification(_)), "{err}");
    }

    #[test]
    fn test_rogue_blob_verifies_against_its_own_root() {
        // Sanity check: the rogue fixture is only untrusted relative to
        // the pinned root, not malformed.
        let rogue_root = RootCertificate::from_bytes(ROGUE_ROOT_PEM).unwrap();
        assert!(verify_blob(ROGUE_JWT, &rogue_root).is_ok());
    }

    #[test]
    fn test_reject_tampered_signature() {
        let err = verify_blob(TAMPERED_JWT, &root()).unwrap_err();
        assert!(matches!(err, FidemError::BlobVerification(_)), "{err}");
    }

    #[test]
    fn test_reject_garbage_token() {
        let err = verify_blob("definitely.not.a-jws", &root()).unwrap_err();
        assert!(matches!(err, FidemError::BlobParse(_)), "{err}");
    }

    #[test]
    fn test_empty_crl_set_revokes_nothing() {
        let verified = verify_blob(BLOB_JWT, &root()).unwrap();
        assert!(check_revocation(&verified.signing_chain, &[]).is_ok());
    }

    #[test]
    fn test_fixture_chain_has_no_distribution_points() {
        let verified = verify_blob(BLOB_JWT, &root()).unwrap();
        assert!(crl_distribution_urls(&verified.signing_chain).is_empty());
    }
}

//! Remote metadata BLOB provider
//!
//! One provider per configured endpoint, bound to that endpoint and the
//! pinned root certificate. Construction and refresh are separate steps
//! with separate failure modes: `new` validates the URL and builds the
//! HTTP client, `refresh` performs one fetch-verify-parse cycle. A
//! provider whose refresh never succeeded simply holds no payload and
//! yields no anchors.

use std::sync::RwLock;
use std::time::Duration;

use tracing::{debug, info, instrument};
use url::Url;

use crate::anchor::{AuthenticatorIdentifier, TrustAnchor};
use crate::cert::RootCertificate;
use crate::error::{FidemError, Result};
use crate::mds::blob::MetadataBlob;
use crate::mds::jws;

/// A remote metadata source bound to exactly one URL.
#[derive(Debug)]
pub struct MdsBlobProvider {
    url: Url,
    client: reqwest::Client,
    root: RootCertificate,
    revocation_check_enabled: bool,
    blob: RwLock<Option<MetadataBlob>>,
}

impl MdsBlobProvider {
    /// Construct a provider for one endpoint.
    ///
    /// Fails if the URL does not parse or the HTTP client cannot be
    /// built; network reachability is not probed until [`refresh`].
    ///
    /// [`refresh`]: MdsBlobProvider::refresh
    pub fn new(url: &str, root: RootCertificate, fetch_timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| {
            FidemError::ProviderConstruction(format!("invalid endpoint URL '{url}': {e}"))
        })?;

        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| {
                FidemError::ProviderConstruction(format!("failed to build HTTP client: {e}"))
            })?;

        debug!(url = %url, "Constructed MDS BLOB provider");
        Ok(Self {
            url,
            client,
            root,
            revocation_check_enabled: false,
            blob: RwLock::new(None),
        })
    }

    /// Toggle CRL checking of the BLOB signing chain.
    ///
    /// Off by default: the FIDO conformance test environment serves
    /// signing chains without reachable revocation infrastructure.
    pub fn set_revocation_check_enabled(&mut self, enabled: bool) {
        self.revocation_check_enabled = enabled;
    }

    pub fn revocation_check_enabled(&self) -> bool {
        self.revocation_check_enabled
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Fetch, verify and store the endpoint's current BLOB.
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    pub async fn refresh(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| FidemError::BlobFetch(format!("GET {}: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(FidemError::BlobFetch(format!(
                "{} returned status {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FidemError::BlobFetch(format!("reading body from {}: {e}", self.url)))?;

        let verified = jws::verify_blob(body.trim(), &self.root)?;

        if self.revocation_check_enabled {
            self.check_signing_chain_revocation(&verified.signing_chain)
                .await?;
        }

        info!(
            url = %self.url,
            no = verified.payload.no,
            next_update = %verified.payload.next_update,
            entries = verified.payload.entries.len(),
            "Refreshed metadata BLOB"
        );

        let mut slot = self.blob.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(verified.payload);
        Ok(())
    }

    /// Fetch the CRLs referenced by the signing chain and reject revoked
    /// serials. Chains that reference no CRLs pass vacuously.
    async fn check_signing_chain_revocation(&self, chain: &[Vec<u8>]) -> Result<()> {
        let mut crl_ders = Vec::new();
        for crl_url in jws::crl_distribution_urls(chain) {
            let bytes = self
                .client
                .get(&crl_url)
                .send()
                .await
                .map_err(|e| FidemError::BlobFetch(format!("GET {crl_url}: {e}")))?
                .bytes()
                .await
                .map_err(|e| FidemError::BlobFetch(format!("reading CRL {crl_url}: {e}")))?;

            if bytes.starts_with(b"-----BEGIN") {
                let block = pem::parse(&bytes[..]).map_err(|e| {
                    FidemError::BlobVerification(format!("invalid PEM CRL from {crl_url}: {e}"))
                })?;
                crl_ders.push(block.into_contents());
            } else {
                crl_ders.push(bytes.to_vec());
            }
        }
        jws::check_revocation(chain, &crl_ders)
    }

    /// Whether a refresh has succeeded since construction.
    pub fn is_refreshed(&self) -> bool {
        self.blob
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Number of entries in the last refreshed BLOB.
    pub fn entry_count(&self) -> usize {
        self.blob
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(0, |blob| blob.entries.len())
    }

    /// Serial number of the last refreshed BLOB.
    pub fn blob_no(&self) -> Option<u64> {
        self.blob
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|blob| blob.no)
    }

    /// Anchors for the given authenticator from the last refreshed BLOB.
    ///
    /// Revoked entries contribute nothing.
    pub fn trust_anchors_for(&self, identifier: &AuthenticatorIdentifier) -> Vec<TrustAnchor> {
        let blob = self.blob.read().unwrap_or_else(|e| e.into_inner());
        let Some(blob) = blob.as_ref() else {
            return Vec::new();
        };

        let mut anchors = Vec::new();
        for entry in &blob.entries {
            if entry.is_revoked() || !entry.matches(identifier) {
                continue;
            }
            for der in entry.trust_anchor_ders() {
                match TrustAnchor::from_der(der) {
                    Ok(anchor) => anchors.push(anchor),
                    Err(e) => {
                        tracing::warn!(error = %e, url = %self.url,
                            "Skipping invalid attestation root certificate in BLOB");
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

    const ROOT_PEM: &[u8] = include_bytes!("../../tests/fixtures/mds_root.pem");

    fn root() -> RootCertificate {
        RootCertificate::from_bytes(ROOT_PEM).unwrap()
    }

    #[test]
    fn test_invalid_url_fails_construction() {
        let err = MdsBlobProvider::new("not a url", root(), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, FidemError::ProviderConstruction(_)));
    }

    #[test]
    fn test_fresh_provider_holds_no_blob() {
        let provider =
            MdsBlobProvider::new("https://mds.example.com/blob.jwt", root(), Duration::from_secs(5))
                .unwrap();
        assert!(!provider.is_refreshed());
        assert_eq!(provider.entry_count(), 0);
        assert_eq!(provider.blob_no(), None);

        let id = AuthenticatorIdentifier::Aaguid(uuid::Uuid::nil());
        assert!(provider.trust_anchors_for(&id).is_empty());
    }

    #[test]
    fn test_revocation_check_defaults_off_and_toggles() {
        let mut provider =
            MdsBlobProvider::new("https://mds.example.com/blob.jwt", root(), Duration::from_secs(5))
                .unwrap();
        assert!(!provider.revocation_check_enabled());
        provider.set_revocation_check_enabled(true);
        assert!(provider.revocation_check_enabled());
    }

    #[tokio::test]
    async fn test_refresh_against_unreachable_endpoint_fails() {
        // Port 1 on loopback refuses connections without touching the network.
        let provider =
            MdsBlobProvider::new("http://127.0.0.1:1/blob.jwt", root(), Duration::from_secs(2))
                .unwrap();
        let err = provider.refresh().await.unwrap_err();
        assert!(matches!(err, FidemError::BlobFetch(_)), "{err}");
        assert!(!provider.is_refreshed());
    }
}

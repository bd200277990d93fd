//! Initialization orchestrator
//!
//! `MetadataService` ties the pipeline together: load the root
//! certificate, build one remote provider per configured endpoint,
//! gather local statements, aggregate the surviving sources and publish
//! a fresh validator. Only the root-certificate step is fatal; endpoint
//! failures are isolated per URL, and a run that ends with no usable
//! remote source aborts quietly so a later trigger can retry.

use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use crate::anchor::{BlobAnchorRepository, StatementAnchorRepository, TrustAnchorRepository};
use crate::cert::RootCertificate;
use crate::config::MetadataConfig;
use crate::error::Result;
use crate::mds::provider::MdsBlobProvider;
use crate::statements::LocalStatements;
use crate::validator::CertPathValidator;

/// Process-wide metadata trust service.
///
/// Construct once, call [`initialize`] at startup (and again on a later
/// trigger if it aborted), and hand [`validator`] clones to whatever
/// performs attestation checks. The published validator is replaced
/// wholesale by each successful run; readers holding an `Arc` keep a
/// consistent snapshot.
///
/// [`initialize`]: MetadataService::initialize
/// [`validator`]: MetadataService::validator
pub struct MetadataService {
    pub config: MetadataConfig,
    resolved_endpoints: RwLock<Option<Vec<String>>>,
    validator: RwLock<Option<Arc<CertPathValidator>>>,
}

impl MetadataService {
    pub fn new(config: MetadataConfig) -> Self {
        Self {
            config,
            resolved_endpoints: RwLock::new(None),
            validator: RwLock::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(MetadataConfig::from_env())
    }

    /// Resolved endpoint list, memoized for the service's lifetime.
    ///
    /// Concurrent first calls may race on filling the cache; resolution
    /// is pure, so every racer computes the same value and the final
    /// state converges.
    pub fn resolved_endpoints(&self) -> Vec<String> {
        {
            let cache = self
                .resolved_endpoints
                .read()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(endpoints) = cache.as_ref() {
                return endpoints.clone();
            }
        }

        let endpoints = self.config.endpoints.resolve();
        let mut cache = self
            .resolved_endpoints
            .write()
            .unwrap_or_else(|e| e.into_inner());
        cache.get_or_insert_with(|| endpoints).clone()
    }

    /// Drop the memoized endpoint list so the next call recomputes it.
    pub fn reset_endpoint_cache(&self) {
        *self
            .resolved_endpoints
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Run the initialization pipeline once.
    ///
    /// Fails only when the root certificate cannot be loaded. Any other
    /// shortfall is reflected solely in whether a validator gets
    /// published: when every configured endpoint fails, or no trust
    /// source exists at all, the run returns `Ok` without touching the
    /// previously published validator.
    pub async fn initialize(&self) -> Result<()> {
        let root = RootCertificate::load(&self.config.root_certificate_path).map_err(|e| {
            error!(
                path = %self.config.root_certificate_path,
                error = %e,
                "Failed to load the MDS root certificate"
            );
            e
        })?;

        let endpoints = self.resolved_endpoints();
        let mut providers = Vec::new();
        for url in &endpoints {
            match MdsBlobProvider::new(url, root.clone(), self.config.fetch_timeout) {
                Ok(mut provider) => {
                    provider.set_revocation_check_enabled(self.config.revocation_check_enabled);
                    match provider.refresh().await {
                        Ok(()) => providers.push(provider),
                        Err(e) => {
                            error!(url = %url, error = %e, "Dropping BLOB provider that failed to refresh");
                        }
                    }
                }
                Err(e) => {
                    error!(url = %url, error = %e, "Dropping BLOB provider that failed to construct");
                }
            }
        }

        if !endpoints.is_empty() && providers.is_empty() {
            debug!(
                endpoints = endpoints.len(),
                "Every configured metadata endpoint failed; aborting this initialization"
            );
            return Ok(());
        }

        let blob_repository =
            (!providers.is_empty()).then(|| BlobAnchorRepository::new(providers));
        let statement_repository = LocalStatements::load(&self.config.statement_directory)
            .map(StatementAnchorRepository::new);

        let Some(repository) =
            TrustAnchorRepository::aggregate(blob_repository, statement_repository)
        else {
            debug!("No trust source available; aborting this initialization");
            return Ok(());
        };

        info!(repository = ?repository, "Publishing attestation trust validator");
        let validator = Arc::new(CertPathValidator::new(repository));
        *self.validator.write().unwrap_or_else(|e| e.into_inner()) = Some(validator);
        Ok(())
    }

    /// The currently published validator, if any initialization run has
    /// succeeded. `None` means attestation trust-chain validation is
    /// unavailable and the caller decides its own fallback policy.
    pub fn validator(&self) -> Option<Arc<CertPathValidator>> {
        self.validator
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointValue;

    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_endpoint_memoization_is_stable() {
        let service = MetadataService::new(MetadataConfig {
            endpoints: EndpointValue::List(vec![
                "https://a.example.com".to_string(),
                "https://b.example.com".to_string(),
            ]),
            ..MetadataConfig::default()
        });

        let first = service.resolved_endpoints();
        let second = service.resolved_endpoints();
        assert_eq!(first, second);
        assert_eq!(first, vec!["https://a.example.com", "https://b.example.com"]);
    }

    #[test]
    fn test_endpoint_cache_reset() {
        let service = MetadataService::new(MetadataConfig {
            endpoints: EndpointValue::Single("https://a.example.com".to_string()),
            ..MetadataConfig::default()
        });
        assert_eq!(service.resolved_endpoints().len(), 1);
        service.reset_endpoint_cache();
        assert_eq!(service.resolved_endpoints().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_root_certificate_is_fatal() {
        let service = MetadataService::new(MetadataConfig {
            root_certificate_path: "/nonexistent/root.pem".to_string(),
            ..MetadataConfig::default()
        });
        let err = service.initialize().await.unwrap_err();
        assert!(matches!(err, crate::error::FidemError::CertificateSource(_)));
        assert!(service.validator().is_none());
    }

    #[tokio::test]
    async fn test_unparsable_root_certificate_is_fatal() {
        let service = MetadataService::new(MetadataConfig {
            root_certificate_path: fixture("not_a_cert.pem"),
            ..MetadataConfig::default()
        });
        let err = service.initialize().await.unwrap_err();
        assert!(matches!(err, crate::error::FidemError::CertificateFormat(_)));
        assert!(service.validator().is_none());
    }

    #[tokio::test]
    async fn test_no_source_at_all_aborts_quietly() {
        let service = MetadataService::new(MetadataConfig {
            root_certificate_path: fixture("mds_root.pem"),
            ..MetadataConfig::default()
        });
        service.initialize().await.unwrap();
        assert!(service.validator().is_none());
    }

    #[tokio::test]
    async fn test_statements_alone_back_a_validator() {
        let service = MetadataService::new(MetadataConfig {
            root_certificate_path: fixture("mds_root.pem"),
            statement_directory: fixture("statements"),
            ..MetadataConfig::default()
        });
        service.initialize().await.unwrap();
        let validator = service.validator().expect("validator should be published");
        assert!(matches!(
            validator.repository(),
            TrustAnchorRepository::Statements(_)
        ));
    }

    #[tokio::test]
    async fn test_all_endpoints_failing_aborts_softly() {
        let service = MetadataService::new(MetadataConfig {
            root_certificate_path: fixture("mds_root.pem"),
            endpoints: EndpointValue::List(vec![
                "http://127.0.0.1:1/a".to_string(),
                "not a url".to_string(),
            ]),
            // Statements exist, but remote trust was demanded and failed.
            statement_directory: fixture("statements"),
            fetch_timeout: std::time::Duration::from_secs(2),
            ..MetadataConfig::default()
        });
        service.initialize().await.unwrap();
        assert!(service.validator().is_none());
    }
}

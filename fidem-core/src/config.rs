//! Metadata service configuration
//!
//! Handles loading the metadata-source configuration from environment
//! variables with sensible defaults. The endpoint value is kept as a sum
//! type so that "not configured", "one URL" and "several URLs" stay
//! distinguishable until resolution.

use std::time::Duration;

/// Configured metadata-service endpoint value.
///
/// Mirrors the three shapes the configuration store may hold: nothing,
/// a single URL, or an ordered list of URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EndpointValue {
    /// No endpoint configured
    #[default]
    Absent,
    /// A single endpoint URL
    Single(String),
    /// An ordered list of endpoint URLs
    List(Vec<String>),
}

impl EndpointValue {
    /// Resolve into an ordered list of URLs.
    ///
    /// A scalar becomes a one-element list and absence becomes the empty
    /// list. Order is preserved as configured; no deduplication or
    /// trimming is applied.
    pub fn resolve(&self) -> Vec<String> {
        match self {
            EndpointValue::Absent => Vec::new(),
            EndpointValue::Single(url) => vec![url.clone()],
            EndpointValue::List(urls) => urls.clone(),
        }
    }
}

/// Metadata trust-source configuration.
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Path to the MDS root certificate file (PEM or DER)
    pub root_certificate_path: String,
    /// Directory containing local metadata-statement files
    pub statement_directory: String,
    /// Configured metadata-service endpoint(s)
    pub endpoints: EndpointValue,
    /// Timeout applied to each remote metadata fetch (default: 30s)
    pub fetch_timeout: Duration,
    /// Whether BLOB signing chains are checked against CRLs.
    /// Off by default: the FIDO conformance test environment serves
    /// chains without reachable revocation infrastructure.
    pub revocation_check_enabled: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            root_certificate_path: String::new(),
            statement_directory: String::new(),
            endpoints: EndpointValue::Absent,
            fetch_timeout: Duration::from_secs(30),
            revocation_check_enabled: false,
        }
    }
}

impl MetadataConfig {
    /// Load configuration from environment variables.
    ///
    /// - `FIDO_MDS_ROOT_CERTIFICATE` - root certificate file path
    /// - `FIDO_METADATA_STATEMENTS` - local statement directory
    /// - `FIDO_MDS_ENDPOINTS` - one URL, or several separated by commas
    /// - `FIDO_MDS_TIMEOUT_SECS` - per-fetch timeout (default: 30)
    /// - `FIDO_MDS_REVOCATION_CHECK` - enable CRL checking (default: false)
    pub fn from_env() -> Self {
        let root_certificate_path =
            std::env::var("FIDO_MDS_ROOT_CERTIFICATE").unwrap_or_default();

        let statement_directory = std::env::var("FIDO_METADATA_STATEMENTS").unwrap_or_default();

        let endpoints = match std::env::var("FIDO_MDS_ENDPOINTS") {
            Err(_) => EndpointValue::Absent,
            Ok(value) if value.contains(',') => EndpointValue::List(
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            Ok(value) => EndpointValue::Single(value),
        };

        let fetch_timeout = std::env::var("FIDO_MDS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let revocation_check_enabled = std::env::var("FIDO_MDS_REVOCATION_CHECK")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            root_certificate_path,
            statement_directory,
            endpoints,
            fetch_timeout,
            revocation_check_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_resolves_empty() {
        assert!(EndpointValue::Absent.resolve().is_empty());
    }

    #[test]
    fn test_single_resolves_to_one_element_list() {
        let value = EndpointValue::Single("https://mds.example.com".to_string());
        assert_eq!(value.resolve(), vec!["https://mds.example.com"]);
    }

    #[test]
    fn test_list_preserves_order_and_duplicates() {
        let value = EndpointValue::List(vec![
            "https://a.example.com".to_string(),
            "https://b.example.com".to_string(),
            "https://a.example.com".to_string(),
        ]);
        let resolved = value.resolve();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0], "https://a.example.com");
        assert_eq!(resolved[1], "https://b.example.com");
        assert_eq!(resolved[2], "https://a.example.com");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let value = EndpointValue::List(vec![
            "https://a.example.com".to_string(),
            "https://b.example.com".to_string(),
        ]);
        assert_eq!(value.resolve(), value.resolve());
    }

    #[test]
    fn test_default_config() {
        let config = MetadataConfig::default();
        assert!(config.root_certificate_path.is_empty());
        assert_eq!(config.endpoints, EndpointValue::Absent);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert!(!config.revocation_check_enabled);
    }
}

//! Fidem Core - FIDO2 metadata trust pipeline
//!
//! This crate builds, at startup, a composite source of trust for
//! validating authenticator attestation certificate chains. Remote
//! metadata BLOBs are fetched over HTTPS and verified against a pinned
//! root certificate, local metadata-statement files supplement them, and
//! the aggregated trust anchors back a certificate-path validator that
//! answers one question: does a known anchor vouch for this chain?
//!
//! # Design
//!
//! - Per-endpoint failures are isolated: one unreachable metadata
//!   service never blocks the others.
//! - Only a missing or unparsable root certificate is fatal; a run in
//!   which every endpoint fails ends quietly without publishing a
//!   validator, to be retried on a later trigger.
//! - The validator only accepts partial chains that terminate at a known
//!   anchor; chains carrying their own self-signed root are rejected.
//!
//! # Example
//!
//! ```no_run
//! use fidem_core::{AuthenticatorIdentifier, MetadataService};
//!
//! # async fn example() -> fidem_core::Result<()> {
//! let service = MetadataService::from_env();
//! service.initialize().await?;
//!
//! if let Some(validator) = service.validator() {
//!     let aaguid = "2fc0579f-8113-47ea-b116-bb5a8db9202a".parse().unwrap();
//!     let chain: Vec<Vec<u8>> = vec![/* leaf-first DER chain */];
//!     let path = validator.validate(&AuthenticatorIdentifier::Aaguid(aaguid), &chain)?;
//!     println!("anchored at {}", path.anchor_subject);
//! }
//! # Ok(())
//! # }
//! ```

pub mod anchor;
pub mod cert;
pub mod config;
pub mod error;
pub mod mds;
pub mod service;
pub mod statements;
pub mod validator;

// Re-export main types for convenience
pub use anchor::{
    AuthenticatorIdentifier, BlobAnchorRepository, StatementAnchorRepository, TrustAnchor,
    TrustAnchorRepository,
};
pub use cert::RootCertificate;
pub use config::{EndpointValue, MetadataConfig};
pub use error::{FidemError, Result};
pub use mds::{MdsBlobProvider, MetadataBlob};
pub use service::MetadataService;
pub use statements::LocalStatements;
pub use validator::{CertPathValidator, TrustPath};

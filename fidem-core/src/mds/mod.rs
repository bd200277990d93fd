//! Remote FIDO Metadata Service (MDS) integration
//!
//! A metadata BLOB is a signed catalog of known authenticator models and
//! their attestation trust anchors, published as a compact JWS. This module
//! fetches BLOBs from configured endpoints, verifies their signing chain
//! against a pinned root certificate, and exposes the trust anchors they
//! carry.
//!
//! - `blob`: payload data model (the subset trust-anchor extraction needs)
//! - `jws`: compact-JWS parsing and signing-chain verification
//! - `provider`: one remote provider per configured endpoint

pub mod blob;
pub mod jws;
pub mod provider;

pub use blob::{AuthenticatorStatus, BlobEntry, MetadataBlob, MetadataStatement, StatusReport};
pub use provider::MdsBlobProvider;

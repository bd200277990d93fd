use thiserror::Error;

#[derive(Error, Debug)]
pub enum FidemError {
    #[error("Certificate source error: {0}")]
    CertificateSource(String),

    #[error("Certificate format error: {0}")]
    CertificateFormat(String),

    #[error("Cannot construct BLOB provider: {0}")]
    ProviderConstruction(String),

    #[error("BLOB fetch error: {0}")]
    BlobFetch(String),

    #[error("BLOB verification failed: {0}")]
    BlobVerification(String),

    #[error("BLOB parse error: {0}")]
    BlobParse(String),

    #[error("Metadata statement parse error: {0}")]
    StatementParse(String),

    #[error("Untrusted attestation: {0}")]
    UntrustedAttestation(String),

    #[error("Attestation chain terminates at its own self-signed root, which is prohibited")]
    FullChainProhibited,

    #[error("Invalid attestation chain: {0}")]
    InvalidChain(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FidemError>;

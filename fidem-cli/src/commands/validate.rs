//! Validate command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use fidem_core::{AuthenticatorIdentifier, MetadataConfig, MetadataService};
use tracing::{debug, info};
use uuid::Uuid;

/// Execute the validate command.
pub async fn execute(
    chain_path: PathBuf,
    aaguid: Option<Uuid>,
    key_id: Option<String>,
    config: MetadataConfig,
) -> Result<()> {
    let identifier = match (aaguid, key_id) {
        (Some(aaguid), _) => AuthenticatorIdentifier::Aaguid(aaguid),
        (None, Some(key_id)) => {
            hex::decode(&key_id).context("--key-id must be a hex string")?;
            AuthenticatorIdentifier::key_id(key_id)
        }
        (None, None) => bail!("either --aaguid or --key-id is required"),
    };

    let chain = read_pem_chain(&chain_path)?;
    info!(
        path = %chain_path.display(),
        certificates = chain.len(),
        "Read attestation chain"
    );

    let service = MetadataService::new(config);
    service
        .initialize()
        .await
        .context("Trust initialization failed")?;

    let Some(validator) = service.validator() else {
        bail!("attestation trust-chain validation unavailable (no trust source succeeded)");
    };

    debug!(identifier = %identifier, "Validating attestation chain");
    match validator.validate(&identifier, &chain) {
        Ok(path) => {
            println!();
            println!("{}", "╔════════════════════════════════════════╗".green());
            println!(
                "{}",
                "║               TRUSTED                  ║".green().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".green());
            println!();
            println!("   {} {}", "Authenticator:".dimmed(), identifier);
            println!(
                "   {} {} certificate(s)",
                "Chain:".dimmed(),
                path.chain_len
            );
            println!("   {} {}", "Anchor:".dimmed(), path.anchor_subject.green());
            Ok(())
        }
        Err(err) => {
            println!();
            println!("{}", "╔════════════════════════════════════════╗".red());
            println!(
                "{}",
                "║              UNTRUSTED                 ║".red().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".red());
            println!();
            println!("   {} {}", "Authenticator:".dimmed(), identifier);
            println!("   {} {}", "Reason:".dimmed(), err.to_string().red());
            Err(err.into())
        }
    }
}

/// Read a leaf-first certificate chain from a PEM file.
fn read_pem_chain(path: &PathBuf) -> Result<Vec<Vec<u8>>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read chain file: {}", path.display()))?;

    let blocks = pem::parse_many(&bytes)
        .with_context(|| format!("Failed to parse PEM in {}", path.display()))?;

    let chain: Vec<Vec<u8>> = blocks
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(pem::Pem::into_contents)
        .collect();

    if chain.is_empty() {
        bail!("no CERTIFICATE blocks found in {}", path.display());
    }
    Ok(chain)
}

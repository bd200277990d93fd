//! Status command implementation.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use fidem_core::{MetadataConfig, MetadataService, TrustAnchorRepository};
use tracing::info;

/// Execute the status command: run the initialization pipeline once and
/// report what each configured trust source contributed.
pub async fn execute(config: MetadataConfig) -> Result<()> {
    let service = MetadataService::new(config);

    service
        .initialize()
        .await
        .context("Trust initialization failed")?;

    let endpoints = service.resolved_endpoints();

    println!();
    println!("{}", "Metadata trust sources".bold());
    println!();

    match service.validator() {
        Some(validator) => {
            report_sources(&endpoints, validator.repository());
            println!();
            println!(
                "  {} {}",
                "Validator:".dimmed(),
                "published (full self-signed chains prohibited)".green()
            );
            info!("Trust validator is available");
            Ok(())
        }
        None => {
            for url in &endpoints {
                println!("  {} {}", "FAILED".red().bold(), url);
            }
            if endpoints.is_empty() {
                println!("  {}", "no metadata endpoints configured".dimmed());
            }
            println!();
            println!(
                "  {} {}",
                "Validator:".dimmed(),
                "not published".yellow().bold()
            );
            bail!("attestation trust-chain validation unavailable")
        }
    }
}

fn report_sources(endpoints: &[String], repository: &TrustAnchorRepository) {
    let (providers, statements) = match repository {
        TrustAnchorRepository::Blob(blob) => (Some(blob.providers()), None),
        TrustAnchorRepository::Statements(statements) => (None, Some(statements.statements())),
        TrustAnchorRepository::Aggregate { blob, statements } => {
            (Some(blob.providers()), Some(statements.statements()))
        }
    };

    let providers = providers.unwrap_or(&[]);
    for url in endpoints {
        match providers.iter().find(|p| p.url() == url) {
            Some(provider) => {
                let detail = match provider.blob_no() {
                    Some(no) => format!("BLOB #{no}, {} entries", provider.entry_count()),
                    None => "refreshed".to_string(),
                };
                println!("  {} {} ({})", "OK".green().bold(), url, detail.dimmed());
            }
            None => println!("  {} {}", "FAILED".red().bold(), url),
        }
    }

    match statements {
        Some(statements) => println!(
            "  {} local statements ({} loaded)",
            "OK".green().bold(),
            statements.len()
        ),
        None => println!("  {}", "no local metadata statements".dimmed()),
    }
}

//! Fidem CLI - FIDO2 metadata trust inspection tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod exit_codes;

#[derive(Parser)]
#[command(name = "fidem")]
#[command(author, version, about = "FIDO2 metadata trust sources and attestation chain validation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trust initialization pipeline and report per-source health
    Status {
        /// Path to the MDS root certificate (default: FIDO_MDS_ROOT_CERTIFICATE)
        #[arg(long)]
        root: Option<String>,

        /// Metadata endpoint URL(s), comma-separated (default: FIDO_MDS_ENDPOINTS)
        #[arg(long)]
        endpoints: Option<String>,

        /// Local metadata-statement directory (default: FIDO_METADATA_STATEMENTS)
        #[arg(long)]
        statements: Option<String>,
    },

    /// Validate an attestation certificate chain against the trust sources
    Validate {
        /// PEM file containing the attestation chain, leaf first
        #[arg(value_name = "CHAIN")]
        chain: PathBuf,

        /// Authenticator AAGUID (FIDO2)
        #[arg(long, conflicts_with = "key_id")]
        aaguid: Option<uuid::Uuid>,

        /// Attestation certificate key identifier, hex (U2F)
        #[arg(long)]
        key_id: Option<String>,

        /// Path to the MDS root certificate (default: FIDO_MDS_ROOT_CERTIFICATE)
        #[arg(long)]
        root: Option<String>,

        /// Metadata endpoint URL(s), comma-separated (default: FIDO_MDS_ENDPOINTS)
        #[arg(long)]
        endpoints: Option<String>,

        /// Local metadata-statement directory (default: FIDO_METADATA_STATEMENTS)
        #[arg(long)]
        statements: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Status {
            root,
            endpoints,
            statements,
        } => commands::status::execute(commands::build_config(root, endpoints, statements)).await,
        Commands::Validate {
            chain,
            aaguid,
            key_id,
            root,
            endpoints,
            statements,
        } => {
            commands::validate::execute(
                chain,
                aaguid,
                key_id,
                commands::build_config(root, endpoints, statements),
            )
            .await
        }
    };

    if let Err(err) = result {
        let exit = exit_codes::ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}

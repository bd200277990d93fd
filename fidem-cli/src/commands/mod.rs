//! CLI command implementations.

pub mod status;
pub mod validate;

use fidem_core::{EndpointValue, MetadataConfig};

/// Assemble the pipeline configuration: environment first, CLI flags win.
pub fn build_config(
    root: Option<String>,
    endpoints: Option<String>,
    statements: Option<String>,
) -> MetadataConfig {
    let mut config = MetadataConfig::from_env();

    if let Some(root) = root {
        config.root_certificate_path = root;
    }
    if let Some(dir) = statements {
        config.statement_directory = dir;
    }
    if let Some(endpoints) = endpoints {
        config.endpoints = if endpoints.contains(',') {
            EndpointValue::List(
                endpoints
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            )
        } else {
            EndpointValue::Single(endpoints)
        };
    }

    config
}

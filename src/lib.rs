pub mod cli;
pub mod commands;
pub mod sample;

use std::sync::Arc;

use anyhow::Result;

use keyareas_client::RestBackend;
use keyareas_core::{dates, AppConfig, Services};

pub use keyareas_core as core;

/// Picks the backend for this invocation: sample data with `--offline`,
/// otherwise the REST API from the discovered configuration.
pub fn services_for(cli: &cli::Cli) -> Result<Services> {
    if cli.offline {
        tracing::debug!("using offline sample data");
        let backend = Arc::new(sample::sample_backend(dates::today()));
        return Ok(Services::from_backend(backend));
    }

    let config = AppConfig::discover(cli.api_url.clone())?;
    tracing::debug!(
        api_url = config.api_url(),
        config = ?config.config_path(),
        "using REST backend"
    );
    let backend = Arc::new(RestBackend::new(&config)?);
    Ok(Services::from_backend(backend))
}

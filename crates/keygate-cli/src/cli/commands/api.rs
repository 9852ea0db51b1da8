//! API command handlers.

use anyhow::{Context, Result};
use keygate_core::api::{ApiClient, ApiError};
use keygate_core::config::Config;

pub async fn get(config: &Config, path: &str) -> Result<()> {
    let base_url = config
        .api
        .effective_base_url()
        .context("api.base_url is not set (run 'keygate config init' and edit the config)")?;
    let store = super::auth::session_store(config)?;

    let client = ApiClient::new(base_url, store);

    match client.get(path).await {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        // Field messages are the useful part of a validation failure.
        Err(ApiError::Validation(messages)) => {
            eprintln!("Request rejected:");
            for message in &messages {
                eprintln!("  - {message}");
            }
            anyhow::bail!("validation failed");
        }
        Err(e) => Err(e.into()),
    }
}

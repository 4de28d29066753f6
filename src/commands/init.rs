use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its subdirectories and a starter `config.json`.
///
/// # Errors
/// - Returns an error if any file operations fail, or if `home` already holds a config file.
pub async fn init(home: &Path) -> Result<Out<()>> {
    let config = Config::create(home)
        .await
        .context("Unable to create the home directory and config")?;
    Ok(format!(
        "Created {}, edit it to list your iiko servers",
        config.config_path().display()
    )
    .into())
}

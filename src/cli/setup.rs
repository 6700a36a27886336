use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;

const HEADER: &str = "# Configuration file for moneta\n\
# Every key is optional; missing keys fall back to the values below.\n";

fn default_config() -> Result<String> {
    Ok(format!("{HEADER}{}", AppConfig::default().to_yaml()?))
}

/// Creates a default configuration file at the default location
pub fn setup() -> Result<()> {
    let path = AppConfig::default_config_path()?;
    setup_at_path(path)
}

/// Creates a default configuration file at the specified path
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, default_config()?)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

//! Init command implementation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use trueplay_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_CONFIG_YAML};

/// Write a starter trueplay.yml into `path`
pub fn init_project(path: Option<&Path>) -> Result<()> {
    let root = path.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(root).with_context(|| format!("Failed to create {:?}", root))?;

    let config_path = root.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        println!("{} already exists at {:?}", DEFAULT_CONFIG_FILE, config_path);
        return Ok(());
    }

    fs::write(&config_path, DEFAULT_CONFIG_YAML).with_context(|| format!("Failed to write {:?}", config_path))?;
    println!("✓ Created {:?}", config_path);
    println!("  - Set TRUEPLAY_SECRET_KEY to sign with your own account");
    println!("  - Try `trueplay run --template attestation-basic`");
    Ok(())
}

//! YAML config file loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pdufa_core::RunConfig;

/// Read, parse and validate the config at `path`.
pub fn load(path: &Path) -> Result<RunConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = parse(&text).with_context(|| format!("parsing config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(config)
}

pub fn parse(text: &str) -> Result<RunConfig> {
    Ok(serde_yaml::from_str(text)?)
}

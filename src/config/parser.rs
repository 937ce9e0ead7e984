//! YAML document parsing.
//!
//! Documents are parsed into a [`serde_yaml::Value`] tree and have their merge
//! keys (`<<: *anchor`) applied, so feature tables only ever see plain mappings.
//!
//! ```rust,no_run
//! use featgroup::config::load_document;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let doc = load_document(Path::new("features.yaml"))?;
//! println!("{} top-level keys", doc.as_mapping().map_or(0, |m| m.len()));
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

use crate::core::FeatureError;

/// Parse YAML text into a tree, applying merge keys.
pub fn parse_document(text: &str) -> crate::core::Result<Value> {
    let mut doc: Value = serde_yaml::from_str(text).map_err(FeatureError::Yaml)?;
    doc.apply_merge().map_err(FeatureError::Yaml)?;
    Ok(doc)
}

/// Read and parse a YAML file.
///
/// Errors carry the file path as context.
pub fn load_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let doc = parse_document(&text)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    debug!("Loaded configuration from {}", path.display());
    Ok(doc)
}

//! Arguments and helpers shared by the commands.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use crate::capability::{Registry, register_builtins};
use crate::config::{default_descriptors, load_document, select};
use crate::group::{Descriptor, FeatureTable};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
}

/// Where and how to load a feature table.
#[derive(Args, Debug, Clone)]
pub struct TableArgs {
    /// YAML configuration file
    pub file: PathBuf,

    /// Dotted path of the node holding the keys (default: document root)
    ///
    /// ```bash
    /// featgroup check features.yaml --key upstream.proxy
    /// ```
    #[arg(short, long, default_value = "")]
    pub key: String,

    /// Load keys positionally from a list instead of by name
    #[arg(long)]
    pub tuple: bool,

    /// Key to load, as `name[:required][:multi]`
    ///
    /// May be repeated. Without any, every key of the node is loaded as
    /// optional.
    #[arg(short = 'd', long = "descriptor", value_name = "DESCRIPTOR")]
    pub descriptors: Vec<Descriptor>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl TableArgs {
    /// Load the table described by these arguments using the builtin capabilities.
    pub fn load(&self) -> Result<FeatureTable> {
        let registry = builtin_registry()?;
        let doc = load_document(&self.file)?;
        let node = select(&doc, &self.key)?;

        let descriptors = if self.descriptors.is_empty() {
            if self.tuple {
                anyhow::bail!("--tuple requires at least one --descriptor");
            }
            default_descriptors(node)
        } else {
            self.descriptors.clone()
        };
        debug!(
            "Loading {} key(s) from {}",
            descriptors.len(),
            if self.key.is_empty() { "document root" } else { self.key.as_str() }
        );

        let table = if self.tuple {
            FeatureTable::load_as_tuple(registry, node, &descriptors)
        } else {
            FeatureTable::load(registry, node, &descriptors)
        };
        table.with_context(|| format!("Failed to load feature table from {}", self.file.display()))
    }
}

/// The global registry, with the builtins registered on first use.
pub fn builtin_registry() -> Result<&'static Registry> {
    let registry = Registry::global();
    if registry.is_empty() {
        register_builtins(registry)?;
    }
    Ok(registry)
}

/// Parse a `name=value` pair.
pub fn parse_key_value(text: &str) -> std::result::Result<(String, String), String> {
    text.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{text}'"))
}

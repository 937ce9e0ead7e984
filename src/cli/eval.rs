//! Load a feature table and resolve keys for one request.
//!
//! The request is built from the command line: `--var` sets request variables
//! and `--remote-addr` the peer address.
//!
//! ```bash
//! featgroup eval features.yaml --key upstream.proxy --var host=example.com --name url
//! featgroup eval features.yaml --remote-addr 192.0.2.1 --format json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;
use std::net::IpAddr;

use super::common::{OutputFormat, TableArgs, parse_key_value};
use crate::context::RequestContext;
use crate::feature::Feature;
use crate::group::FeatureTable;

/// Command to evaluate a feature table.
#[derive(Args, Debug)]
pub struct EvalCommand {
    #[command(flatten)]
    table: TableArgs,

    /// Request variable, as `NAME=VALUE` (may be repeated)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,

    /// Remote address of the request
    #[arg(long)]
    remote_addr: Option<IpAddr>,

    /// Key to resolve (may be repeated; default: every key in evaluation order)
    #[arg(short, long = "name", value_name = "KEY")]
    names: Vec<String>,
}

impl EvalCommand {
    pub fn execute(self) -> Result<()> {
        let table = self.table.load()?;
        let mut ctx = self.request_context();
        let values = self.resolve(&table, &mut ctx)?;

        match self.table.format {
            OutputFormat::Text => {
                for (name, value) in &values {
                    println!("{} = {}", name.cyan(), render_value(value));
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = values
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), serde_json::to_value(value)?)))
                    .collect::<Result<_, serde_json::Error>>()?;
                println!("{}", serde_json::to_string_pretty(&json!(map))?);
            }
        }
        Ok(())
    }

    fn request_context(&self) -> RequestContext {
        let mut ctx = RequestContext::new();
        for (name, value) in &self.vars {
            ctx.set_var(name.as_str(), value.as_str());
        }
        if let Some(addr) = self.remote_addr {
            ctx.set_remote_addr(addr);
        }
        ctx
    }

    fn resolve(
        &self,
        table: &FeatureTable,
        ctx: &mut RequestContext,
    ) -> Result<Vec<(String, Feature)>> {
        if self.names.is_empty() {
            return Ok(table.resolve_all(ctx)?);
        }
        self.names
            .iter()
            .map(|name| Ok((name.clone(), table.resolve_name(ctx, name)?)))
            .collect()
    }
}

fn render_value(value: &Feature) -> String {
    match value {
        Feature::Nil => "(nil)".dimmed().to_string(),
        Feature::Tuple(items) => {
            format!("[{}]", items.iter().map(render_value).collect::<Vec<_>>().join(", "))
        }
        Feature::String(text) => format!("{:?}", text.as_str()),
        other => other.to_string(),
    }
}

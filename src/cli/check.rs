//! Load a feature table and report its structure.
//!
//! ```bash
//! featgroup check features.yaml --key upstream.proxy -d url:required
//! featgroup check features.yaml --format json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use super::common::{OutputFormat, TableArgs};
use crate::group::{FeatureTable, KeyExpr};

/// Command to validate a configuration node and print its evaluation order.
#[derive(Args, Debug)]
pub struct CheckCommand {
    #[command(flatten)]
    table: TableArgs,
}

impl CheckCommand {
    pub fn execute(self) -> Result<()> {
        let table = self.table.load()?;
        match self.table.format {
            OutputFormat::Text => print!("{}", render_text(&table)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&render_json(&table))?),
        }
        Ok(())
    }
}

fn dependency_names(table: &FeatureTable, index: crate::group::KeyIndex) -> Vec<&str> {
    table.dependencies(index).iter().filter_map(|&dep| table.key(dep)).map(|key| key.name()).collect()
}

fn shape(expr: &KeyExpr) -> &'static str {
    match expr {
        KeyExpr::Nil => "absent",
        KeyExpr::Single(_) => "single",
        KeyExpr::Multi(_) => "multi",
    }
}

fn render_text(table: &FeatureTable) -> String {
    let mut out = format!("{} ({} keys)\n", "Evaluation order".bold(), table.len());
    for index in table.order() {
        let Some(key) = table.key(index) else { continue };
        let deps = dependency_names(table, index);
        out.push_str(&format!(
            "  {:>3}. {} {}",
            index.get() + 1,
            key.name().cyan(),
            format!("[{}]", key.result_type()).dimmed()
        ));
        if matches!(key.expr(), KeyExpr::Nil) {
            out.push_str(&format!(" {}", "(absent)".yellow()));
        }
        if !deps.is_empty() {
            out.push_str(&format!(" <- {}", deps.join(", ")));
        }
        out.push('\n');
    }
    out
}

fn render_json(table: &FeatureTable) -> serde_json::Value {
    let keys: Vec<_> = table
        .order()
        .filter_map(|index| table.key(index).map(|key| (index, key)))
        .map(|(index, key)| {
            json!({
                "name": key.name(),
                "index": index.get(),
                "type": key.result_type(),
                "shape": shape(key.expr()),
                "per_request": key.reads_request(),
                "dependencies": dependency_names(table, index),
            })
        })
        .collect();
    json!({ "keys": keys })
}

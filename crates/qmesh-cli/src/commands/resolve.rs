//! Resolve command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;
use serde_json::json;

use qmesh_ir::{ResolvePolicy, resolve_with};

use super::common::load_batch;

/// Execute the resolve command.
pub fn execute(input: &Path, strict: bool, format: &str) -> Result<()> {
    let batch = load_batch(input)?;
    let policy = if strict {
        ResolvePolicy::Strict
    } else {
        ResolvePolicy::Lenient
    };
    let resolution = resolve_with(&batch, policy)?;

    match format {
        "json" => {
            let report = json!({
                "circuits": batch.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
                "distributed": resolution.is_distributed(),
                "edges": resolution.edges(),
                "dangling_sends": resolution.dangling_sends(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "table" => {
            println!(
                "{} Resolved {} circuits from {}",
                style("→").cyan().bold(),
                batch.len(),
                style(input.display()).green()
            );
            if resolution.edges().is_empty() {
                println!("  No relays: the batch runs as independent circuits.");
            }
            for edge in resolution.edges() {
                println!(
                    "  {} {} {} ({})",
                    style(&edge.source).bold(),
                    style("→").dim(),
                    style(&edge.sink).bold(),
                    style(edge.kind).yellow()
                );
            }
            for send in resolution.dangling_sends() {
                println!(
                    "  {} '{}' instruction {} ({}) sends to '{}', which nothing in the batch receives",
                    style("!").yellow().bold(),
                    send.circuit,
                    send.position,
                    send.gate,
                    send.peer
                );
            }
        }
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }

    Ok(())
}

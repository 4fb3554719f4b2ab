//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use qmesh_hal::{ClientConfig, EndpointDirectory, RunResult};
use qmesh_ir::CircuitSnapshot;

/// Load client settings, falling back to defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(ClientConfig::default()),
    }
}

/// Load a batch of circuit snapshots from a JSON file.
///
/// The file holds either one snapshot object or an array of them. Every
/// snapshot is revalidated against the catalog and its flags recomputed.
pub fn load_batch(path: &Path) -> Result<Vec<CircuitSnapshot>> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_batch(&source).with_context(|| format!("Invalid batch: {}", path.display()))
}

/// Parse a batch document.
pub fn parse_batch(source: &str) -> Result<Vec<CircuitSnapshot>> {
    let document: Value = serde_json::from_str(source)?;
    let snapshots: Vec<CircuitSnapshot> = if document.is_array() {
        serde_json::from_value(document)?
    } else {
        vec![serde_json::from_value(document)?]
    };
    if snapshots.is_empty() {
        anyhow::bail!("batch contains no circuits");
    }
    snapshots
        .iter()
        .map(|snapshot| {
            snapshot
                .normalized()
                .with_context(|| format!("circuit '{}'", snapshot.id))
        })
        .collect()
}

/// Pick the directory file: explicit flag first, then the config.
pub fn directory_path(flag: Option<&Path>, config: &ClientConfig) -> Result<PathBuf> {
    flag.map(Path::to_path_buf)
        .or_else(|| config.directory.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No endpoint directory given. Pass --directory or set it in the config")
        })
}

/// Load the endpoint directory.
pub fn load_directory(path: &Path) -> Result<EndpointDirectory> {
    EndpointDirectory::from_file(path)
        .with_context(|| format!("Failed to load directory: {}", path.display()))
}

/// Print one circuit's counts as a bar table.
pub fn print_results(result: &RunResult) {
    println!(
        "\n{} {} on {} ({} shots):",
        style("✓").green().bold(),
        style(&result.circuit_id).bold(),
        style(&result.endpoint).yellow(),
        result.shots()
    );

    let sorted = result.counts.sorted();
    let total = result.shots() as f64;

    for (bitstring, count) in sorted.iter().take(16) {
        let prob = *count as f64 / total * 100.0;
        let bar_len = (prob / 2.0).round() as usize;
        let bar: String = "█".repeat(bar_len);
        let label = if bitstring.is_empty() { "-" } else { *bitstring };

        println!(
            "  {}: {:>6} ({:>5.2}%) {}",
            style(label).cyan(),
            count,
            prob,
            style(bar).green()
        );
    }

    if sorted.len() > 16 {
        println!("  ... and {} more outcomes", sorted.len() - 16);
    }
    println!(
        "  Execution time: {} s",
        style(format!("{:.3}", result.time_taken)).yellow()
    );
}

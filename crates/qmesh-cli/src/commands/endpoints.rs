//! Endpoints command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;

use qmesh_hal::EndpointRecord;

use super::common::{directory_path, load_config, load_directory};

/// Execute the endpoints command.
pub fn execute(config: Option<&Path>, directory: Option<&Path>, group: Option<&str>) -> Result<()> {
    let config = load_config(config)?;
    let path = directory_path(directory, &config)?;
    let directory = load_directory(&path)?;

    let entries: Vec<(&str, &EndpointRecord)> = match group {
        Some(group) => directory.in_group(group).collect(),
        None => directory.iter().collect(),
    };

    println!(
        "{} {} endpoints in {}\n",
        style("qmesh").cyan().bold(),
        entries.len(),
        style(path.display()).green()
    );

    for (id, record) in entries {
        println!(
            "  {} {} {}",
            style("●").green(),
            style(id).bold(),
            record.address
        );
        println!(
            "    Backend: {} v{} ({} qubits{})",
            record.backend.name,
            record.backend.version,
            record.backend.n_qubits,
            if record.backend.simulator {
                ", simulator"
            } else {
                ""
            }
        );
        if let Some(group) = &record.group {
            println!("    Group:   {group}");
        }
    }

    Ok(())
}

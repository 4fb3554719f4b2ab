//! Run command implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use qmesh_adapter_sim::LocalCluster;
use qmesh_hal::{Endpoint, ExecMethod, gather, submit_batch};

use super::common::{directory_path, load_batch, load_config, load_directory, print_results};

/// Where the batch runs.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Units from an endpoint directory, optionally restricted to a group.
    Directory {
        /// Directory file, overriding the config.
        path: Option<&'a Path>,
        /// Grouping label filter.
        group: Option<&'a str>,
    },
    /// An in-process cluster.
    Local,
}

/// Options of the run command.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions<'a> {
    /// Batch file.
    pub input: &'a Path,
    /// Client config file.
    pub config: Option<&'a Path>,
    /// Execution target.
    pub target: Target<'a>,
    /// Shots, overriding the config.
    pub shots: Option<u32>,
    /// Seed, overriding the config.
    pub seed: Option<u64>,
    /// Simulation method, overriding the config.
    pub method: Option<ExecMethod>,
    /// Output format.
    pub format: &'a str,
}

/// Execute the run command.
pub async fn execute(options: RunOptions<'_>) -> Result<()> {
    if !matches!(options.format, "table" | "json") {
        anyhow::bail!("Unknown format: '{}'. Available: table, json", options.format);
    }
    let config = load_config(options.config)?;
    let mut run_config = config.run.clone();
    if let Some(shots) = options.shots {
        run_config.shots = shots;
    }
    if let Some(seed) = options.seed {
        run_config.seed = Some(seed);
    }
    if let Some(method) = options.method {
        run_config.method = method;
    }
    run_config.validate()?;

    let batch = load_batch(options.input)?;
    if options.format == "table" {
        println!(
            "{} Running {} circuits from {} ({} shots)",
            style("→").cyan().bold(),
            batch.len(),
            style(options.input.display()).green(),
            run_config.shots
        );
    }

    let endpoints: Vec<Arc<Endpoint>> = match options.target {
        Target::Local => LocalCluster::new(batch.len()).endpoints().to_vec(),
        Target::Directory { path, group } => {
            let path = directory_path(path, &config)?;
            let directory = load_directory(&path)?;
            let endpoints: Vec<Arc<Endpoint>> = match group {
                Some(group) => directory
                    .in_group(group)
                    .map(|(id, record)| Arc::new(Endpoint::http(id, record, &config)))
                    .collect(),
                None => Endpoint::all_from_directory(&directory, &config),
            };
            if endpoints.len() < batch.len() {
                anyhow::bail!(
                    "{} circuits but only {} endpoints available; one endpoint runs one circuit",
                    batch.len(),
                    endpoints.len()
                );
            }
            endpoints.into_iter().take(batch.len()).collect()
        }
    };
    info!(
        endpoints = ?endpoints.iter().map(|e| e.id()).collect::<Vec<_>>(),
        "Binding batch"
    );

    let mut submitted = submit_batch(&batch, &endpoints, &run_config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Waiting for {} jobs ({} relay edges)",
        submitted.jobs.len(),
        submitted.resolution.edges().len()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let results = gather(&mut submitted.jobs).await;
    spinner.finish_and_clear();
    let results = results?;

    match options.format {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => results.iter().for_each(print_results),
    }
    Ok(())
}

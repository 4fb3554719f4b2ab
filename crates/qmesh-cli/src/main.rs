//! qmesh Command-Line Interface
//!
//! Inspect endpoint directories, check the relay dependencies of a batch of
//! circuits, and run batches on remote units or an in-process cluster.
//!
//! ```text
//! qmesh endpoints --directory units.json
//! qmesh resolve --input batch.json
//! qmesh run --input batch.json --local --shots 1000
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use qmesh_hal::ExecMethod;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::run::{RunOptions, Target};
use commands::{endpoints, resolve, run, version};

/// qmesh - distributed quantum circuit batches over simulated QPUs
#[derive(Parser)]
#[command(name = "qmesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Client configuration file (YAML)
    #[arg(long, global = true, env = "QMESH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the units in an endpoint directory
    Endpoints {
        /// Endpoint directory file (JSON)
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Only list units with this grouping label
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Print the relay dependencies of a batch
    Resolve {
        /// Batch file (JSON snapshot or array of snapshots)
        #[arg(short, long)]
        input: PathBuf,

        /// Treat sends that nothing receives as errors
        #[arg(long)]
        strict: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Submit a batch and print every circuit's counts
    Run {
        /// Batch file (JSON snapshot or array of snapshots)
        #[arg(short, long)]
        input: PathBuf,

        /// Endpoint directory file (JSON)
        #[arg(short, long, conflicts_with = "local")]
        directory: Option<PathBuf>,

        /// Only use units with this grouping label
        #[arg(short, long, conflicts_with = "local")]
        group: Option<String>,

        /// Run on an in-process cluster, one unit per circuit
        #[arg(long)]
        local: bool,

        /// Number of shots
        #[arg(short, long)]
        shots: Option<u32>,

        /// Simulator seed
        #[arg(long)]
        seed: Option<u64>,

        /// Simulation method (automatic, statevector, density_matrix, matrix_product_state)
        #[arg(short, long, value_parser = parse_method)]
        method: Option<ExecMethod>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show version information
    Version,
}

fn parse_method(value: &str) -> Result<ExecMethod, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown method '{value}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Endpoints { directory, group } => {
            endpoints::execute(config, directory.as_deref(), group.as_deref())
        }

        Commands::Resolve {
            input,
            strict,
            format,
        } => resolve::execute(&input, strict, &format),

        Commands::Run {
            input,
            directory,
            group,
            local,
            shots,
            seed,
            method,
            format,
        } => {
            let target = if local {
                Target::Local
            } else {
                Target::Directory {
                    path: directory.as_deref(),
                    group: group.as_deref(),
                }
            };
            run::execute(RunOptions {
                input: &input,
                config,
                target,
                shots,
                seed,
                method,
                format: &format,
            })
            .await
        }

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

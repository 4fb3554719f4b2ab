//! Submitting a whole execution batch.

use std::sync::Arc;

use qmesh_ir::{CircuitSnapshot, Resolution, resolve};
use tracing::info;

use crate::config::RunConfig;
use crate::endpoint::Endpoint;
use crate::error::{HalError, HalResult};
use crate::job::Job;
use crate::wire::ExecType;

/// Jobs created for a batch, in circuit order, with the batch's dependencies.
#[derive(Debug)]
pub struct SubmittedBatch {
    /// One job per circuit.
    pub jobs: Vec<Job>,
    /// Relay dependencies between the circuits.
    pub resolution: Resolution,
}

/// Resolve, bind and submit a batch.
///
/// `circuits[i]` runs on `endpoints[i]`. Dependency resolution and every
/// local check happen before anything is sent, so a rejected batch never
/// reaches the network. Batches with relays run as `dynamic`, others as
/// `offloading`.
pub fn submit_batch(
    circuits: &[CircuitSnapshot],
    endpoints: &[Arc<Endpoint>],
    config: &RunConfig,
) -> HalResult<SubmittedBatch> {
    if circuits.len() != endpoints.len() {
        return Err(HalError::Configuration(format!(
            "{} circuits but {} endpoints",
            circuits.len(),
            endpoints.len()
        )));
    }

    let resolution = resolve(circuits)?;
    let exec_type = if resolution.is_distributed() {
        ExecType::Dynamic
    } else {
        ExecType::Offloading
    };

    let mut jobs = circuits
        .iter()
        .zip(endpoints)
        .map(|(snapshot, endpoint)| {
            Job::with_exec_type(
                Arc::clone(endpoint),
                snapshot.clone(),
                config.clone(),
                exec_type,
            )
        })
        .collect::<HalResult<Vec<_>>>()?;

    for job in &mut jobs {
        job.submit()?;
    }
    info!(
        circuits = jobs.len(),
        edges = resolution.edges().len(),
        %exec_type,
        "Submitted batch"
    );

    Ok(SubmittedBatch { jobs, resolution })
}

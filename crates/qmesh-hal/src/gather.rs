//! Fan-in over many jobs.

use tracing::debug;

use crate::error::{HalError, HalResult};
use crate::job::Job;
use crate::result::RunResult;

/// Wait for every job, in the order given, and return their results in
/// that same order.
///
/// The first job whose result is a failure aborts the whole gather with that
/// failure; results already collected are dropped. An unsubmitted job counts
/// as a failure ([`HalError::NotSubmitted`]).
pub async fn gather<'a, I>(jobs: I) -> HalResult<Vec<RunResult>>
where
    I: IntoIterator<Item = &'a mut Job>,
{
    let mut results = Vec::new();
    for job in jobs {
        results.push(gather_one(job).await?);
    }
    debug!("Gathered {} results", results.len());
    Ok(results)
}

/// Wait for a single job.
pub async fn gather_one(job: &mut Job) -> HalResult<RunResult> {
    let id = job.id().to_string();
    match job.result().await? {
        Some(result) => Ok(result.clone()),
        None => Err(HalError::NotSubmitted(id)),
    }
}

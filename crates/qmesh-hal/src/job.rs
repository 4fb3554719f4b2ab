//! Job lifecycle.
//!
//! A job couples one frozen circuit and its run configuration to one
//! endpoint:
//!
//! ```text
//!   Configured ──submit()──→ Submitted ──result()──→ ResultReady
//!                               ↑   │
//!                               │   └──result()──→ Failed
//!                               │
//!                upgrade_parameters()  (from ResultReady)
//! ```
//!
//! The in-flight handle is the `JoinHandle` of a spawned task that performs
//! the single network exchange. Dropping a job abandons that task; the remote
//! computation is not cancelled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use qmesh_ir::{Circuit, CircuitSnapshot, IrError};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::endpoint::Endpoint;
use crate::error::{HalError, HalResult};
use crate::result::RunResult;
use crate::wire::{ExecType, Message, ParameterUpdate, WireRequest};

/// Coarse job state, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Built, not yet sent.
    Configured,
    /// A request is in flight.
    Submitted,
    /// The last request produced a result.
    ResultReady,
    /// The last request failed.
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Configured => write!(f, "Configured"),
            JobStatus::Submitted => write!(f, "Submitted"),
            JobStatus::ResultReady => write!(f, "ResultReady"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

enum JobState {
    Configured,
    Submitted(JoinHandle<HalResult<Value>>),
    ResultReady(RunResult),
    Failed(HalError),
}

/// One circuit bound to one endpoint.
pub struct Job {
    id: String,
    endpoint: Arc<Endpoint>,
    snapshot: CircuitSnapshot,
    config: RunConfig,
    exec_type: ExecType,
    state: JobState,
    stale: bool,
    submissions: u32,
    submitted_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("circuit", &self.snapshot.id)
            .field("endpoint", &self.endpoint.id())
            .field("status", &self.status())
            .field("stale", &self.stale)
            .field("submissions", &self.submissions)
            .finish()
    }
}

impl Job {
    /// Snapshot `circuit` and bind it to `endpoint`.
    pub fn new(endpoint: Arc<Endpoint>, circuit: &Circuit, config: RunConfig) -> HalResult<Self> {
        Self::from_snapshot(endpoint, circuit.snapshot(), config)
    }

    /// Bind an existing snapshot to `endpoint`.
    ///
    /// The snapshot is re-validated, its derived flags recomputed, and it is
    /// checked against the endpoint's backend description. `exec_type`
    /// follows the snapshot's own relays.
    pub fn from_snapshot(
        endpoint: Arc<Endpoint>,
        snapshot: CircuitSnapshot,
        config: RunConfig,
    ) -> HalResult<Self> {
        let exec_type = ExecType::for_snapshot(&snapshot);
        Self::with_exec_type(endpoint, snapshot, config, exec_type)
    }

    /// Bind a snapshot with an explicit execution mode.
    pub fn with_exec_type(
        endpoint: Arc<Endpoint>,
        snapshot: CircuitSnapshot,
        config: RunConfig,
        exec_type: ExecType,
    ) -> HalResult<Self> {
        let snapshot = snapshot.normalized()?;
        config.validate()?;
        endpoint.backend().check(&snapshot)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            endpoint,
            snapshot,
            config,
            exec_type,
            state: JobState::Configured,
            stale: false,
            submissions: 0,
            submitted_at: None,
        })
    }

    /// Send the circuit to the endpoint.
    ///
    /// Only the first call sends anything. Later calls log a warning and
    /// return without touching the in-flight handle; use
    /// [`Job::upgrade_parameters`] to run again.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&mut self) -> HalResult<()> {
        if !matches!(self.state, JobState::Configured) {
            warn!(
                job = %self.id,
                circuit = %self.snapshot.id,
                "Job already submitted; ignoring duplicate submit()"
            );
            return Ok(());
        }

        let request = WireRequest::new(&self.snapshot, &self.config, self.exec_type);
        let handle = self.spawn(Message::Run(request))?;
        self.state = JobState::Submitted(handle);
        self.submissions = 1;
        self.submitted_at = Some(Utc::now());
        info!(
            job = %self.id,
            circuit = %self.snapshot.id,
            endpoint = %self.endpoint.id(),
            exec_type = %self.exec_type,
            "Submitted job"
        );
        Ok(())
    }

    /// Wait for and return the result.
    ///
    /// Returns `Ok(None)` if the job was never submitted. Otherwise waits for
    /// the in-flight request, parses and memoizes the outcome; later calls
    /// return the memoized result or failure without waiting again.
    pub async fn result(&mut self) -> HalResult<Option<&RunResult>> {
        if let JobState::Submitted(handle) = &mut self.state {
            let joined = handle.await;
            let endpoint = self.endpoint.id();
            let outcome = joined
                .map_err(|e| HalError::transport(endpoint, format!("request task ended: {e}")))
                .and_then(|response| response)
                .and_then(|raw| RunResult::parse(raw, &self.snapshot, endpoint));

            self.state = match outcome {
                Ok(result) => {
                    debug!(job = %self.id, shots = result.shots(), "Result ready");
                    JobState::ResultReady(result)
                }
                Err(e) => {
                    warn!(job = %self.id, error = %e, "Job failed");
                    JobState::Failed(e)
                }
            };
            self.stale = false;
        }

        match &self.state {
            JobState::ResultReady(result) => Ok(Some(result)),
            JobState::Failed(e) => Err(e.clone()),
            JobState::Configured | JobState::Submitted(_) => Ok(None),
        }
    }

    /// Re-run the job with a new parameter vector.
    ///
    /// Waits for the current request first, so the old and new parameter
    /// sets never overlap on the endpoint. Only the parameter vector is sent.
    /// If the previous run failed, that failure is returned and nothing is
    /// sent.
    pub async fn upgrade_parameters(&mut self, values: Vec<f64>) -> HalResult<()> {
        if !self.snapshot.is_parametric {
            return Err(HalError::NotParametric(self.snapshot.id.clone()));
        }
        if matches!(self.state, JobState::Configured) {
            return Err(HalError::NotSubmitted(self.id.clone()));
        }
        let rebound = self
            .snapshot
            .with_parameters(&values)
            .map_err(|e| match e {
                IrError::ParameterMismatch { .. } => HalError::InvalidParameters(e.to_string()),
                other => HalError::Ir(other),
            })?;

        self.result().await?;

        let update = ParameterUpdate {
            id: self.snapshot.id.clone(),
            params: values,
        };
        let handle = self.spawn(Message::UpdateParameters(update))?;
        self.snapshot = rebound;
        self.state = JobState::Submitted(handle);
        self.stale = true;
        self.submissions += 1;
        self.submitted_at = Some(Utc::now());
        info!(
            job = %self.id,
            circuit = %self.snapshot.id,
            round = self.submissions,
            "Sent parameter update"
        );
        Ok(())
    }

    fn spawn(&self, message: Message) -> HalResult<JoinHandle<HalResult<Value>>> {
        let runtime = Handle::try_current().map_err(|_| {
            HalError::Configuration("jobs must be submitted from within a Tokio runtime".into())
        })?;
        let transport = self.endpoint.transport();
        Ok(runtime.spawn(async move { transport.send(message).await }))
    }

    /// Job identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifier of the circuit this job runs.
    pub fn circuit_id(&self) -> &str {
        &self.snapshot.id
    }

    /// The frozen circuit, with the current parameters.
    pub fn snapshot(&self) -> &CircuitSnapshot {
        &self.snapshot
    }

    /// The endpoint this job runs on.
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execution mode.
    pub fn exec_type(&self) -> ExecType {
        self.exec_type
    }

    /// Current state.
    pub fn status(&self) -> JobStatus {
        match self.state {
            JobState::Configured => JobStatus::Configured,
            JobState::Submitted(_) => JobStatus::Submitted,
            JobState::ResultReady(_) => JobStatus::ResultReady,
            JobState::Failed(_) => JobStatus::Failed,
        }
    }

    /// Whether a request is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, JobState::Submitted(_))
    }

    /// Whether parameters were re-sent and the new result not yet fetched.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// How many messages carrying work have been sent.
    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    /// When the last message was sent.
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }
}

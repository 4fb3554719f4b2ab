//! An in-process cluster of simulated execution units.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use qmesh_hal::{
    BackendDescription, Endpoint, EndpointDirectory, EndpointRecord, ExecType, HalResult,
    Message, ParameterUpdate, Transport, WireRequest, WireResponse,
};
use qmesh_ir::bind_parameters;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::error::{SimError, SimResult};
use crate::executor::{DEFAULT_MAX_QUBITS, Executor};

/// Grouping label given to every local unit.
pub const LOCAL_GROUP: &str = "local";

/// Tuning knobs for a [`LocalCluster`].
#[derive(Debug, Clone, Copy)]
pub struct ClusterOptions {
    /// Largest joint state, relay channels included.
    pub max_qubits: usize,
    /// How long a dynamic request waits for its peers.
    pub park_timeout: Duration,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            max_qubits: DEFAULT_MAX_QUBITS,
            park_timeout: Duration::from_secs(30),
        }
    }
}

/// A set of simulated execution units sharing one process.
///
/// Each unit is an [`Endpoint`] whose transport hands requests to the
/// cluster. Offloading requests run as soon as they arrive. Dynamic requests
/// are held until every circuit they relay with, directly or through other
/// circuits, has arrived too; the whole group then runs jointly.
pub struct LocalCluster {
    endpoints: Vec<Arc<Endpoint>>,
    inner: Arc<Inner>,
}

impl fmt::Debug for LocalCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCluster")
            .field("units", &self.endpoints.len())
            .field("max_qubits", &self.inner.executor.max_qubits())
            .finish()
    }
}

impl LocalCluster {
    /// Create a cluster of `units` units with default options.
    pub fn new(units: usize) -> Self {
        Self::with_options(units, ClusterOptions::default())
    }

    /// Create a cluster with explicit options.
    pub fn with_options(units: usize, options: ClusterOptions) -> Self {
        let inner = Arc::new(Inner {
            executor: Executor::new(options.max_qubits),
            park_timeout: options.park_timeout,
            state: Mutex::new(State::default()),
        });
        let n_qubits = u32::try_from(options.max_qubits).unwrap_or(u32::MAX);

        let endpoints = (0..units)
            .map(|i| {
                let id = format!("qpu-{i}");
                let transport = Arc::new(LocalTransport {
                    unit: id.clone(),
                    inner: Arc::clone(&inner),
                });
                Arc::new(
                    Endpoint::new(
                        id.clone(),
                        format!("local://{id}"),
                        BackendDescription::statevector(id, n_qubits),
                        transport,
                    )
                    .with_group(LOCAL_GROUP),
                )
            })
            .collect();

        Self { endpoints, inner }
    }

    /// All units, in index order.
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Unit `index`, if it exists.
    pub fn endpoint(&self, index: usize) -> Option<Arc<Endpoint>> {
        self.endpoints.get(index).cloned()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the cluster has no units.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// The units as a directory listing.
    pub fn directory(&self) -> EndpointDirectory {
        let mut directory = EndpointDirectory::default();
        for endpoint in &self.endpoints {
            directory.insert(
                endpoint.id(),
                EndpointRecord {
                    address: endpoint.address().to_string(),
                    backend: endpoint.backend().clone(),
                    group: Some(LOCAL_GROUP.to_string()),
                },
            );
        }
        directory
    }
}

struct Inner {
    executor: Executor,
    park_timeout: Duration,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Dynamic requests waiting for their peers, by circuit id.
    parked: BTreeMap<String, Parked>,
    /// Last request each unit ran, for parameter updates.
    last: FxHashMap<String, WireRequest>,
}

struct Parked {
    request: WireRequest,
    reply: oneshot::Sender<WireResponse>,
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transport from one endpoint into its cluster.
pub struct LocalTransport {
    unit: String,
    inner: Arc<Inner>,
}

impl fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTransport")
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    #[instrument(skip(self, message), fields(unit = %self.unit, circuit = %message.circuit_id()))]
    async fn send(&self, message: Message) -> HalResult<Value> {
        let outcome = match message {
            Message::Run(request) => self.run(request).await,
            Message::UpdateParameters(update) => self.update(update).await,
        };
        let response = outcome.unwrap_or_else(|e| {
            warn!("Request failed: {e}");
            WireResponse::error(e.to_string())
        });
        Ok(serde_json::to_value(response)?)
    }
}

impl LocalTransport {
    async fn run(&self, request: WireRequest) -> SimResult<WireResponse> {
        self.inner
            .lock()
            .last
            .insert(self.unit.clone(), request.clone());

        match request.exec_type {
            ExecType::Offloading => {
                if let Some(relay) = request.instructions.iter().find(|i| i.relay().is_some()) {
                    return Err(SimError::InvalidRequest(format!(
                        "'{}' needs dynamic execution for '{}'",
                        request.id, relay.name
                    )));
                }
                let mut responses = execute(self.inner.executor, vec![request]).await;
                responses
                    .pop()
                    .ok_or_else(|| SimError::InvalidRequest("empty run".into()))
            }
            ExecType::Dynamic => self.park(request).await,
        }
    }

    async fn update(&self, update: ParameterUpdate) -> SimResult<WireResponse> {
        let mut request = self
            .inner
            .lock()
            .last
            .get(&self.unit)
            .filter(|r| r.id == update.id)
            .cloned()
            .ok_or_else(|| {
                SimError::Parameters(format!("no circuit '{}' loaded on {}", update.id, self.unit))
            })?;

        bind_parameters(&request.id, &mut request.instructions, &update.params)
            .map_err(|e| SimError::Parameters(e.to_string()))?;
        debug!(params = update.params.len(), "Rebound parameters");
        self.run(request).await
    }

    async fn park(&self, request: WireRequest) -> SimResult<WireResponse> {
        let id = request.id.clone();
        let (tx, rx) = oneshot::channel();

        let ready = {
            let mut state = self.inner.lock();
            state.parked.insert(
                id.clone(),
                Parked {
                    request,
                    reply: tx,
                },
            );
            let (group, missing) = closure(&state.parked, &id);
            if missing.is_empty() {
                Some(
                    group
                        .iter()
                        .filter_map(|member| state.parked.remove(member))
                        .collect::<Vec<_>>(),
                )
            } else {
                debug!(missing = ?missing, "Parked");
                None
            }
        };

        if let Some(group) = ready {
            let (requests, replies): (Vec<_>, Vec<_>) =
                group.into_iter().map(|p| (p.request, p.reply)).unzip();
            let responses = execute(self.inner.executor, requests).await;
            for (reply, response) in replies.into_iter().zip(responses) {
                // The receiving job may have been dropped.
                let _ = reply.send(response);
            }
        }

        match tokio::time::timeout(self.inner.park_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SimError::InvalidRequest(format!(
                "run of '{id}' was abandoned"
            ))),
            Err(_) => {
                let mut state = self.inner.lock();
                let (_, missing) = closure(&state.parked, &id);
                state.parked.remove(&id);
                Err(SimError::PeerTimeout {
                    circuit: id,
                    missing: missing.into_iter().collect::<Vec<_>>().join(", "),
                })
            }
        }
    }
}

/// Circuits reachable from `start` through relays, and those not parked yet.
fn closure(parked: &BTreeMap<String, Parked>, start: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut seen = BTreeSet::new();
    let mut missing = BTreeSet::new();
    let mut queue = VecDeque::from([start.to_string()]);

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        match parked.get(&id) {
            Some(entry) => {
                for peer in entry.request.instructions.iter().filter_map(|i| i.peer()) {
                    if !seen.contains(peer) {
                        queue.push_back(peer.to_string());
                    }
                }
            }
            None => {
                missing.insert(id);
            }
        }
    }
    seen.retain(|id| !missing.contains(id));
    (seen, missing)
}

/// Run a group on the blocking pool, one response per request.
async fn execute(executor: Executor, mut requests: Vec<WireRequest>) -> Vec<WireResponse> {
    requests.sort_by(|a, b| a.id.cmp(&b.id));
    let ids: Vec<String> = requests.iter().map(|r| r.id.clone()).collect();
    let n = requests.len();

    let outcome = tokio::task::spawn_blocking(move || {
        let config = requests
            .first()
            .map(|r| r.config.clone())
            .unwrap_or_default();
        if let Some(odd) = requests.iter().find(|r| r.config.shots != config.shots) {
            warn!(
                "'{}' asked for {} shots; the group runs {}",
                odd.id, odd.config.shots, config.shots
            );
        }
        let start = Instant::now();
        let refs: Vec<&WireRequest> = requests.iter().collect();
        executor
            .run(&refs, &config)
            .map(|counts| (counts, start.elapsed().as_secs_f64()))
    })
    .await;

    match outcome {
        Ok(Ok((counts, elapsed))) => {
            debug!(circuits = ?ids, elapsed, "Group finished");
            counts
                .into_iter()
                .map(|c| WireResponse::counts(c, elapsed))
                .collect()
        }
        Ok(Err(e)) => vec![WireResponse::error(e.to_string()); n],
        Err(e) => vec![WireResponse::error(format!("simulation task failed: {e}")); n],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmesh_hal::{HalError, Job, RunConfig};
    use qmesh_ir::{Circuit, QubitId};

    #[test]
    fn test_directory_lists_units() {
        let cluster = LocalCluster::new(3);
        let directory = cluster.directory();
        assert_eq!(directory.len(), 3);
        let record = directory.get("qpu-1").unwrap();
        assert_eq!(record.address, "local://qpu-1");
        assert_eq!(record.group.as_deref(), Some(LOCAL_GROUP));
        assert!(record.backend.simulator);
    }

    #[tokio::test]
    async fn test_offloading_rejects_relays() {
        let cluster = LocalCluster::new(1);
        let mut a = Circuit::with_id("a", 1);
        a.measure_and_send(QubitId(0), "b").unwrap();

        let mut job = Job::with_exec_type(
            cluster.endpoints()[0].clone(),
            a.snapshot(),
            RunConfig::new(1),
            ExecType::Offloading,
        )
        .unwrap();
        job.submit().unwrap();
        assert!(matches!(
            job.result().await,
            Err(HalError::RemoteComputation { .. })
        ));
    }

    #[tokio::test]
    async fn test_park_timeout() {
        let cluster = LocalCluster::with_options(
            1,
            ClusterOptions {
                park_timeout: Duration::from_millis(50),
                ..ClusterOptions::default()
            },
        );
        let mut b = Circuit::with_id("b", 1);
        b.remote_c_if("x", [QubitId(0)], vec![], "a").unwrap();

        let mut job = Job::with_exec_type(
            cluster.endpoints()[0].clone(),
            b.snapshot(),
            RunConfig::new(1),
            ExecType::Dynamic,
        )
        .unwrap();
        job.submit().unwrap();
        match job.result().await {
            Err(HalError::RemoteComputation { message, .. }) => {
                assert!(message.contains("timed out"));
                assert!(message.contains('a'));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }
}

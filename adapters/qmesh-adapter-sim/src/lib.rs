//! qmesh Local Simulation Cluster
//!
//! This crate runs a set of simulated execution units inside the calling
//! process, so distributed batches can be exercised without any network.
//! Every unit is a regular [`qmesh_hal::Endpoint`], so jobs, batches and
//! `gather` work against it unchanged.
//!
//! # Execution Model
//!
//! - **Offloading** requests run immediately on their own statevector.
//! - **Dynamic** requests wait until every circuit they relay with has been
//!   submitted, then the whole group runs shot by shot on one joint
//!   statevector. Classical relays are FIFO queues, quantum relays are an
//!   ideal state transfer through a channel qubit.
//! - Deadlocks, oversized groups and malformed requests come back as an
//!   error-marker response, never as a panic.
//!
//! # Memory
//!
//! | Joint qubits | Memory |
//! |--------------|--------|
//! | 10 | ~16 KB |
//! | 20 | ~16 MB |
//! | 24 | ~256 MB |
//!
//! # Example
//!
//! ```ignore
//! use qmesh_adapter_sim::LocalCluster;
//! use qmesh_hal::{RunConfig, gather, submit_batch};
//! use qmesh_ir::{Circuit, QubitId};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cluster = LocalCluster::new(2);
//!
//!     let mut a = Circuit::with_id("a", 1);
//!     a.h(QubitId(0))?.measure_and_send(QubitId(0), "b")?;
//!     let mut b = Circuit::with_id("b", 1);
//!     b.remote_c_if("x", [QubitId(0)], vec![], &a)?.measure_all()?;
//!
//!     let mut batch = submit_batch(
//!         &[a.snapshot(), b.snapshot()],
//!         cluster.endpoints(),
//!         &RunConfig::new(1000),
//!     )?;
//!     let results = gather(&mut batch.jobs).await?;
//!
//!     // Expect ~50% "0" and ~50% "1" on b.
//!     println!("{:?}", results[1].counts);
//!     Ok(())
//! }
//! ```

pub mod cluster;
pub mod error;
pub mod executor;
pub mod statevector;

pub use cluster::{ClusterOptions, LOCAL_GROUP, LocalCluster, LocalTransport};
pub use error::{SimError, SimResult};
pub use executor::{DEFAULT_MAX_QUBITS, Executor};
pub use statevector::Statevector;

/// This crate's package metadata.
pub const COMPONENT: qmesh_ir::Component = qmesh_ir::Component {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
    description: env!("CARGO_PKG_DESCRIPTION"),
};

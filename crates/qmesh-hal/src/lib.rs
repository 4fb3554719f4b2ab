//! qmesh Hardware Abstraction Layer
//!
//! This crate carries circuits from the IR to execution endpoints and brings
//! the results back:
//!
//! - [`Endpoint`]: a handle to one execution unit, over any [`Transport`]
//! - [`Job`]: one circuit snapshot bound to one endpoint, with submit,
//!   lazy result and live re-parameterization
//! - [`gather`]: ordered fan-in over many jobs, aborting on the first failure
//! - [`submit_batch`]: resolve a batch's relays and submit every circuit
//!
//! # Example: Running a Distributed Batch
//!
//! ```ignore
//! use qmesh_hal::{RunConfig, gather, submit_batch};
//! use qmesh_ir::{Circuit, QubitId};
//!
//! let mut a = Circuit::with_id("a", 1);
//! a.h(QubitId(0))?.measure_and_send(QubitId(0), "b")?;
//! let mut b = Circuit::with_id("b", 1);
//! b.remote_c_if("x", [QubitId(0)], vec![], &a)?.measure_all()?;
//!
//! let mut batch = submit_batch(&[a.snapshot(), b.snapshot()], &endpoints, &RunConfig::new(1000))?;
//! let results = gather(&mut batch.jobs).await?;
//! println!("{:?}", results[1].counts);
//! ```

pub mod batch;
pub mod config;
pub mod directory;
pub mod endpoint;
pub mod error;
pub mod gather;
pub mod job;
pub mod result;
pub mod transport;
pub mod wire;

pub use batch::{SubmittedBatch, submit_batch};
pub use config::{BackendDescription, ClientConfig, ExecMethod, RunConfig};
pub use directory::{EndpointDirectory, EndpointRecord};
pub use endpoint::Endpoint;
pub use error::{HalError, HalResult};
pub use gather::{gather, gather_one};
pub use job::{Job, JobStatus};
pub use result::{Counts, RunResult};
pub use transport::{HttpTransport, Transport};
pub use wire::{ExecType, Message, ParameterUpdate, WireRequest, WireResponse};

/// This crate's package metadata.
pub const COMPONENT: qmesh_ir::Component = qmesh_ir::Component {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
    description: env!("CARGO_PKG_DESCRIPTION"),
};

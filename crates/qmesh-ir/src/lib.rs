//! qmesh Circuit Intermediate Representation
//!
//! This crate holds the data side of qmesh: the instruction catalog, the
//! circuit builder that validates every instruction as it is added, the frozen
//! snapshot form that jobs carry over the wire, and the resolver that checks a
//! batch of circuits for consistent cross-circuit relays.
//!
//! # Core Components
//!
//! - **Catalog**: [`catalog::lookup`] maps an instruction name to its [`GateSpec`]
//! - **Instructions**: [`Instruction`] plus the structural validator [`validate`]
//! - **Circuit**: [`Circuit`] high-level builder API
//! - **Snapshot**: [`CircuitSnapshot`], the serialized form of a circuit
//! - **Resolver**: [`resolve`] derives [`DependencyEdge`]s for a batch
//!
//! # Example: Classical Relay Between Two Circuits
//!
//! ```rust
//! use qmesh_ir::{Circuit, QubitId, RelayKind, resolve};
//!
//! let mut alice = Circuit::with_id("alice", 1);
//! alice.h(QubitId(0)).unwrap();
//! alice.measure_and_send(QubitId(0), "bob").unwrap();
//!
//! let mut bob = Circuit::with_id("bob", 1);
//! bob.remote_c_if("x", [QubitId(0)], vec![], &alice).unwrap();
//! bob.measure_all().unwrap();
//!
//! let resolution = resolve(&[&alice, &bob]).unwrap();
//! assert_eq!(resolution.edges().len(), 1);
//! assert_eq!(resolution.edges()[0].kind, RelayKind::Classical);
//! ```
//!
//! # Example: Parameterized Circuit
//!
//! ```rust
//! use qmesh_ir::{Circuit, QubitId};
//! use std::f64::consts::PI;
//!
//! let mut circuit = Circuit::with_size("variational", 1, 1);
//! circuit.ry(PI / 4.0, QubitId(0)).unwrap();
//! assert!(circuit.is_parametric());
//!
//! circuit.assign_parameters(&[PI / 2.0]).unwrap();
//! assert_eq!(circuit.parameters(), vec![PI / 2.0]);
//! ```

pub mod catalog;
pub mod circuit;
pub mod error;
pub mod instruction;
pub mod qubit;
pub mod resolve;
pub mod snapshot;

pub use catalog::{Arity, GateSpec, Relay, RelayKind, RelayRole};
pub use circuit::Circuit;
pub use error::{IrError, IrResult, Malformed};
pub use instruction::{Instruction, Matrix, PeerRef, validate};
pub use qubit::{ClbitId, QubitId, Register, RegisterKind};
pub use resolve::{
    CircuitView, DanglingSend, DependencyEdge, Resolution, ResolvePolicy, resolve, resolve_with,
};
pub use snapshot::{CircuitSnapshot, bind_parameters, collect_parameters};

/// Package metadata of one workspace crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    /// Package name.
    pub name: &'static str,
    /// Package version.
    pub version: &'static str,
    /// One-line package description.
    pub description: &'static str,
}

/// This crate's package metadata.
pub const COMPONENT: Component = Component {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
    description: env!("CARGO_PKG_DESCRIPTION"),
};

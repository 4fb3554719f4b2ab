//! Error types for the IR crate.

use crate::qubit::{ClbitId, QubitId, RegisterKind};
use thiserror::Error;

/// Errors that can occur while building, validating or resolving circuits.
///
/// Every variant is raised synchronously at construction or validation time;
/// none of them ever reaches the network layer.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IrError {
    /// The instruction name is not in the catalog.
    #[error("Unknown gate '{0}'")]
    UnknownGate(String),

    /// An instruction violated a structural invariant.
    #[error("Malformed instruction '{gate}': {reason}")]
    MalformedInstruction {
        /// Name of the offending instruction.
        gate: String,
        /// The invariant that failed.
        reason: Malformed,
    },

    /// A receive-type instruction has no source in the batch.
    #[error(
        "Unresolved relay in circuit '{circuit}': instruction #{position} ('{gate}') expects peer '{peer}', {detail}"
    )]
    UnresolvedRelay {
        /// Circuit holding the receive.
        circuit: String,
        /// Position of the receive in the circuit's instruction list.
        position: usize,
        /// Name of the receive instruction.
        gate: String,
        /// Declared source circuit.
        peer: String,
        /// What is missing.
        detail: String,
    },

    /// A send-type instruction has no matching receive in the batch.
    ///
    /// Only raised under [`ResolvePolicy::Strict`](crate::resolve::ResolvePolicy).
    #[error(
        "Dangling send in circuit '{circuit}': instruction #{position} ('{gate}') targets '{peer}' but nothing in the batch receives it"
    )]
    DanglingSend {
        /// Circuit holding the send.
        circuit: String,
        /// Position of the send in the circuit's instruction list.
        position: usize,
        /// Name of the send instruction.
        gate: String,
        /// Declared sink circuit.
        peer: String,
    },

    /// Two circuits in one batch share an identifier.
    #[error("Duplicate circuit id '{0}' in batch")]
    DuplicateCircuit(String),

    /// A parameter vector does not fit the circuit.
    #[error("Circuit '{circuit}' takes {expected} parameters, got {got}")]
    ParameterMismatch {
        /// Circuit identifier.
        circuit: String,
        /// Number of parameters the circuit carries.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// A snapshot could not be turned back into a circuit.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Adding a register would run past the largest representable index.
    #[error("{kind} register '{name}' of size {size} overflows the index space")]
    RegisterOverflow {
        /// Index space of the register.
        kind: RegisterKind,
        /// Requested register name.
        name: String,
        /// Requested size.
        size: u32,
    },
}

/// The structural invariant an instruction failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum Malformed {
    /// Wrong number of qubits for the gate.
    #[error("expected {expected} qubits, got {got}")]
    QubitCount {
        /// Arity declared by the catalog (or derived from the matrix).
        expected: u32,
        /// Number of qubits supplied.
        got: usize,
    },

    /// Wrong number of classical bits for the gate.
    #[error("expected {expected} classical bits, got {got}")]
    ClbitCount {
        /// Classical arity declared by the catalog.
        expected: u32,
        /// Number of classical bits supplied.
        got: usize,
    },

    /// Qubit index outside the circuit's registers.
    #[error("qubit {qubit} is out of range (circuit has {available} qubits)")]
    QubitOutOfRange {
        /// The offending qubit.
        qubit: QubitId,
        /// Number of qubits in the circuit.
        available: u32,
    },

    /// Classical index outside the circuit's registers.
    #[error("classical bit {clbit} is out of range (circuit has {available} classical bits)")]
    ClbitOutOfRange {
        /// The offending classical bit.
        clbit: ClbitId,
        /// Number of classical bits in the circuit.
        available: u32,
    },

    /// The same qubit appears twice.
    #[error("duplicate qubit {0}")]
    DuplicateQubit(QubitId),

    /// The same classical bit appears twice.
    #[error("duplicate classical bit {0}")]
    DuplicateClbit(ClbitId),

    /// A parametric gate was given no parameters.
    #[error("missing parameters (expected {expected})")]
    MissingParameters {
        /// Parameter arity declared by the catalog.
        expected: u32,
    },

    /// A non-parametric gate was given parameters.
    #[error("gate takes no parameters, got {got}")]
    UnexpectedParameters {
        /// Number of parameters supplied.
        got: usize,
    },

    /// Wrong number of parameters for a parametric gate.
    #[error("expected {expected} parameters, got {got}")]
    ParameterCount {
        /// Parameter arity declared by the catalog.
        expected: u32,
        /// Number of parameters supplied.
        got: usize,
    },

    /// A parameter is NaN or infinite.
    #[error("parameter #{0} is not finite")]
    NonFiniteParameter(usize),

    /// A matrix gate was given no matrix.
    #[error("missing matrix")]
    MissingMatrix,

    /// A non-matrix gate was given a matrix.
    #[error("gate does not take a matrix")]
    UnexpectedMatrix,

    /// The matrix is not square with a power-of-two side.
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    /// A relay instruction names no peer circuit.
    #[error("relay instruction names no peer circuit")]
    MissingPeer,

    /// A relay instruction names more than one peer.
    #[error("relay instruction names {0} peer circuits, expected exactly one")]
    PeerCount(usize),

    /// A local instruction names peer circuits.
    #[error("local instruction cannot name peer circuits")]
    UnexpectedPeer,

    /// A relay instruction names its own circuit.
    #[error("relay instruction names its own circuit '{0}'")]
    SelfRelay(String),
}

impl IrError {
    pub(crate) fn malformed(gate: impl Into<String>, reason: Malformed) -> Self {
        IrError::MalformedInstruction {
            gate: gate.into(),
            reason,
        }
    }
}

impl From<serde_json::Error> for IrError {
    fn from(e: serde_json::Error) -> Self {
        IrError::Serialization(e.to_string())
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;

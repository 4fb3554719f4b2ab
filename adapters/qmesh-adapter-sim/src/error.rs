//! Error types for the local simulator.
//!
//! None of these cross the transport as Rust errors: the cluster turns each
//! into an error-marker response, the way a remote endpoint would.

use qmesh_hal::ExecMethod;
use thiserror::Error;

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised while running a request.
#[derive(Debug, Error)]
pub enum SimError {
    /// The request failed structural validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The simulation method is not available here.
    #[error("method '{0}' is not supported by the statevector simulator")]
    UnsupportedMethod(ExecMethod),

    /// The request carries an instruction the engine cannot apply.
    #[error("unsupported instruction '{0}'")]
    UnsupportedInstruction(String),

    /// The joint state would exceed the qubit limit.
    #[error("{needed} qubits needed, limit is {limit}")]
    TooManyQubits {
        /// Qubits the group needs, relay channels included.
        needed: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A relay names a circuit outside the running group.
    #[error("circuit '{circuit}' relays with '{peer}', which is not part of this run")]
    UnknownPeer {
        /// Circuit holding the relay.
        circuit: String,
        /// Missing peer.
        peer: String,
    },

    /// Every remaining circuit is blocked on a receive.
    #[error("deadlock: {0}")]
    Deadlock(String),

    /// A parameter update does not fit the loaded circuit.
    #[error("parameter update rejected: {0}")]
    Parameters(String),

    /// Peers never arrived.
    #[error("timed out waiting for peers of '{circuit}': {missing}")]
    PeerTimeout {
        /// Parked circuit.
        circuit: String,
        /// Comma-separated missing peers.
        missing: String,
    },
}

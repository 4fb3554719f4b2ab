//! The instruction catalog.
//!
//! A single static table maps every base instruction name to its
//! [`GateSpec`]: qubit arity, parameter arity, classical arity and whether it
//! is conditional or a cross-circuit relay. Two families are derived from the
//! table instead of being listed:
//!
//! | Prefix | Meaning | Qubit arity |
//! |--------|---------|-------------|
//! | `c_if_` | base gate gated on an in-line measurement of a leading control qubit | base + 1 |
//! | `d_c_if_` | base gate gated on a classical bit relayed from a peer circuit | base |
//!
//! Matrix gates (`unitary` and its variants) derive their arity from the
//! supplied matrix instead of the table. Both conditional matrix variants
//! take one extra leading control qubit: `c_if_unitary` measures it in-line,
//! `d_c_if_unitary` loads the relayed bit into it.

use std::fmt;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult, Malformed};
use crate::instruction::Matrix;

use self::RelayKind::{Classical, Quantum};

/// Prefix of classically-conditioned variants.
pub const CONDITIONAL_PREFIX: &str = "c_if_";

/// Prefix of remote-conditional variants.
pub const REMOTE_CONDITIONAL_PREFIX: &str = "d_c_if_";

/// Name of the generic matrix gate.
pub const UNITARY: &str = "unitary";

/// What a relay instruction carries between circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelayKind {
    /// A measurement outcome.
    #[serde(rename = "classical-relay")]
    Classical,
    /// A qubit state.
    #[serde(rename = "quantum-relay")]
    Quantum,
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayKind::Classical => write!(f, "classical-relay"),
            RelayKind::Quantum => write!(f, "quantum-relay"),
        }
    }
}

/// Which end of a relay an instruction sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayRole {
    /// Produces the relayed value.
    Send,
    /// Consumes the relayed value.
    Receive,
}

/// Relay metadata of a distributed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relay {
    /// What is relayed.
    pub kind: RelayKind,
    /// Which end this instruction is.
    pub role: RelayRole,
}

impl Relay {
    const fn new(kind: RelayKind, role: RelayRole) -> Self {
        Self { kind, role }
    }

    /// Whether this is the producing end.
    pub fn is_send(&self) -> bool {
        self.role == RelayRole::Send
    }

    /// Whether this is the consuming end.
    pub fn is_receive(&self) -> bool {
        self.role == RelayRole::Receive
    }
}

/// How the qubit count of an instruction is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// A fixed number of qubits.
    Fixed(u32),
    /// `log2(dim)` of the supplied matrix, plus `extra` control qubits.
    Matrix {
        /// Control qubits that precede the matrix targets.
        extra: u32,
    },
}

impl Arity {
    const fn plus(self, n: u32) -> Self {
        match self {
            Arity::Fixed(q) => Arity::Fixed(q + n),
            Arity::Matrix { extra } => Arity::Matrix { extra: extra + n },
        }
    }
}

/// Catalog entry for one instruction name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GateSpec {
    /// Qubit arity rule.
    pub qubits: Arity,
    /// Number of parameters.
    pub params: u32,
    /// Number of classical bits.
    pub clbits: u32,
    /// Whether the base operation is a unitary gate (and so can be conditioned).
    pub unitary: bool,
    /// Whether execution is gated on a classical outcome.
    pub conditional: bool,
    /// Relay metadata for distributed instructions.
    pub relay: Option<Relay>,
}

impl GateSpec {
    const fn gate(qubits: u32, params: u32) -> Self {
        Self {
            qubits: Arity::Fixed(qubits),
            params,
            clbits: 0,
            unitary: true,
            conditional: false,
            relay: None,
        }
    }

    const fn matrix() -> Self {
        Self {
            qubits: Arity::Matrix { extra: 0 },
            ..Self::gate(0, 0)
        }
    }

    const fn non_unitary(qubits: u32, clbits: u32) -> Self {
        Self {
            qubits: Arity::Fixed(qubits),
            params: 0,
            clbits,
            unitary: false,
            conditional: false,
            relay: None,
        }
    }

    const fn relay(qubits: u32, clbits: u32, kind: RelayKind, role: RelayRole) -> Self {
        Self {
            relay: Some(Relay::new(kind, role)),
            ..Self::non_unitary(qubits, clbits)
        }
    }

    /// Parameter arity, `None` for non-parametric instructions.
    pub fn param_arity(&self) -> Option<u32> {
        (self.params > 0).then_some(self.params)
    }

    /// Whether the instruction spans two circuits.
    pub fn is_distributed(&self) -> bool {
        self.relay.is_some()
    }

    /// Whether the instruction is gated on a classical outcome.
    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    /// Whether the arity is derived from a matrix.
    pub fn is_matrix(&self) -> bool {
        matches!(self.qubits, Arity::Matrix { .. })
    }

    /// Resolve the qubit arity, computing it from `matrix` for matrix gates.
    ///
    /// `name` is only used to label errors.
    pub fn qubit_arity(&self, name: &str, matrix: Option<&Matrix>) -> IrResult<u32> {
        match (self.qubits, matrix) {
            (Arity::Fixed(q), None) => Ok(q),
            (Arity::Fixed(_), Some(_)) => Err(IrError::malformed(name, Malformed::UnexpectedMatrix)),
            (Arity::Matrix { .. }, None) => Err(IrError::malformed(name, Malformed::MissingMatrix)),
            (Arity::Matrix { extra }, Some(m)) => {
                let targets = matrix_qubits(m).map_err(|reason| IrError::malformed(name, reason))?;
                Ok(targets + extra)
            }
        }
    }
}

/// Number of qubits a square, power-of-two matrix acts on.
pub fn matrix_qubits(matrix: &Matrix) -> Result<u32, Malformed> {
    let dim = matrix.len();
    if dim < 2 || !dim.is_power_of_two() {
        return Err(Malformed::InvalidMatrix(format!(
            "side length {dim} is not a power of two >= 2"
        )));
    }
    if let Some((row, r)) = matrix.iter().enumerate().find(|(_, r)| r.len() != dim) {
        return Err(Malformed::InvalidMatrix(format!(
            "row {row} has {} entries, expected {dim}",
            r.len()
        )));
    }
    Ok(dim.trailing_zeros())
}

/// Base instruction table.
static TABLE: &[(&str, GateSpec)] = &[
    // Single-qubit, no parameters
    ("id", GateSpec::gate(1, 0)),
    ("x", GateSpec::gate(1, 0)),
    ("y", GateSpec::gate(1, 0)),
    ("z", GateSpec::gate(1, 0)),
    ("h", GateSpec::gate(1, 0)),
    ("s", GateSpec::gate(1, 0)),
    ("sdg", GateSpec::gate(1, 0)),
    ("t", GateSpec::gate(1, 0)),
    ("tdg", GateSpec::gate(1, 0)),
    ("sx", GateSpec::gate(1, 0)),
    ("sxdg", GateSpec::gate(1, 0)),
    // Single-qubit rotations
    ("rx", GateSpec::gate(1, 1)),
    ("ry", GateSpec::gate(1, 1)),
    ("rz", GateSpec::gate(1, 1)),
    ("p", GateSpec::gate(1, 1)),
    ("u2", GateSpec::gate(1, 2)),
    ("r", GateSpec::gate(1, 2)),
    ("u", GateSpec::gate(1, 3)),
    ("u3", GateSpec::gate(1, 3)),
    // Two-qubit
    ("cx", GateSpec::gate(2, 0)),
    ("cy", GateSpec::gate(2, 0)),
    ("cz", GateSpec::gate(2, 0)),
    ("ch", GateSpec::gate(2, 0)),
    ("swap", GateSpec::gate(2, 0)),
    ("iswap", GateSpec::gate(2, 0)),
    ("ecr", GateSpec::gate(2, 0)),
    ("crx", GateSpec::gate(2, 1)),
    ("cry", GateSpec::gate(2, 1)),
    ("crz", GateSpec::gate(2, 1)),
    ("cp", GateSpec::gate(2, 1)),
    ("rxx", GateSpec::gate(2, 1)),
    ("ryy", GateSpec::gate(2, 1)),
    ("rzz", GateSpec::gate(2, 1)),
    ("rzx", GateSpec::gate(2, 1)),
    ("cu", GateSpec::gate(2, 4)),
    // Three-qubit
    ("ccx", GateSpec::gate(3, 0)),
    ("cswap", GateSpec::gate(3, 0)),
    ("ccz", GateSpec::gate(3, 0)),
    // Matrix
    (UNITARY, GateSpec::matrix()),
    // Non-unitary
    ("measure", GateSpec::non_unitary(1, 1)),
    ("reset", GateSpec::non_unitary(1, 0)),
    // Relays
    ("measure_and_send", GateSpec::relay(1, 0, Classical, RelayRole::Send)),
    ("recv", GateSpec::relay(0, 1, Classical, RelayRole::Receive)),
    ("qsend", GateSpec::relay(1, 0, Quantum, RelayRole::Send)),
    ("qrecv", GateSpec::relay(1, 0, Quantum, RelayRole::Receive)),
];

static INDEX: LazyLock<FxHashMap<&'static str, GateSpec>> =
    LazyLock::new(|| TABLE.iter().copied().collect());

/// Look up the catalog entry for an instruction name.
pub fn lookup(name: &str) -> IrResult<GateSpec> {
    if let Some(spec) = INDEX.get(name) {
        return Ok(*spec);
    }

    if let Some(base) = name.strip_prefix(REMOTE_CONDITIONAL_PREFIX) {
        let spec = conditionable(name, base)?;
        // The matrix variant loads the relayed bit into a leading control qubit.
        let qubits = match spec.qubits {
            Arity::Matrix { .. } => spec.qubits.plus(1),
            fixed => fixed,
        };
        return Ok(GateSpec {
            qubits,
            conditional: true,
            relay: Some(Relay::new(Classical, RelayRole::Receive)),
            ..spec
        });
    }

    if let Some(base) = name.strip_prefix(CONDITIONAL_PREFIX) {
        let spec = conditionable(name, base)?;
        return Ok(GateSpec {
            qubits: spec.qubits.plus(1),
            conditional: true,
            ..spec
        });
    }

    Err(IrError::UnknownGate(name.to_string()))
}

fn conditionable(name: &str, base: &str) -> IrResult<GateSpec> {
    INDEX
        .get(base)
        .filter(|spec| spec.unitary)
        .copied()
        .ok_or_else(|| IrError::UnknownGate(name.to_string()))
}

/// Strip a conditional prefix, returning the base gate name.
pub fn base_name(name: &str) -> &str {
    name.strip_prefix(REMOTE_CONDITIONAL_PREFIX)
        .or_else(|| name.strip_prefix(CONDITIONAL_PREFIX))
        .unwrap_or(name)
}

/// Whether a name is in the catalog (including derived variants).
pub fn contains(name: &str) -> bool {
    lookup(name).is_ok()
}

/// Names of all base entries, in table order.
pub fn base_names() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|(name, _)| *name)
}

/// Names of all unitary base gates, i.e. the ones that have conditional variants.
pub fn unitary_names() -> impl Iterator<Item = &'static str> {
    TABLE
        .iter()
        .filter(|(_, spec)| spec.unitary)
        .map(|(name, _)| *name)
}

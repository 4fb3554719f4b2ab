//! Circuit instructions and their structural validation.

use num_complex::Complex64;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, GateSpec, Relay};
use crate::error::{IrError, IrResult, Malformed};
use crate::qubit::{ClbitId, QubitId};

/// A dense square matrix, row-major, for the `unitary` gate family.
pub type Matrix = Vec<Vec<Complex64>>;

/// Identifier of the circuit on the other end of a relay.
///
/// Built from a string or from a circuit reference; either way only the
/// identifier is kept, so circuits never hold references to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerRef(String);

impl PeerRef {
    /// The peer's circuit identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the identifier.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for PeerRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for PeerRef {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

impl std::fmt::Display for PeerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single instruction as stored in a circuit and sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Catalog name.
    pub name: String,
    /// Qubits the instruction acts on.
    pub qubits: Vec<QubitId>,
    /// Classical bits written by the instruction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clbits: Vec<ClbitId>,
    /// Gate parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<f64>,
    /// Matrix for the `unitary` family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Matrix>,
    /// Peer circuit identifiers for relay instructions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub circuits: Vec<String>,
}

impl Instruction {
    /// Create an instruction with just a name and qubits.
    pub fn new(name: impl Into<String>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            name: name.into(),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
            params: vec![],
            matrix: None,
            circuits: vec![],
        }
    }

    /// Set the classical bits.
    #[must_use]
    pub fn with_clbits(mut self, clbits: impl IntoIterator<Item = ClbitId>) -> Self {
        self.clbits = clbits.into_iter().collect();
        self
    }

    /// Set the parameters.
    #[must_use]
    pub fn with_params(mut self, params: impl Into<Vec<f64>>) -> Self {
        self.params = params.into();
        self
    }

    /// Set the matrix.
    #[must_use]
    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = Some(matrix);
        self
    }

    /// Name the peer circuit of a relay.
    #[must_use]
    pub fn with_peer(mut self, peer: impl Into<PeerRef>) -> Self {
        self.circuits.push(peer.into().into_string());
        self
    }

    /// Catalog entry for this instruction.
    pub fn spec(&self) -> IrResult<GateSpec> {
        catalog::lookup(&self.name)
    }

    /// Relay metadata if this is a distributed instruction.
    pub fn relay(&self) -> Option<Relay> {
        self.spec().ok().and_then(|spec| spec.relay)
    }

    /// The peer circuit, for relay instructions.
    pub fn peer(&self) -> Option<&str> {
        self.circuits.first().map(String::as_str)
    }

    /// Whether this is a measurement.
    pub fn is_measure(&self) -> bool {
        self.name == "measure"
    }

    /// Whether this instruction carries tunable parameters.
    ///
    /// Matrix gates never do: their entries are fixed at construction.
    pub fn is_parametric(&self) -> bool {
        !self.params.is_empty() && self.matrix.is_none()
    }
}

/// Check an instruction against the catalog and a circuit's shape.
///
/// `owner` is the identifier of the circuit the instruction would join; a
/// relay may not name it as its peer.
pub fn validate(
    instruction: &Instruction,
    num_qubits: u32,
    num_clbits: u32,
    owner: &str,
) -> IrResult<GateSpec> {
    let name = instruction.name.as_str();
    let spec = catalog::lookup(name)?;
    let fail = |reason| Err(IrError::malformed(name, reason));

    let arity = spec.qubit_arity(name, instruction.matrix.as_ref())?;
    if instruction.qubits.len() != arity as usize {
        return fail(Malformed::QubitCount {
            expected: arity,
            got: instruction.qubits.len(),
        });
    }

    let mut seen = FxHashSet::default();
    for &qubit in &instruction.qubits {
        if qubit.0 >= num_qubits {
            return fail(Malformed::QubitOutOfRange {
                qubit,
                available: num_qubits,
            });
        }
        if !seen.insert(qubit.0) {
            return fail(Malformed::DuplicateQubit(qubit));
        }
    }

    if instruction.clbits.len() != spec.clbits as usize {
        return fail(Malformed::ClbitCount {
            expected: spec.clbits,
            got: instruction.clbits.len(),
        });
    }

    seen.clear();
    for &clbit in &instruction.clbits {
        if clbit.0 >= num_clbits {
            return fail(Malformed::ClbitOutOfRange {
                clbit,
                available: num_clbits,
            });
        }
        if !seen.insert(clbit.0) {
            return fail(Malformed::DuplicateClbit(clbit));
        }
    }

    let got = instruction.params.len();
    match spec.param_arity() {
        Some(expected) if got == 0 => return fail(Malformed::MissingParameters { expected }),
        Some(expected) if got != expected as usize => {
            return fail(Malformed::ParameterCount { expected, got });
        }
        None if got > 0 => return fail(Malformed::UnexpectedParameters { got }),
        _ => {}
    }
    if let Some(i) = instruction.params.iter().position(|p| !p.is_finite()) {
        return fail(Malformed::NonFiniteParameter(i));
    }

    match (spec.relay, instruction.circuits.as_slice()) {
        (Some(_), []) => return fail(Malformed::MissingPeer),
        (Some(_), [peer]) if peer.is_empty() => return fail(Malformed::MissingPeer),
        (Some(_), [peer]) if peer == owner => return fail(Malformed::SelfRelay(peer.clone())),
        (Some(_), [_]) => {}
        (Some(_), peers) => return fail(Malformed::PeerCount(peers.len())),
        (None, []) => {}
        (None, _) => return fail(Malformed::UnexpectedPeer),
    }

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(result: IrResult<GateSpec>) -> Malformed {
        match result {
            Err(IrError::MalformedInstruction { reason, .. }) => reason,
            other => panic!("expected malformed instruction, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_gate() {
        let inst = Instruction::new("cx", [QubitId(0), QubitId(1)]);
        assert!(validate(&inst, 2, 0, "a").is_ok());
    }

    #[test]
    fn test_qubit_count() {
        let inst = Instruction::new("cx", [QubitId(0)]);
        assert_eq!(
            reason(validate(&inst, 2, 0, "a")),
            Malformed::QubitCount {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_out_of_range_and_duplicates() {
        let inst = Instruction::new("h", [QubitId(5)]);
        assert!(matches!(
            reason(validate(&inst, 2, 0, "a")),
            Malformed::QubitOutOfRange { .. }
        ));

        let inst = Instruction::new("cz", [QubitId(1), QubitId(1)]);
        assert_eq!(
            reason(validate(&inst, 2, 0, "a")),
            Malformed::DuplicateQubit(QubitId(1))
        );

        let inst = Instruction::new("measure", [QubitId(0)]).with_clbits([ClbitId(3)]);
        assert!(matches!(
            reason(validate(&inst, 1, 1, "a")),
            Malformed::ClbitOutOfRange { .. }
        ));
    }

    #[test]
    fn test_parameter_rules() {
        let missing = Instruction::new("rx", [QubitId(0)]);
        assert_eq!(
            reason(validate(&missing, 1, 0, "a")),
            Malformed::MissingParameters { expected: 1 }
        );

        let unexpected = Instruction::new("h", [QubitId(0)]).with_params(vec![0.5]);
        assert_eq!(
            reason(validate(&unexpected, 1, 0, "a")),
            Malformed::UnexpectedParameters { got: 1 }
        );

        let short = Instruction::new("u", [QubitId(0)]).with_params(vec![0.1, 0.2]);
        assert_eq!(
            reason(validate(&short, 1, 0, "a")),
            Malformed::ParameterCount {
                expected: 3,
                got: 2
            }
        );

        let nan = Instruction::new("rz", [QubitId(0)]).with_params(vec![f64::NAN]);
        assert_eq!(
            reason(validate(&nan, 1, 0, "a")),
            Malformed::NonFiniteParameter(0)
        );
    }

    #[test]
    fn test_peer_rules() {
        let no_peer = Instruction::new("qsend", [QubitId(0)]);
        assert_eq!(reason(validate(&no_peer, 1, 0, "a")), Malformed::MissingPeer);

        let own = Instruction::new("qsend", [QubitId(0)]).with_peer("a");
        assert_eq!(
            reason(validate(&own, 1, 0, "a")),
            Malformed::SelfRelay("a".into())
        );

        let two = Instruction::new("qsend", [QubitId(0)])
            .with_peer("b")
            .with_peer("c");
        assert_eq!(reason(validate(&two, 1, 0, "a")), Malformed::PeerCount(2));

        let local = Instruction::new("x", [QubitId(0)]).with_peer("b");
        assert_eq!(reason(validate(&local, 1, 0, "a")), Malformed::UnexpectedPeer);

        let ok = Instruction::new("recv", Vec::<QubitId>::new())
            .with_clbits([ClbitId(0)])
            .with_peer("b");
        assert!(validate(&ok, 1, 1, "a").unwrap().is_distributed());
    }

    #[test]
    fn test_unknown_gate_is_not_malformed() {
        let inst = Instruction::new("warp", [QubitId(0)]);
        assert_eq!(
            validate(&inst, 1, 0, "a"),
            Err(IrError::UnknownGate("warp".into()))
        );
    }

    #[test]
    fn test_wire_shape() {
        let inst = Instruction::new("d_c_if_rx", [QubitId(0)])
            .with_params(vec![0.25])
            .with_peer("alice");
        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "d_c_if_rx",
                "qubits": [0],
                "params": [0.25],
                "circuits": ["alice"],
            })
        );
    }
}

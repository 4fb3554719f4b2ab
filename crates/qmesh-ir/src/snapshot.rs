//! Frozen, serializable form of a circuit.

use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::error::{IrError, IrResult};
use crate::instruction::{Instruction, PeerRef};
use crate::qubit::Register;

/// The serialized form of a [`Circuit`] handed to a job.
///
/// A snapshot is never mutated in place; re-parameterization produces a new
/// one via [`CircuitSnapshot::with_parameters`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    /// Circuit identifier.
    pub id: String,
    /// Instructions in program order.
    pub instructions: Vec<Instruction>,
    /// Number of qubits.
    pub num_qubits: u32,
    /// Number of classical bits.
    pub num_clbits: u32,
    /// Quantum registers in creation order.
    pub quantum_registers: Vec<Register>,
    /// Classical registers in creation order.
    pub classical_registers: Vec<Register>,
    /// Whether any instruction carries tunable parameters.
    pub is_parametric: bool,
    /// Whether any instruction relays to another circuit.
    pub is_distributed: bool,
}

impl CircuitSnapshot {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> IrResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot from JSON and check that it describes a valid circuit.
    ///
    /// The derived flags are recomputed from the instructions.
    pub fn from_json(json: &str) -> IrResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.normalized()
    }

    /// Re-validate and return a copy whose `is_parametric` and
    /// `is_distributed` flags match the instructions.
    pub fn normalized(&self) -> IrResult<Self> {
        Ok(Circuit::from_snapshot(self)?.snapshot())
    }

    /// All tunable parameters in instruction order.
    pub fn parameters(&self) -> Vec<f64> {
        collect_parameters(&self.instructions)
    }

    /// A copy of this snapshot with every tunable parameter replaced.
    pub fn with_parameters(&self, values: &[f64]) -> IrResult<Self> {
        let mut next = self.clone();
        bind_parameters(&self.id, &mut next.instructions, values)?;
        Ok(next)
    }

    /// Identifiers of every circuit this one relays with.
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().filter_map(Instruction::peer)
    }
}

impl From<&CircuitSnapshot> for PeerRef {
    fn from(snapshot: &CircuitSnapshot) -> Self {
        PeerRef::from(&snapshot.id)
    }
}

/// Parameters of the tunable instructions, in instruction order.
pub fn collect_parameters(instructions: &[Instruction]) -> Vec<f64> {
    instructions
        .iter()
        .filter(|i| i.is_parametric())
        .flat_map(|i| i.params.iter().copied())
        .collect()
}

/// Overwrite parameters in instruction order. All-or-nothing.
///
/// Fails with [`IrError::ParameterMismatch`] on a wrong count or a
/// non-finite value, leaving `instructions` untouched.
pub fn bind_parameters(
    circuit: &str,
    instructions: &mut [Instruction],
    values: &[f64],
) -> IrResult<()> {
    let expected: usize = instructions
        .iter()
        .filter(|i| i.is_parametric())
        .map(|i| i.params.len())
        .sum();
    if values.len() != expected || values.iter().any(|v| !v.is_finite()) {
        return Err(IrError::ParameterMismatch {
            circuit: circuit.to_string(),
            expected,
            got: values.len(),
        });
    }

    let mut rest = values;
    for instruction in instructions.iter_mut().filter(|i| i.is_parametric()) {
        let (head, tail) = rest.split_at(instruction.params.len());
        instruction.params.copy_from_slice(head);
        rest = tail;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qubit::{ClbitId, QubitId};

    fn sample() -> Circuit {
        let mut circuit = Circuit::with_size("sample", 2, 2);
        circuit
            .h(QubitId(0))
            .unwrap()
            .ry(0.5, QubitId(1))
            .unwrap()
            .measure_and_send(QubitId(0), "peer")
            .unwrap()
            .measure(QubitId(1), ClbitId(1))
            .unwrap();
        circuit
    }

    #[test]
    fn test_snapshot_flags() {
        let snapshot = sample().snapshot();
        assert_eq!(snapshot.id, "sample");
        assert!(snapshot.is_parametric);
        assert!(snapshot.is_distributed);
        assert_eq!(snapshot.peers().collect::<Vec<_>>(), vec!["peer"]);
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&sample().snapshot().to_json().unwrap()).unwrap();
        for key in [
            "id",
            "instructions",
            "num_qubits",
            "num_clbits",
            "quantum_registers",
            "classical_registers",
            "is_parametric",
            "is_distributed",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["quantum_registers"][0]["name"], "q");
    }

    #[test]
    fn test_from_json_revalidates() {
        let mut snapshot = sample().snapshot();
        snapshot.instructions[0].qubits = vec![QubitId(9)];
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(matches!(
            CircuitSnapshot::from_json(&json),
            Err(IrError::MalformedInstruction { .. })
        ));

        assert!(matches!(
            CircuitSnapshot::from_json("{not json"),
            Err(IrError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_json_recomputes_stale_flags() {
        let mut circuit = Circuit::with_id("vqe", 1);
        circuit.ry(0.3, QubitId(0)).unwrap();
        let mut snapshot = circuit.snapshot();
        snapshot.is_parametric = false;
        snapshot.is_distributed = true;

        let json = serde_json::to_string(&snapshot).unwrap();
        let loaded = CircuitSnapshot::from_json(&json).unwrap();
        assert!(loaded.is_parametric);
        assert!(!loaded.is_distributed);
        assert_eq!(loaded, circuit.snapshot());
        assert_eq!(snapshot.normalized().unwrap(), loaded);
    }

    #[test]
    fn test_with_parameters() {
        let snapshot = sample().snapshot();
        let rebound = snapshot.with_parameters(&[1.25]).unwrap();
        assert_eq!(rebound.parameters(), vec![1.25]);
        assert_eq!(snapshot.parameters(), vec![0.5]);

        assert!(snapshot.with_parameters(&[]).is_err());
        assert!(snapshot.with_parameters(&[f64::INFINITY]).is_err());
    }
}

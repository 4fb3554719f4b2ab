//! High-level circuit builder API.

use std::collections::BTreeSet;

use tracing::warn;
use uuid::Uuid;

use crate::catalog::{CONDITIONAL_PREFIX, REMOTE_CONDITIONAL_PREFIX, RelayKind, UNITARY};
use crate::error::{IrError, IrResult};
use crate::instruction::{Instruction, Matrix, PeerRef, validate};
use crate::qubit::{ClbitId, QubitId, Register, RegisterKind};
use crate::snapshot::CircuitSnapshot;

/// Default name of the quantum register created with the circuit.
pub const DEFAULT_QREG: &str = "q";
/// Default name of the classical register created with the circuit.
pub const DEFAULT_CREG: &str = "c";
/// Name of the register added by [`Circuit::measure_all`].
pub const MEASURE_ALL_CREG: &str = "meas";

/// A quantum circuit under construction.
///
/// Every instruction is validated against the catalog and the circuit's
/// registers before it is appended; a rejected instruction leaves the circuit
/// untouched. Once handed to a job the circuit is frozen into a
/// [`CircuitSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    id: String,
    quantum_registers: Vec<Register>,
    classical_registers: Vec<Register>,
    instructions: Vec<Instruction>,
    num_qubits: u32,
    num_clbits: u32,
    is_parametric: bool,
    has_classical_relay: bool,
    has_quantum_relay: bool,
}

impl Circuit {
    /// Create a circuit with `num_qubits` qubits and a generated identifier.
    pub fn new(num_qubits: u32) -> Self {
        Self::with_size(generate_id(), num_qubits, 0)
    }

    /// Create a circuit with an explicit identifier.
    pub fn with_id(id: impl Into<String>, num_qubits: u32) -> Self {
        Self::with_size(id, num_qubits, 0)
    }

    /// Create a circuit with qubits and classical bits.
    ///
    /// An empty identifier is replaced by a generated one.
    pub fn with_size(id: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        let id = id.into();
        let mut circuit = Self {
            id: if id.is_empty() { generate_id() } else { id },
            quantum_registers: vec![],
            classical_registers: vec![],
            instructions: vec![],
            num_qubits: 0,
            num_clbits: 0,
            is_parametric: false,
            has_classical_relay: false,
            has_quantum_relay: false,
        };
        if num_qubits > 0 {
            circuit.quantum_registers.push(leading(DEFAULT_QREG, num_qubits));
            circuit.num_qubits = num_qubits;
        }
        if num_clbits > 0 {
            circuit.classical_registers.push(leading(DEFAULT_CREG, num_clbits));
            circuit.num_clbits = num_clbits;
        }
        circuit
    }

    /// Append a register of `size` fresh indices.
    ///
    /// If `name` is already taken for this kind, a numeric suffix is added
    /// and a warning is logged. Returns the name actually used, or
    /// [`IrError::RegisterOverflow`] if the indices would not fit in `u32`.
    pub fn add_register(
        &mut self,
        kind: RegisterKind,
        name: impl Into<String>,
        size: u32,
    ) -> IrResult<String> {
        let base = name.into();
        let (registers, next) = match kind {
            RegisterKind::Quantum => (&mut self.quantum_registers, &mut self.num_qubits),
            RegisterKind::Classical => (&mut self.classical_registers, &mut self.num_clbits),
        };
        let mut chosen = base.clone();
        let mut suffix = 1;
        while registers.iter().any(|r| r.name == chosen) {
            chosen = format!("{base}_{suffix}");
            suffix += 1;
        }
        let register = Register::contiguous(chosen.clone(), *next, size).ok_or_else(|| {
            IrError::RegisterOverflow {
                kind,
                name: base.clone(),
                size,
            }
        })?;
        if chosen != base {
            warn!(
                circuit = %self.id,
                "{kind} register '{base}' already exists, renamed to '{chosen}'"
            );
        }

        registers.push(register);
        *next += size;
        Ok(chosen)
    }

    /// Validate and append an instruction.
    pub fn add_instruction(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        let spec = validate(&instruction, self.num_qubits, self.num_clbits, &self.id)?;

        if instruction.is_parametric() {
            self.is_parametric = true;
        }
        match spec.relay.map(|r| r.kind) {
            Some(RelayKind::Classical) => self.has_classical_relay = true,
            Some(RelayKind::Quantum) => self.has_quantum_relay = true,
            None => {}
        }

        self.instructions.push(instruction);
        Ok(self)
    }

    fn gate(
        &mut self,
        name: &str,
        qubits: impl IntoIterator<Item = QubitId>,
        params: Vec<f64>,
    ) -> IrResult<&mut Self> {
        self.add_instruction(Instruction::new(name, qubits).with_params(params))
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply identity gate.
    pub fn identity(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("id", [qubit], vec![])
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("x", [qubit], vec![])
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("y", [qubit], vec![])
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("z", [qubit], vec![])
    }

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("h", [qubit], vec![])
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("s", [qubit], vec![])
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("sdg", [qubit], vec![])
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("t", [qubit], vec![])
    }

    /// Apply T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("tdg", [qubit], vec![])
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("sx", [qubit], vec![])
    }

    /// Apply sqrt(X)-dagger gate.
    pub fn sxdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("sxdg", [qubit], vec![])
    }

    /// Apply Rx rotation gate.
    pub fn rx(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("rx", [qubit], vec![theta])
    }

    /// Apply Ry rotation gate.
    pub fn ry(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("ry", [qubit], vec![theta])
    }

    /// Apply Rz rotation gate.
    pub fn rz(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("rz", [qubit], vec![theta])
    }

    /// Apply phase gate.
    pub fn p(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("p", [qubit], vec![theta])
    }

    /// Apply U2(φ, λ) gate.
    pub fn u2(&mut self, phi: f64, lambda: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("u2", [qubit], vec![phi, lambda])
    }

    /// Apply R(θ, φ) rotation about an axis in the XY plane.
    pub fn r(&mut self, theta: f64, phi: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("r", [qubit], vec![theta, phi])
    }

    /// Apply universal U(θ, φ, λ) gate.
    pub fn u(&mut self, theta: f64, phi: f64, lambda: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("u", [qubit], vec![theta, phi, lambda])
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    /// Apply CNOT (CX) gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("cx", [control, target], vec![])
    }

    /// Apply CY gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("cy", [control, target], vec![])
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("cz", [control, target], vec![])
    }

    /// Apply controlled-Hadamard gate.
    pub fn ch(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("ch", [control, target], vec![])
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate("swap", [q1, q2], vec![])
    }

    /// Apply iSWAP gate.
    pub fn iswap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate("iswap", [q1, q2], vec![])
    }

    /// Apply echoed cross-resonance gate.
    pub fn ecr(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate("ecr", [q1, q2], vec![])
    }

    /// Apply controlled-Rx gate.
    pub fn crx(&mut self, theta: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("crx", [control, target], vec![theta])
    }

    /// Apply controlled-Ry gate.
    pub fn cry(&mut self, theta: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("cry", [control, target], vec![theta])
    }

    /// Apply controlled-Rz gate.
    pub fn crz(&mut self, theta: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("crz", [control, target], vec![theta])
    }

    /// Apply controlled-phase gate.
    pub fn cp(&mut self, theta: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("cp", [control, target], vec![theta])
    }

    /// Apply RXX (XX rotation) gate.
    pub fn rxx(&mut self, theta: f64, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate("rxx", [q1, q2], vec![theta])
    }

    /// Apply RYY (YY rotation) gate.
    pub fn ryy(&mut self, theta: f64, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate("ryy", [q1, q2], vec![theta])
    }

    /// Apply RZZ (ZZ rotation) gate.
    pub fn rzz(&mut self, theta: f64, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate("rzz", [q1, q2], vec![theta])
    }

    /// Apply RZX (ZX rotation) gate.
    pub fn rzx(&mut self, theta: f64, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate("rzx", [q1, q2], vec![theta])
    }

    /// Apply controlled-U(θ, φ, λ, γ) gate.
    pub fn cu(
        &mut self,
        params: [f64; 4],
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.gate("cu", [control, target], params.to_vec())
    }

    // =========================================================================
    // Three-qubit gates
    // =========================================================================

    /// Apply Toffoli (CCX) gate.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("ccx", [c1, c2, target], vec![])
    }

    /// Apply Fredkin (CSWAP) gate.
    pub fn cswap(&mut self, control: QubitId, t1: QubitId, t2: QubitId) -> IrResult<&mut Self> {
        self.gate("cswap", [control, t1, t2], vec![])
    }

    /// Apply doubly-controlled Z gate.
    pub fn ccz(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate("ccz", [c1, c2, target], vec![])
    }

    // =========================================================================
    // Matrix gates
    // =========================================================================

    /// Apply an arbitrary unitary given as a dense matrix.
    ///
    /// The number of qubits must equal `log2` of the matrix side.
    pub fn unitary(
        &mut self,
        matrix: Matrix,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.add_instruction(Instruction::new(UNITARY, qubits).with_matrix(matrix))
    }

    // =========================================================================
    // Non-unitary operations
    // =========================================================================

    /// Measure a qubit into a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.add_instruction(Instruction::new("measure", [qubit]).with_clbits([clbit]))
    }

    /// Reset a qubit to |0⟩.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate("reset", [qubit], vec![])
    }

    /// Measure every qubit into a fresh classical register.
    ///
    /// Adds a register sized to the current qubit count and one measurement
    /// per qubit, in qubit order.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        if self.num_qubits == 0 {
            return Ok(self);
        }
        let start = self.num_clbits;
        self.add_register(RegisterKind::Classical, MEASURE_ALL_CREG, self.num_qubits)?;
        for q in 0..self.num_qubits {
            self.measure(QubitId(q), ClbitId(start + q))?;
        }
        Ok(self)
    }

    // =========================================================================
    // Classically-conditioned gates
    // =========================================================================

    /// Apply `gate` to `targets` if an in-line measurement of `control` reads 1.
    pub fn c_if(
        &mut self,
        gate: &str,
        control: QubitId,
        targets: impl IntoIterator<Item = QubitId>,
        params: impl Into<Vec<f64>>,
    ) -> IrResult<&mut Self> {
        let qubits = std::iter::once(control).chain(targets);
        self.add_instruction(
            Instruction::new(format!("{CONDITIONAL_PREFIX}{gate}"), qubits).with_params(params),
        )
    }

    /// Apply a matrix to `targets` if an in-line measurement of `control` reads 1.
    pub fn c_if_unitary(
        &mut self,
        matrix: Matrix,
        control: QubitId,
        targets: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        let qubits = std::iter::once(control).chain(targets);
        self.add_instruction(
            Instruction::new(format!("{CONDITIONAL_PREFIX}{UNITARY}"), qubits).with_matrix(matrix),
        )
    }

    // =========================================================================
    // Relays
    // =========================================================================

    /// Measure `qubit` and relay the outcome to `peer`.
    pub fn measure_and_send(
        &mut self,
        qubit: QubitId,
        peer: impl Into<PeerRef>,
    ) -> IrResult<&mut Self> {
        self.add_instruction(Instruction::new("measure_and_send", [qubit]).with_peer(peer))
    }

    /// Receive a relayed outcome from `peer` into `clbit`.
    pub fn recv(&mut self, clbit: ClbitId, peer: impl Into<PeerRef>) -> IrResult<&mut Self> {
        self.add_instruction(
            Instruction::new("recv", std::iter::empty::<QubitId>())
                .with_clbits([clbit])
                .with_peer(peer),
        )
    }

    /// Apply `gate` to `targets` if the outcome relayed from `peer` is 1.
    pub fn remote_c_if(
        &mut self,
        gate: &str,
        targets: impl IntoIterator<Item = QubitId>,
        params: impl Into<Vec<f64>>,
        peer: impl Into<PeerRef>,
    ) -> IrResult<&mut Self> {
        self.add_instruction(
            Instruction::new(format!("{REMOTE_CONDITIONAL_PREFIX}{gate}"), targets)
                .with_params(params)
                .with_peer(peer),
        )
    }

    /// Apply a matrix to `targets` if the outcome relayed from `peer` is 1.
    ///
    /// The relayed bit is loaded into `control` (reset, then flipped on 1),
    /// which then gates the matrix.
    pub fn remote_c_if_unitary(
        &mut self,
        matrix: Matrix,
        control: QubitId,
        targets: impl IntoIterator<Item = QubitId>,
        peer: impl Into<PeerRef>,
    ) -> IrResult<&mut Self> {
        let qubits = std::iter::once(control).chain(targets);
        self.add_instruction(
            Instruction::new(format!("{REMOTE_CONDITIONAL_PREFIX}{UNITARY}"), qubits)
                .with_matrix(matrix)
                .with_peer(peer),
        )
    }

    /// Relay the state of `qubit` to `peer`.
    pub fn qsend(&mut self, qubit: QubitId, peer: impl Into<PeerRef>) -> IrResult<&mut Self> {
        self.add_instruction(Instruction::new("qsend", [qubit]).with_peer(peer))
    }

    /// Receive a qubit state relayed from `peer` into `qubit`.
    pub fn qrecv(&mut self, qubit: QubitId, peer: impl Into<PeerRef>) -> IrResult<&mut Self> {
        self.add_instruction(Instruction::new("qrecv", [qubit]).with_peer(peer))
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// All tunable parameters in instruction order.
    pub fn parameters(&self) -> Vec<f64> {
        crate::snapshot::collect_parameters(&self.instructions)
    }

    /// Replace every tunable parameter, in instruction order.
    pub fn assign_parameters(&mut self, values: &[f64]) -> IrResult<()> {
        crate::snapshot::bind_parameters(&self.id, &mut self.instructions, values)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Freeze the circuit into its serializable form.
    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            id: self.id.clone(),
            instructions: self.instructions.clone(),
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            quantum_registers: self.quantum_registers.clone(),
            classical_registers: self.classical_registers.clone(),
            is_parametric: self.is_parametric,
            is_distributed: self.is_distributed(),
        }
    }

    /// Rebuild a circuit from a snapshot, re-validating every instruction.
    pub fn from_snapshot(snapshot: &CircuitSnapshot) -> IrResult<Self> {
        check_layout(RegisterKind::Quantum, &snapshot.quantum_registers, snapshot.num_qubits)?;
        check_layout(
            RegisterKind::Classical,
            &snapshot.classical_registers,
            snapshot.num_clbits,
        )?;
        if snapshot.id.is_empty() {
            return Err(IrError::InvalidSnapshot("empty circuit id".into()));
        }

        let mut circuit = Self::with_size(snapshot.id.clone(), 0, 0);
        circuit.quantum_registers = snapshot.quantum_registers.clone();
        circuit.classical_registers = snapshot.classical_registers.clone();
        circuit.num_qubits = snapshot.num_qubits;
        circuit.num_clbits = snapshot.num_clbits;
        for instruction in &snapshot.instructions {
            circuit.add_instruction(instruction.clone())?;
        }
        Ok(circuit)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Get the number of classical bits.
    pub fn num_clbits(&self) -> u32 {
        self.num_clbits
    }

    /// Get the instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Get the quantum registers in creation order.
    pub fn quantum_registers(&self) -> &[Register] {
        &self.quantum_registers
    }

    /// Get the classical registers in creation order.
    pub fn classical_registers(&self) -> &[Register] {
        &self.classical_registers
    }

    /// Look up a register by kind and name.
    pub fn register(&self, kind: RegisterKind, name: &str) -> Option<&Register> {
        let registers = match kind {
            RegisterKind::Quantum => &self.quantum_registers,
            RegisterKind::Classical => &self.classical_registers,
        };
        registers.iter().find(|r| r.name == name)
    }

    /// Whether any instruction carries tunable parameters.
    pub fn is_parametric(&self) -> bool {
        self.is_parametric
    }

    /// Whether any instruction relays to another circuit.
    pub fn is_distributed(&self) -> bool {
        self.has_classical_relay || self.has_quantum_relay
    }

    /// Whether any instruction relays a classical outcome.
    pub fn has_classical_relay(&self) -> bool {
        self.has_classical_relay
    }

    /// Whether any instruction relays a qubit state.
    pub fn has_quantum_relay(&self) -> bool {
        self.has_quantum_relay
    }

    /// Identifiers of every circuit this one relays with.
    pub fn peers(&self) -> BTreeSet<&str> {
        self.instructions.iter().filter_map(Instruction::peer).collect()
    }
}

impl From<&Circuit> for PeerRef {
    fn from(circuit: &Circuit) -> Self {
        PeerRef::from(circuit.id())
    }
}

/// The first register of a kind, starting at index 0.
fn leading(name: &str, size: u32) -> Register {
    Register {
        name: name.to_string(),
        indices: (0..size).collect(),
    }
}

fn generate_id() -> String {
    format!("circuit-{}", Uuid::new_v4().simple())
}

/// Registers of one kind must tile `0..total` contiguously, in order.
fn check_layout(kind: RegisterKind, registers: &[Register], total: u32) -> IrResult<()> {
    let mut next = 0u64;
    for register in registers {
        for &index in &register.indices {
            if u64::from(index) != next {
                return Err(IrError::InvalidSnapshot(format!(
                    "{kind} register '{}' has index {index}, expected {next}",
                    register.name
                )));
            }
            next += 1;
        }
    }
    if next != u64::from(total) {
        return Err(IrError::InvalidSnapshot(format!(
            "{kind} registers cover {next} indices but the circuit declares {total}"
        )));
    }
    let mut names = BTreeSet::new();
    if let Some(dup) = registers.iter().find(|r| !names.insert(r.name.as_str())) {
        return Err(IrError::InvalidSnapshot(format!(
            "duplicate {kind} register '{}'",
            dup.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Malformed;
    use std::f64::consts::PI;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_new_circuit() {
        let circuit = Circuit::with_id("test", 3);
        assert_eq!(circuit.id(), "test");
        assert_eq!(circuit.num_qubits(), 3);
        assert_eq!(circuit.num_clbits(), 0);
        assert_eq!(circuit.quantum_registers()[0].indices, vec![0, 1, 2]);
        assert!(circuit.classical_registers().is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Circuit::new(1);
        let b = Circuit::new(1);
        assert!(a.id().starts_with("circuit-"));
        assert_ne!(a.id(), b.id());
        assert!(!Circuit::with_size("", 1, 0).id().is_empty());
    }

    /// Collects formatted log output for the current thread.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn warnings(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|line| line.contains("WARN"))
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_logs() -> (Captured, tracing::subscriber::DefaultGuard) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (captured, guard)
    }

    #[test]
    fn test_add_register_renames_on_collision() {
        let (logs, _guard) = capture_logs();
        let mut circuit = Circuit::with_size("test", 2, 2);
        assert!(logs.warnings().is_empty());

        let name = circuit.add_register(RegisterKind::Quantum, "q", 2).unwrap();
        assert_eq!(name, "q_1");
        let warnings = logs.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("renamed to 'q_1'"), "{warnings:?}");

        let again = circuit.add_register(RegisterKind::Quantum, "q", 1).unwrap();
        assert_eq!(again, "q_2");
        assert_eq!(logs.warnings().len(), 2);

        assert_eq!(circuit.num_qubits(), 5);
        let reg = circuit.register(RegisterKind::Quantum, "q_1").unwrap();
        assert_eq!(reg.indices, vec![2, 3]);

        // Classical and quantum names live in separate spaces.
        let c = circuit.add_register(RegisterKind::Classical, "q", 1).unwrap();
        assert_eq!(c, "q");
        assert_eq!(circuit.num_clbits(), 3);
        assert_eq!(logs.warnings().len(), 2);
    }

    #[test]
    fn test_add_register_overflow_is_an_error() {
        let mut circuit = Circuit::with_size("test", 2, 0);
        let before = circuit.clone();

        let err = circuit
            .add_register(RegisterKind::Quantum, "huge", u32::MAX)
            .unwrap_err();
        assert_eq!(
            err,
            IrError::RegisterOverflow {
                kind: RegisterKind::Quantum,
                name: "huge".into(),
                size: u32::MAX,
            }
        );
        assert_eq!(circuit, before);
        assert_eq!(circuit.num_qubits(), 2);
    }

    #[test]
    fn test_identity_gate() {
        let mut circuit = Circuit::with_id("idle", 1);
        circuit.identity(QubitId(0)).unwrap();
        assert_eq!(circuit.instructions()[0].name, "id");
        assert_eq!(circuit.id(), "idle");
        assert!(circuit.identity(QubitId(1)).is_err());
    }

    #[test]
    fn test_rejected_instruction_leaves_circuit_untouched() {
        let mut circuit = Circuit::with_id("test", 2);
        circuit.h(QubitId(0)).unwrap();
        let before = circuit.clone();

        let err = circuit.cx(QubitId(0), QubitId(7)).unwrap_err();
        assert!(matches!(
            err,
            IrError::MalformedInstruction {
                reason: Malformed::QubitOutOfRange { .. },
                ..
            }
        ));
        assert_eq!(circuit, before);
    }

    #[test]
    fn test_parametric_flag() {
        let mut circuit = Circuit::with_id("test", 2);
        circuit.h(QubitId(0)).unwrap();
        assert!(!circuit.is_parametric());

        let x = vec![
            vec![num_complex::Complex64::new(0.0, 0.0), num_complex::Complex64::new(1.0, 0.0)],
            vec![num_complex::Complex64::new(1.0, 0.0), num_complex::Complex64::new(0.0, 0.0)],
        ];
        circuit.unitary(x, [QubitId(1)]).unwrap();
        assert!(!circuit.is_parametric());

        circuit.rx(PI / 2.0, QubitId(0)).unwrap();
        assert!(circuit.is_parametric());
        assert_eq!(circuit.parameters(), vec![PI / 2.0]);
    }

    #[test]
    fn test_measure_all() {
        let mut circuit = Circuit::with_size("test", 3, 1);
        circuit.h(QubitId(0)).unwrap().measure_all().unwrap();

        assert_eq!(circuit.num_clbits(), 4);
        let meas = circuit
            .register(RegisterKind::Classical, MEASURE_ALL_CREG)
            .unwrap();
        assert_eq!(meas.indices, vec![1, 2, 3]);

        let measures: Vec<_> = circuit
            .instructions()
            .iter()
            .filter(|i| i.is_measure())
            .map(|i| (i.qubits[0].0, i.clbits[0].0))
            .collect();
        assert_eq!(measures, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_relay_builders_normalize_peers() {
        let bob = Circuit::with_id("bob", 1);
        let mut alice = Circuit::with_size("alice", 2, 1);
        alice
            .h(QubitId(0))
            .unwrap()
            .measure_and_send(QubitId(0), &bob)
            .unwrap()
            .qsend(QubitId(1), "bob")
            .unwrap()
            .recv(ClbitId(0), String::from("carol"))
            .unwrap();

        assert!(alice.is_distributed());
        assert!(alice.has_classical_relay());
        assert!(alice.has_quantum_relay());
        assert_eq!(alice.peers().into_iter().collect::<Vec<_>>(), vec!["bob", "carol"]);
        assert_eq!(alice.instructions()[1].circuits, vec!["bob".to_string()]);
    }

    #[test]
    fn test_conditional_builders() {
        let mut circuit = Circuit::with_id("test", 3);
        circuit
            .c_if("cx", QubitId(0), [QubitId(1), QubitId(2)], vec![])
            .unwrap()
            .remote_c_if("rz", [QubitId(2)], vec![0.3], "peer")
            .unwrap();

        assert_eq!(circuit.instructions()[0].name, "c_if_cx");
        assert_eq!(circuit.instructions()[1].name, "d_c_if_rz");
        assert!(circuit.is_parametric());
        assert!(circuit.has_classical_relay());

        assert!(matches!(
            circuit.c_if("measure", QubitId(0), [QubitId(1)], vec![]),
            Err(IrError::UnknownGate(_))
        ));
    }

    #[test]
    fn test_assign_parameters() {
        let mut circuit = Circuit::with_id("test", 1);
        circuit
            .rx(0.1, QubitId(0))
            .unwrap()
            .u(0.2, 0.3, 0.4, QubitId(0))
            .unwrap();

        circuit.assign_parameters(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(circuit.parameters(), vec![1.0, 2.0, 3.0, 4.0]);

        assert!(matches!(
            circuit.assign_parameters(&[1.0]),
            Err(IrError::ParameterMismatch {
                expected: 4,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_snapshot_layout_is_checked() {
        let mut snapshot = Circuit::with_size("test", 2, 1).snapshot();
        snapshot.quantum_registers[0].indices = vec![1, 0];
        assert!(matches!(
            Circuit::from_snapshot(&snapshot),
            Err(IrError::InvalidSnapshot(_))
        ));
    }
}

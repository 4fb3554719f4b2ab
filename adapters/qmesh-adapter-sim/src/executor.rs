//! Joint shot-by-shot execution of a group of circuits.
//!
//! Every circuit of a group is laid out on one shared statevector, side by
//! side, followed by one channel qubit per quantum send. Circuits advance in
//! round-robin order, each until it finishes or blocks on a receive whose
//! value has not been produced yet. A full pass without progress is a
//! deadlock.
//!
//! Classical relays travel through FIFO queues keyed by (sender, receiver).
//! A quantum send swaps the sent qubit into a fresh channel qubit; the
//! matching receive resets the destination qubit and swaps the channel in.

use std::collections::{BTreeMap, VecDeque};

use qmesh_hal::{ExecMethod, RunConfig, WireRequest};
use qmesh_ir::catalog::{CONDITIONAL_PREFIX, REMOTE_CONDITIONAL_PREFIX, UNITARY};
use qmesh_ir::{Instruction, validate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::statevector::Statevector;

/// Default ceiling on the joint state size.
pub const DEFAULT_MAX_QUBITS: usize = 24;

/// Counts of one circuit, keyed by packed hexadecimal outcome.
pub type RawCounts = BTreeMap<String, u64>;

/// Runs groups of requests on a shared statevector.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    max_qubits: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUBITS)
    }
}

/// Outcome of trying to execute one instruction.
enum Step {
    Done,
    Blocked,
}

/// Static placement of a group on the joint register.
struct Layout<'a> {
    requests: &'a [&'a WireRequest],
    offsets: Vec<usize>,
    index: FxHashMap<&'a str, usize>,
    channels: usize,
    total: usize,
}

/// Per-shot mutable state.
struct Shot {
    state: Statevector,
    pcs: Vec<usize>,
    clbits: Vec<Vec<bool>>,
    classical: FxHashMap<(usize, usize), VecDeque<bool>>,
    quantum: FxHashMap<(usize, usize), VecDeque<usize>>,
    next_channel: usize,
}

impl Executor {
    /// Create an executor that refuses groups needing more than `max_qubits`.
    pub fn new(max_qubits: usize) -> Self {
        Self { max_qubits }
    }

    /// Qubit ceiling.
    pub fn max_qubits(&self) -> usize {
        self.max_qubits
    }

    /// Run a group of requests jointly.
    ///
    /// Shots, seed and method come from `config`. Returns one count map per
    /// request, in input order.
    pub fn run(&self, requests: &[&WireRequest], config: &RunConfig) -> SimResult<Vec<RawCounts>> {
        match config.method {
            ExecMethod::Automatic | ExecMethod::Statevector => {}
            other => return Err(SimError::UnsupportedMethod(other)),
        }
        let layout = self.layout(requests)?;
        debug!(
            circuits = requests.len(),
            qubits = layout.total,
            channels = layout.channels,
            shots = config.shots,
            "Running group"
        );

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut counts = vec![RawCounts::new(); requests.len()];
        for _ in 0..config.shots {
            let shot = layout.run_shot(&mut rng)?;
            for (map, bits) in counts.iter_mut().zip(&shot.clbits) {
                *map.entry(pack_hex(bits)).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn layout<'a>(&self, requests: &'a [&'a WireRequest]) -> SimResult<Layout<'a>> {
        let mut index = FxHashMap::default();
        for (i, request) in requests.iter().enumerate() {
            if index.insert(request.id.as_str(), i).is_some() {
                return Err(SimError::InvalidRequest(format!(
                    "circuit '{}' appears twice in one run",
                    request.id
                )));
            }
        }

        let mut offsets = Vec::with_capacity(requests.len());
        let mut total = 0usize;
        let mut channels = 0usize;
        for request in requests {
            for instruction in &request.instructions {
                validate(
                    instruction,
                    request.num_qubits,
                    request.num_clbits,
                    &request.id,
                )
                .map_err(|e| SimError::InvalidRequest(e.to_string()))?;
                if let Some(peer) = instruction.peer() {
                    if !index.contains_key(peer) {
                        return Err(SimError::UnknownPeer {
                            circuit: request.id.clone(),
                            peer: peer.to_string(),
                        });
                    }
                }
                if instruction.name == "qsend" {
                    channels += 1;
                }
            }
            offsets.push(total);
            total += request.num_qubits as usize;
        }

        let needed = total + channels;
        if needed > self.max_qubits {
            return Err(SimError::TooManyQubits {
                needed,
                limit: self.max_qubits,
            });
        }

        Ok(Layout {
            requests,
            offsets,
            index,
            channels,
            total: needed,
        })
    }
}

impl Layout<'_> {
    fn run_shot(&self, rng: &mut StdRng) -> SimResult<Shot> {
        let mut shot = Shot {
            state: Statevector::new(self.total),
            pcs: vec![0; self.requests.len()],
            clbits: self
                .requests
                .iter()
                .map(|r| vec![false; r.num_clbits as usize])
                .collect(),
            classical: FxHashMap::default(),
            quantum: FxHashMap::default(),
            next_channel: self.total - self.channels,
        };

        loop {
            let mut progressed = false;
            let mut finished = true;
            for (r, request) in self.requests.iter().enumerate() {
                while let Some(instruction) = request.instructions.get(shot.pcs[r]) {
                    match self.step(r, instruction, &mut shot, rng)? {
                        Step::Done => {
                            shot.pcs[r] += 1;
                            progressed = true;
                        }
                        Step::Blocked => break,
                    }
                }
                finished &= shot.pcs[r] == request.instructions.len();
            }
            if finished {
                return Ok(shot);
            }
            if !progressed {
                return Err(SimError::Deadlock(self.blocked(&shot)));
            }
        }
    }

    fn step(
        &self,
        r: usize,
        instruction: &Instruction,
        shot: &mut Shot,
        rng: &mut StdRng,
    ) -> SimResult<Step> {
        let offset = self.offsets[r];
        let qubits: Vec<usize> = instruction
            .qubits
            .iter()
            .map(|q| offset + q.0 as usize)
            .collect();
        let peer = instruction.peer().and_then(|p| self.index.get(p).copied());
        let name = instruction.name.as_str();

        match (name, peer) {
            ("measure", _) => {
                let bit = shot.state.measure(qubits[0], rng);
                shot.clbits[r][instruction.clbits[0].0 as usize] = bit;
            }
            ("reset", _) => shot.state.reset(qubits[0], rng),
            ("measure_and_send", Some(p)) => {
                let bit = shot.state.measure(qubits[0], rng);
                shot.classical.entry((r, p)).or_default().push_back(bit);
            }
            ("recv", Some(p)) => {
                let Some(bit) = pop(&mut shot.classical, (p, r)) else {
                    return Ok(Step::Blocked);
                };
                shot.clbits[r][instruction.clbits[0].0 as usize] = bit;
            }
            ("qsend", Some(p)) => {
                let channel = shot.next_channel;
                shot.next_channel += 1;
                shot.state.swap(qubits[0], channel);
                shot.quantum.entry((r, p)).or_default().push_back(channel);
            }
            ("qrecv", Some(p)) => {
                let Some(channel) = pop(&mut shot.quantum, (p, r)) else {
                    return Ok(Step::Blocked);
                };
                shot.state.reset(qubits[0], rng);
                shot.state.swap(qubits[0], channel);
            }
            _ => {
                if let Some(base) = name.strip_prefix(REMOTE_CONDITIONAL_PREFIX) {
                    let Some(p) = peer else {
                        return Err(SimError::UnsupportedInstruction(name.to_string()));
                    };
                    let Some(bit) = pop(&mut shot.classical, (p, r)) else {
                        return Ok(Step::Blocked);
                    };
                    let targets = if base == UNITARY {
                        // The leading qubit holds the relayed bit.
                        shot.state.reset(qubits[0], rng);
                        if bit {
                            shot.state.apply_gate("x", &qubits[..1], &[], None)?;
                        }
                        &qubits[1..]
                    } else {
                        &qubits[..]
                    };
                    if bit {
                        self.apply(base, targets, instruction, shot)?;
                    }
                } else if let Some(base) = name.strip_prefix(CONDITIONAL_PREFIX) {
                    if shot.state.measure(qubits[0], rng) {
                        self.apply(base, &qubits[1..], instruction, shot)?;
                    }
                } else {
                    self.apply(name, &qubits, instruction, shot)?;
                }
            }
        }
        Ok(Step::Done)
    }

    fn apply(
        &self,
        name: &str,
        qubits: &[usize],
        instruction: &Instruction,
        shot: &mut Shot,
    ) -> SimResult<()> {
        shot.state.apply_gate(
            name,
            qubits,
            &instruction.params,
            instruction.matrix.as_ref(),
        )
    }

    fn blocked(&self, shot: &Shot) -> String {
        self.requests
            .iter()
            .enumerate()
            .filter_map(|(r, request)| {
                let instruction = request.instructions.get(shot.pcs[r])?;
                Some(format!(
                    "'{}' waits at {} from '{}'",
                    request.id,
                    instruction.name,
                    instruction.peer().unwrap_or("?")
                ))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn pop<T>(queues: &mut FxHashMap<(usize, usize), VecDeque<T>>, key: (usize, usize)) -> Option<T> {
    queues.get_mut(&key).and_then(VecDeque::pop_front)
}

/// Pack classical bits into a hexadecimal key, bit 0 least significant.
pub fn pack_hex(bits: &[bool]) -> String {
    let mut digits: String = bits
        .chunks(4)
        .rev()
        .map(|nibble| {
            let value = nibble
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, &b)| acc | (u32::from(b) << i));
            char::from_digit(value, 16).unwrap_or('0')
        })
        .collect::<String>()
        .trim_start_matches('0')
        .to_string();
    if digits.is_empty() {
        digits.push('0');
    }
    format!("0x{digits}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use qmesh_hal::ExecType;
    use qmesh_ir::{Circuit, ClbitId, QubitId};

    fn request(circuit: &Circuit) -> WireRequest {
        WireRequest::new(&circuit.snapshot(), &RunConfig::new(1), ExecType::Dynamic)
    }

    fn config(shots: u32) -> RunConfig {
        RunConfig::new(shots).with_seed(11)
    }

    #[test]
    fn test_pack_hex() {
        assert_eq!(pack_hex(&[]), "0x0");
        assert_eq!(pack_hex(&[false, false]), "0x0");
        assert_eq!(pack_hex(&[true]), "0x1");
        assert_eq!(pack_hex(&[false, true]), "0x2");
        assert_eq!(pack_hex(&[true, true, true, true, true]), "0x1f");
    }

    #[test]
    fn test_bell_counts() {
        let mut bell = Circuit::with_id("bell", 2);
        bell.h(QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .measure_all()
            .unwrap();
        let req = request(&bell);

        let counts = Executor::default().run(&[&req], &config(200)).unwrap();
        let map = &counts[0];
        assert_eq!(map.values().sum::<u64>(), 200);
        assert!(map.keys().all(|k| k == "0x0" || k == "0x3"));
    }

    #[test]
    fn test_inline_conditional() {
        let mut circuit = Circuit::with_size("cif", 2, 1);
        circuit
            .x(QubitId(0))
            .unwrap()
            .c_if("x", QubitId(0), [QubitId(1)], vec![])
            .unwrap()
            .measure(QubitId(1), ClbitId(0))
            .unwrap();
        let req = request(&circuit);

        let counts = Executor::default().run(&[&req], &config(20)).unwrap();
        assert_eq!(counts[0].get("0x1"), Some(&20));
    }

    #[test]
    fn test_classical_relay_and_recv() {
        let mut a = Circuit::with_id("a", 1);
        a.x(QubitId(0))
            .unwrap()
            .measure_and_send(QubitId(0), "b")
            .unwrap()
            .measure_and_send(QubitId(0), "b")
            .unwrap();
        let mut b = Circuit::with_size("b", 1, 1);
        b.recv(ClbitId(0), "a")
            .unwrap()
            .remote_c_if("x", [QubitId(0)], vec![], "a")
            .unwrap()
            .measure_all()
            .unwrap();
        let (ra, rb) = (request(&a), request(&b));

        // b listed first: it blocks until a runs.
        let counts = Executor::default().run(&[&rb, &ra], &config(10)).unwrap();
        assert_eq!(counts[0].get("0x3"), Some(&10));
        assert_eq!(counts[1].get("0x0"), Some(&10));
    }

    #[test]
    fn test_remote_conditional_unitary_loads_the_bit() {
        let x = vec![
            vec![Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
            vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
        ];
        let mut a = Circuit::with_id("a", 1);
        a.x(QubitId(0))
            .unwrap()
            .measure_and_send(QubitId(0), "b")
            .unwrap();
        let mut b = Circuit::with_id("b", 2);
        b.remote_c_if_unitary(x, QubitId(1), [QubitId(0)], "a")
            .unwrap()
            .measure_all()
            .unwrap();
        let (ra, rb) = (request(&a), request(&b));

        // Target flipped (bit 0), control holds the relayed 1 (bit 1).
        let counts = Executor::default().run(&[&ra, &rb], &config(10)).unwrap();
        assert_eq!(counts[1].get("0x3"), Some(&10));
    }

    #[test]
    fn test_quantum_relay_moves_state() {
        let mut a = Circuit::with_id("a", 1);
        a.x(QubitId(0)).unwrap().qsend(QubitId(0), "b").unwrap();
        a.measure_all().unwrap();
        let mut b = Circuit::with_id("b", 1);
        b.qrecv(QubitId(0), "a").unwrap().measure_all().unwrap();
        let (ra, rb) = (request(&a), request(&b));

        let counts = Executor::default().run(&[&ra, &rb], &config(10)).unwrap();
        assert_eq!(counts[0].get("0x0"), Some(&10));
        assert_eq!(counts[1].get("0x1"), Some(&10));
    }

    #[test]
    fn test_mutual_wait_is_a_deadlock() {
        let mut a = Circuit::with_size("a", 1, 1);
        a.recv(ClbitId(0), "b")
            .unwrap()
            .measure_and_send(QubitId(0), "b")
            .unwrap();
        let mut b = Circuit::with_size("b", 1, 1);
        b.recv(ClbitId(0), "a")
            .unwrap()
            .measure_and_send(QubitId(0), "a")
            .unwrap();
        let (ra, rb) = (request(&a), request(&b));

        let err = Executor::default().run(&[&ra, &rb], &config(1)).unwrap_err();
        assert!(matches!(err, SimError::Deadlock(ref msg) if msg.contains("'a'")));
    }

    #[test]
    fn test_missing_peer() {
        let mut a = Circuit::with_id("a", 1);
        a.measure_and_send(QubitId(0), "elsewhere").unwrap();
        let ra = request(&a);
        assert!(matches!(
            Executor::default().run(&[&ra], &config(1)),
            Err(SimError::UnknownPeer { .. })
        ));
    }

    #[test]
    fn test_qubit_limit() {
        let big = Circuit::with_id("big", 6);
        let req = request(&big);
        assert!(matches!(
            Executor::new(4).run(&[&req], &config(1)),
            Err(SimError::TooManyQubits { needed: 6, limit: 4 })
        ));
    }

    #[test]
    fn test_density_matrix_rejected() {
        let circuit = Circuit::with_id("c", 1);
        let req = request(&circuit);
        let cfg = config(1).with_method(ExecMethod::DensityMatrix);
        assert!(matches!(
            Executor::default().run(&[&req], &cfg),
            Err(SimError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_tampered_request_rejected() {
        let circuit = Circuit::with_id("c", 1);
        let mut req = request(&circuit);
        req.instructions.push(Instruction::new("x", [QubitId(5)]));
        assert!(matches!(
            Executor::default().run(&[&req], &config(1)),
            Err(SimError::InvalidRequest(_))
        ));
    }
}

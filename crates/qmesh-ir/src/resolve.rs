//! Static dependency resolution across an execution batch.
//!
//! Every receive-type instruction (`recv`, `d_c_if_*`, `qrecv`) must be fed by
//! a send of the same relay kind in the circuit it names. The resolver only
//! matches identifiers; it never looks at instruction order or timing.

use std::collections::BTreeSet;

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::RelayKind;
use crate::circuit::Circuit;
use crate::error::{IrError, IrResult};
use crate::instruction::Instruction;
use crate::snapshot::CircuitSnapshot;

/// Anything the resolver can read a circuit id and instructions from.
pub trait CircuitView {
    /// Circuit identifier.
    fn circuit_id(&self) -> &str;
    /// Instructions in program order.
    fn instructions(&self) -> &[Instruction];
}

impl CircuitView for Circuit {
    fn circuit_id(&self) -> &str {
        self.id()
    }

    fn instructions(&self) -> &[Instruction] {
        Circuit::instructions(self)
    }
}

impl CircuitView for CircuitSnapshot {
    fn circuit_id(&self) -> &str {
        &self.id
    }

    fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl<T: CircuitView + ?Sized> CircuitView for &T {
    fn circuit_id(&self) -> &str {
        (**self).circuit_id()
    }

    fn instructions(&self) -> &[Instruction] {
        (**self).instructions()
    }
}

/// How to treat sends that nothing in the batch receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolvePolicy {
    /// Log a warning and report them in [`Resolution::dangling_sends`].
    #[default]
    Lenient,
    /// Fail with [`IrError::DanglingSend`].
    Strict,
}

/// `source` must relay a value of `kind` to `sink`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DependencyEdge {
    /// Sending circuit.
    pub source: String,
    /// Receiving circuit.
    pub sink: String,
    /// What is relayed.
    pub kind: RelayKind,
}

/// A send with no matching receive in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingSend {
    /// Circuit holding the send.
    pub circuit: String,
    /// Position of the send in its circuit.
    pub position: usize,
    /// Instruction name.
    pub gate: String,
    /// Declared sink.
    pub peer: String,
}

/// Outcome of resolving a batch.
#[derive(Debug, Clone)]
pub struct Resolution {
    edges: Vec<DependencyEdge>,
    dangling_sends: Vec<DanglingSend>,
    graph: DiGraph<String, RelayKind>,
}

impl Resolution {
    /// One edge per (source, sink, kind), in the order receives were found.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Sends that nothing in the batch receives.
    pub fn dangling_sends(&self) -> &[DanglingSend] {
        &self.dangling_sends
    }

    /// Dependency graph with one node per circuit, in batch order.
    pub fn graph(&self) -> &DiGraph<String, RelayKind> {
        &self.graph
    }

    /// Whether any circuit in the batch depends on another.
    pub fn is_distributed(&self) -> bool {
        !self.edges.is_empty() || !self.dangling_sends.is_empty()
    }

    /// Edges whose sink is `circuit`.
    pub fn incoming<'a>(&'a self, circuit: &'a str) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges.iter().filter(move |e| e.sink == circuit)
    }
}

/// Resolve a batch with [`ResolvePolicy::Lenient`].
pub fn resolve<C: CircuitView>(batch: &[C]) -> IrResult<Resolution> {
    resolve_with(batch, ResolvePolicy::default())
}

/// Resolve a batch, deriving its dependency edges.
///
/// Fails on the first receive whose peer is missing from the batch or never
/// sends it a value of the right kind. Receives are checked before sends, in
/// batch order then instruction order.
pub fn resolve_with<C: CircuitView>(batch: &[C], policy: ResolvePolicy) -> IrResult<Resolution> {
    let mut graph = DiGraph::new();
    let mut nodes: FxHashMap<&str, NodeIndex> = FxHashMap::default();
    for circuit in batch {
        let id = circuit.circuit_id();
        if nodes.contains_key(id) {
            return Err(IrError::DuplicateCircuit(id.to_string()));
        }
        nodes.insert(id, graph.add_node(id.to_string()));
    }

    let sends = relay_ends(batch, true);
    let receives = relay_ends(batch, false);

    let mut edges = Vec::new();
    let mut seen = BTreeSet::new();
    for circuit in batch {
        let sink = circuit.circuit_id();
        for (position, instruction) in circuit.instructions().iter().enumerate() {
            let Some((kind, source)) = receive_end(instruction) else {
                continue;
            };
            let unresolved = |detail: String| IrError::UnresolvedRelay {
                circuit: sink.to_string(),
                position,
                gate: instruction.name.clone(),
                peer: source.to_string(),
                detail,
            };
            if !nodes.contains_key(source) {
                return Err(unresolved("which is not in the batch".into()));
            }
            if !sends.contains(&(source, sink, kind)) {
                return Err(unresolved(format!("which never sends it a {kind}")));
            }

            let edge = DependencyEdge {
                source: source.to_string(),
                sink: sink.to_string(),
                kind,
            };
            if seen.insert(edge.clone()) {
                graph.add_edge(nodes[source], nodes[sink], kind);
                edges.push(edge);
            }
        }
    }

    let mut dangling_sends = Vec::new();
    for circuit in batch {
        let source = circuit.circuit_id();
        for (position, instruction) in circuit.instructions().iter().enumerate() {
            let Some((kind, sink)) = send_end(instruction) else {
                continue;
            };
            if receives.contains(&(source, sink, kind)) {
                continue;
            }
            let dangling = DanglingSend {
                circuit: source.to_string(),
                position,
                gate: instruction.name.clone(),
                peer: sink.to_string(),
            };
            match policy {
                ResolvePolicy::Strict => {
                    return Err(IrError::DanglingSend {
                        circuit: dangling.circuit,
                        position,
                        gate: dangling.gate,
                        peer: dangling.peer,
                    });
                }
                ResolvePolicy::Lenient => {
                    warn!(
                        circuit = %source,
                        position,
                        gate = %instruction.name,
                        peer = %sink,
                        "send has no matching receive in this batch"
                    );
                    dangling_sends.push(dangling);
                }
            }
        }
    }

    debug!(
        circuits = batch.len(),
        edges = edges.len(),
        dangling = dangling_sends.len(),
        "resolved batch"
    );

    Ok(Resolution {
        edges,
        dangling_sends,
        graph,
    })
}

fn send_end(instruction: &Instruction) -> Option<(RelayKind, &str)> {
    let relay = instruction.relay().filter(|r| r.is_send())?;
    Some((relay.kind, instruction.peer()?))
}

fn receive_end(instruction: &Instruction) -> Option<(RelayKind, &str)> {
    let relay = instruction.relay().filter(|r| r.is_receive())?;
    Some((relay.kind, instruction.peer()?))
}

/// `(source, sink, kind)` triples declared by one side of every relay.
fn relay_ends<C: CircuitView>(batch: &[C], sending: bool) -> BTreeSet<(&str, &str, RelayKind)> {
    let mut ends = BTreeSet::new();
    for circuit in batch {
        let own = circuit.circuit_id();
        for instruction in circuit.instructions() {
            if sending {
                if let Some((kind, sink)) = send_end(instruction) {
                    ends.insert((own, sink, kind));
                }
            } else if let Some((kind, source)) = receive_end(instruction) {
                ends.insert((source, own, kind));
            }
        }
    }
    ends
}

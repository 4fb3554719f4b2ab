//! Documents exchanged with an execution endpoint.

use std::collections::BTreeMap;
use std::fmt;

use qmesh_ir::{CircuitSnapshot, Instruction};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;

/// Field name of the error marker in a response.
pub const ERROR_MARKER: &str = "ERROR";

/// How the endpoint should run a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecType {
    /// Self-contained circuit, run as a batch.
    #[default]
    Offloading,
    /// Circuit with relay instructions, run jointly with its peers.
    Dynamic,
}

impl ExecType {
    /// `Dynamic` for circuits with relay instructions, `Offloading` otherwise.
    pub fn for_snapshot(snapshot: &CircuitSnapshot) -> Self {
        if snapshot.instructions.iter().any(|i| i.relay().is_some()) {
            ExecType::Dynamic
        } else {
            ExecType::Offloading
        }
    }
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecType::Offloading => write!(f, "offloading"),
            ExecType::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Initial request for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    /// Circuit identifier; peers refer to the circuit by it.
    pub id: String,
    /// Run configuration.
    pub config: RunConfig,
    /// Instructions in program order.
    pub instructions: Vec<Instruction>,
    /// Execution mode.
    pub exec_type: ExecType,
    /// Number of qubits.
    pub num_qubits: u32,
    /// Number of classical bits.
    pub num_clbits: u32,
}

impl WireRequest {
    /// Build a request for a snapshot.
    pub fn new(snapshot: &CircuitSnapshot, config: &RunConfig, exec_type: ExecType) -> Self {
        Self {
            id: snapshot.id.clone(),
            config: config.clone(),
            instructions: snapshot.instructions.clone(),
            exec_type,
            num_qubits: snapshot.num_qubits,
            num_clbits: snapshot.num_clbits,
        }
    }
}

/// Follow-up request carrying only a new parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    /// Circuit identifier.
    pub id: String,
    /// New parameters, in instruction order.
    pub params: Vec<f64>,
}

/// A message from a job to its endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Run a circuit.
    Run(WireRequest),
    /// Re-run the last circuit with new parameters.
    UpdateParameters(ParameterUpdate),
}

impl Message {
    /// Identifier of the circuit the message is about.
    pub fn circuit_id(&self) -> &str {
        match self {
            Message::Run(request) => &request.id,
            Message::UpdateParameters(update) => &update.id,
        }
    }
}

/// An endpoint's answer: either an error marker or counts with timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    /// Error text, if the computation failed.
    #[serde(rename = "ERROR", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Outcome counts keyed by packed outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<BTreeMap<String, u64>>,
    /// Seconds spent computing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<f64>,
}

impl WireResponse {
    /// A successful response.
    pub fn counts(counts: BTreeMap<String, u64>, time_taken: f64) -> Self {
        Self {
            error: None,
            counts: Some(counts),
            time_taken: Some(time_taken),
        }
    }

    /// An error-marker response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmesh_ir::{Circuit, QubitId};
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let mut circuit = Circuit::with_id("a", 1);
        circuit.h(QubitId(0)).unwrap().measure_and_send(QubitId(0), "b").unwrap();
        let snapshot = circuit.snapshot();
        let exec_type = ExecType::for_snapshot(&snapshot);
        assert_eq!(exec_type, ExecType::Dynamic);

        let request = WireRequest::new(&snapshot, &RunConfig::new(100), exec_type);
        let value = serde_json::to_value(Message::Run(request)).unwrap();
        assert_eq!(value["kind"], "run");
        assert_eq!(value["exec_type"], "dynamic");
        assert_eq!(value["num_qubits"], 1);
        assert_eq!(value["config"]["shots"], 100);
        assert_eq!(value["instructions"][1]["circuits"], json!(["b"]));
    }

    #[test]
    fn test_response_error_marker() {
        let value = serde_json::to_value(WireResponse::error("boom")).unwrap();
        assert_eq!(value, json!({"ERROR": "boom"}));

        let parsed: WireResponse =
            serde_json::from_value(json!({"counts": {"0x1": 3}, "time_taken": 0.5})).unwrap();
        assert_eq!(parsed.counts.unwrap()["0x1"], 3);
        assert!(parsed.error.is_none());
    }
}

//! Run, backend and client configuration.
//!
//! Every struct here is a fixed set of fields; unknown keys in a document are
//! rejected at load time instead of being carried along.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qmesh_ir::{CircuitSnapshot, catalog};
use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};

/// Simulation method requested from an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMethod {
    /// Let the endpoint choose.
    #[default]
    Automatic,
    /// Dense statevector.
    Statevector,
    /// Density matrix.
    DensityMatrix,
    /// Matrix product state.
    MatrixProductState,
}

impl fmt::Display for ExecMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMethod::Automatic => write!(f, "automatic"),
            ExecMethod::Statevector => write!(f, "statevector"),
            ExecMethod::DensityMatrix => write!(f, "density_matrix"),
            ExecMethod::MatrixProductState => write!(f, "matrix_product_state"),
        }
    }
}

/// Per-job run configuration sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of shots.
    #[serde(default = "default_shots")]
    pub shots: u32,
    /// Simulation method.
    #[serde(default)]
    pub method: ExecMethod,
    /// Seed for the endpoint's sampler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Thread cap on the endpoint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_threads: Option<u32>,
    /// Whether the endpoint may fuse adjacent gates.
    #[serde(default = "default_true")]
    pub fusion: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            shots: default_shots(),
            method: ExecMethod::default(),
            seed: None,
            max_parallel_threads: None,
            fusion: true,
        }
    }
}

impl RunConfig {
    /// Create a configuration with `shots` and defaults elsewhere.
    pub fn new(shots: u32) -> Self {
        Self {
            shots,
            ..Self::default()
        }
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the method.
    #[must_use]
    pub fn with_method(mut self, method: ExecMethod) -> Self {
        self.method = method;
        self
    }

    /// Check the configuration before it is sent anywhere.
    pub fn validate(&self) -> HalResult<()> {
        if self.shots == 0 {
            return Err(HalError::Configuration("shots must be positive".into()));
        }
        if self.max_parallel_threads == Some(0) {
            return Err(HalError::Configuration(
                "max_parallel_threads must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Static description of the backend behind an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendDescription {
    /// Backend name.
    pub name: String,
    /// Backend version.
    #[serde(default)]
    pub version: String,
    /// Number of qubits.
    pub n_qubits: u32,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether this is a simulator.
    #[serde(default = "default_true")]
    pub simulator: bool,
    /// Supported base gate names; empty means the whole catalog.
    #[serde(default)]
    pub basis_gates: Vec<String>,
    /// Qubit connectivity, if restricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupling_map: Option<Vec<[u32; 2]>>,
    /// Non-catalog instructions the backend understands.
    #[serde(default)]
    pub custom_instructions: Vec<String>,
    /// Whether classically-conditioned gates are supported.
    #[serde(default = "default_true")]
    pub conditional: bool,
    /// Whether per-shot memory is available.
    #[serde(default)]
    pub memory: bool,
}

impl BackendDescription {
    /// Description of an ideal statevector simulator.
    pub fn statevector(name: impl Into<String>, n_qubits: u32) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            n_qubits,
            description: "ideal statevector simulator".into(),
            simulator: true,
            basis_gates: vec![],
            coupling_map: None,
            custom_instructions: vec![],
            conditional: true,
            memory: false,
        }
    }

    /// Whether the backend accepts instruction `name`.
    pub fn supports(&self, name: &str) -> bool {
        if self.custom_instructions.iter().any(|c| c == name) {
            return true;
        }
        let Ok(spec) = catalog::lookup(name) else {
            return false;
        };
        if spec.is_conditional() && !self.conditional {
            return false;
        }
        let base = catalog::base_name(name);
        self.basis_gates.is_empty() || self.basis_gates.iter().any(|g| g == base)
    }

    /// Check that a circuit fits this backend.
    pub fn check(&self, snapshot: &CircuitSnapshot) -> HalResult<()> {
        if snapshot.num_qubits > self.n_qubits {
            return Err(HalError::Configuration(format!(
                "circuit '{}' needs {} qubits but backend '{}' has {}",
                snapshot.id, snapshot.num_qubits, self.name, self.n_qubits
            )));
        }
        if let Some(instruction) = snapshot
            .instructions
            .iter()
            .find(|i| !self.supports(&i.name))
        {
            return Err(HalError::Configuration(format!(
                "backend '{}' does not support '{}' used in circuit '{}'",
                self.name, instruction.name, snapshot.id
            )));
        }
        Ok(())
    }
}

/// Client-side settings, loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Endpoint directory file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Whole-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Run configuration used when none is given.
    #[serde(default)]
    pub run: RunConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory: None,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            run: RunConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> HalResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HalError::Configuration(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> HalResult<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| HalError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration.
    pub fn validate(&self) -> HalResult<()> {
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(HalError::Configuration("timeouts must be positive".into()));
        }
        self.run.validate()
    }

    /// Whole-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_shots() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmesh_ir::{Circuit, QubitId};

    #[test]
    fn test_run_config_defaults() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.shots, 1024);
        assert!(config.fusion);
    }

    #[test]
    fn test_run_config_rejects_unknown_keys() {
        let err = serde_json::from_str::<RunConfig>(r#"{"shots": 10, "noise": true}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_run_config_validation() {
        assert!(RunConfig::new(0).validate().is_err());
        assert!(RunConfig::new(1).with_seed(7).validate().is_ok());
    }

    #[test]
    fn test_method_wire_names() {
        let json = serde_json::to_string(&ExecMethod::MatrixProductState).unwrap();
        assert_eq!(json, "\"matrix_product_state\"");
    }

    #[test]
    fn test_backend_description_rejects_unknown_keys() {
        let doc = r#"{"name": "qpu", "n_qubits": 4, "color": "blue"}"#;
        assert!(serde_json::from_str::<BackendDescription>(doc).is_err());

        let doc = r#"{"name": "qpu", "n_qubits": 4}"#;
        let desc: BackendDescription = serde_json::from_str(doc).unwrap();
        assert!(desc.simulator);
        assert!(desc.conditional);
    }

    #[test]
    fn test_backend_check() {
        let mut desc = BackendDescription::statevector("sv", 2);
        let mut circuit = Circuit::with_id("c", 2);
        circuit
            .h(QubitId(0))
            .unwrap()
            .c_if("x", QubitId(0), [QubitId(1)], vec![])
            .unwrap();
        assert!(desc.check(&circuit.snapshot()).is_ok());

        desc.conditional = false;
        assert!(desc.check(&circuit.snapshot()).is_err());

        desc.conditional = true;
        desc.basis_gates = vec!["h".into()];
        assert!(desc.check(&circuit.snapshot()).is_err());
        desc.basis_gates.push("x".into());
        assert!(desc.check(&circuit.snapshot()).is_ok());

        assert!(desc.check(&Circuit::with_id("big", 3).snapshot()).is_err());
    }

    #[test]
    fn test_client_config_yaml() {
        let yaml = "directory: /tmp/qpus.json\nrequest_timeout_secs: 30\nrun:\n  shots: 200\n  seed: 3\n";
        let config = ClientConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/qpus.json")));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.run.shots, 200);
        assert_eq!(config.run.seed, Some(3));

        assert!(ClientConfig::from_yaml("retries: 3\n").is_err());
        assert!(ClientConfig::from_yaml("run:\n  shots: 0\n").is_err());
    }

    #[test]
    fn test_client_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qmesh.yaml");
        std::fs::write(&path, "connect_timeout_secs: 2\n").unwrap();
        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));

        assert!(ClientConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }
}

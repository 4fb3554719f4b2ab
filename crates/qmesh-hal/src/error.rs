//! Error types for the HAL crate.

use qmesh_ir::IrError;
use thiserror::Error;

/// Errors that can occur in HAL operations.
///
/// `Clone` so a job can hand out its memoized failure more than once.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum HalError {
    /// A circuit or batch failed local validation.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Re-parameterization was requested for a circuit without parameters.
    #[error("Circuit '{0}' is not parametric")]
    NotParametric(String),

    /// The job has not been submitted yet.
    #[error("Job {0} has not been submitted")]
    NotSubmitted(String),

    /// A parameter vector does not fit the circuit.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The endpoint could not be reached or the exchange broke off.
    #[error("Transport failure at {endpoint}: {message}")]
    Transport {
        /// Endpoint identifier.
        endpoint: String,
        /// What went wrong.
        message: String,
    },

    /// The endpoint answered with an explicit error marker.
    #[error("Remote computation failed on {endpoint}: {message}")]
    RemoteComputation {
        /// Endpoint identifier.
        endpoint: String,
        /// Error text reported by the endpoint.
        message: String,
    },

    /// The endpoint's answer is neither counts nor an error marker.
    #[error("Invalid result: {0}")]
    InvalidResult(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No endpoint with this identifier.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),
}

impl HalError {
    /// Build a transport failure for `endpoint`.
    pub fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        HalError::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Whether this failure came from the endpoint side rather than local validation.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            HalError::Transport { .. } | HalError::RemoteComputation { .. }
        )
    }
}

impl From<serde_json::Error> for HalError {
    fn from(e: serde_json::Error) -> Self {
        HalError::Serialization(e.to_string())
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;

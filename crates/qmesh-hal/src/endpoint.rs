//! Execution endpoint handles.

use std::fmt;
use std::sync::Arc;

use crate::config::{BackendDescription, ClientConfig};
use crate::directory::{EndpointDirectory, EndpointRecord};
use crate::error::HalResult;
use crate::transport::{HttpTransport, Transport};

/// A reference to one execution unit.
///
/// The handle is cheap to clone behind an `Arc` and holds no state beyond its
/// transport. Jobs that share one handle must not submit concurrently: the
/// endpoint keeps a single "last circuit" per unit, so interleaved submissions
/// and parameter updates would race on it.
pub struct Endpoint {
    id: String,
    address: String,
    backend: BackendDescription,
    group: Option<String>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("backend", &self.backend.name)
            .field("group", &self.group)
            .finish()
    }
}

impl Endpoint {
    /// Create an endpoint over an arbitrary transport.
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        backend: BackendDescription,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            backend,
            group: None,
            transport,
        }
    }

    /// Set the grouping label.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Create an HTTP endpoint from a directory record.
    pub fn http(id: impl Into<String>, record: &EndpointRecord, config: &ClientConfig) -> Self {
        let transport = HttpTransport::with_config(&record.address, config);
        Self {
            id: id.into(),
            address: record.address.clone(),
            backend: record.backend.clone(),
            group: record.group.clone(),
            transport: Arc::new(transport),
        }
    }

    /// Look up `id` in a directory and create an HTTP endpoint for it.
    pub fn from_directory(
        directory: &EndpointDirectory,
        id: &str,
        config: &ClientConfig,
    ) -> HalResult<Self> {
        let record = directory.get(id)?;
        Ok(Self::http(id, record, config))
    }

    /// Every endpoint in a directory, in identifier order.
    pub fn all_from_directory(
        directory: &EndpointDirectory,
        config: &ClientConfig,
    ) -> Vec<Arc<Self>> {
        directory
            .iter()
            .map(|(id, record)| Arc::new(Self::http(id, record, config)))
            .collect()
    }

    /// Endpoint identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Endpoint address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Backend description.
    pub fn backend(&self) -> &BackendDescription {
        &self.backend
    }

    /// Grouping label.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// The transport, for spawning a request.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }
}

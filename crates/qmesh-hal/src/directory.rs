//! Endpoint directory: execution-unit identifier to address and backend.
//!
//! The directory is read-only here. Whoever provisions the execution units
//! writes it; this crate only loads it from an explicit location.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BackendDescription;
use crate::error::{HalError, HalResult};

/// One execution unit as listed in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointRecord {
    /// Base URL of the unit's service.
    pub address: String,
    /// What runs behind the address.
    pub backend: BackendDescription,
    /// Grouping label, e.g. the allocation the unit belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// All known execution units, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointDirectory {
    entries: BTreeMap<String, EndpointRecord>,
}

impl EndpointDirectory {
    /// Load a directory from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> HalResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HalError::Configuration(format!(
                "cannot read endpoint directory '{}': {e}",
                path.display()
            ))
        })?;
        let directory = Self::from_json(&contents)?;
        debug!(
            "Loaded {} endpoints from {}",
            directory.len(),
            path.display()
        );
        Ok(directory)
    }

    /// Parse a directory from a JSON string.
    pub fn from_json(json: &str) -> HalResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| HalError::Configuration(format!("invalid endpoint directory: {e}")))
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, id: impl Into<String>, record: EndpointRecord) {
        self.entries.insert(id.into(), record);
    }

    /// Look up an entry.
    pub fn get(&self, id: &str) -> HalResult<&EndpointRecord> {
        self.entries
            .get(id)
            .ok_or_else(|| HalError::UnknownEndpoint(id.to_string()))
    }

    /// Entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EndpointRecord)> {
        self.entries.iter().map(|(id, record)| (id.as_str(), record))
    }

    /// Entries carrying grouping label `group`.
    pub fn in_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a EndpointRecord)> {
        self.iter()
            .filter(move |(_, record)| record.group.as_deref() == Some(group))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = r#"{
        "qpu-0": {
            "address": "http://node01:8000",
            "backend": {"name": "sv", "n_qubits": 20},
            "group": "alloc-7"
        },
        "qpu-1": {
            "address": "http://node02:8000",
            "backend": {"name": "sv", "n_qubits": 24}
        }
    }"#;

    #[test]
    fn test_parse_directory() {
        let directory = EndpointDirectory::from_json(DIRECTORY).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get("qpu-1").unwrap().backend.n_qubits, 24);
        assert_eq!(directory.in_group("alloc-7").count(), 1);
        assert!(matches!(
            directory.get("qpu-9"),
            Err(HalError::UnknownEndpoint(id)) if id == "qpu-9"
        ));
    }

    #[test]
    fn test_unknown_record_keys_rejected() {
        let doc = r#"{"qpu-0": {"address": "x", "backend": {"name": "sv", "n_qubits": 1}, "port": 1}}"#;
        assert!(matches!(
            EndpointDirectory::from_json(doc),
            Err(HalError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qpus.json");
        std::fs::write(&path, DIRECTORY).unwrap();
        let directory = EndpointDirectory::from_file(&path).unwrap();
        let ids: Vec<_> = directory.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["qpu-0", "qpu-1"]);
    }
}

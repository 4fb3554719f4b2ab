//! Qubit and classical bit identifiers and the registers that own them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a qubit within a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QubitId(pub u32);

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

/// Index of a classical bit within a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClbitId(pub u32);

impl fmt::Display for ClbitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl From<u32> for ClbitId {
    fn from(id: u32) -> Self {
        ClbitId(id)
    }
}

/// Which index space a register lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    /// Qubits.
    Quantum,
    /// Classical bits.
    Classical,
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterKind::Quantum => write!(f, "quantum"),
            RegisterKind::Classical => write!(f, "classical"),
        }
    }
}

/// A named, ordered run of indices.
///
/// Indices are circuit-global: registers of the same kind never overlap and
/// are handed out contiguously in the order the registers were added.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    /// Register name, unique per kind within a circuit.
    pub name: String,
    /// The circuit-global indices belonging to this register.
    pub indices: Vec<u32>,
}

impl Register {
    /// Create a register covering `start..start + size`.
    ///
    /// Returns `None` if the range does not fit in `u32`.
    pub fn contiguous(name: impl Into<String>, start: u32, size: u32) -> Option<Self> {
        let end = start.checked_add(size)?;
        Some(Self {
            name: name.into(),
            indices: (start..end).collect(),
        })
    }

    /// Number of indices in the register.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the register is empty.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.indices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", QubitId(3)), "q3");
        assert_eq!(format!("{}", ClbitId(1)), "c1");
    }

    #[test]
    fn test_contiguous_register() {
        let reg = Register::contiguous("anc", 4, 3).unwrap();
        assert_eq!(reg.indices, vec![4, 5, 6]);
        assert_eq!(reg.len(), 3);
        assert_eq!(format!("{reg}"), "anc[3]");

        assert!(Register::contiguous("full", u32::MAX, 1).is_none());
        assert!(Register::contiguous("empty", u32::MAX, 0).unwrap().is_empty());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&vec![QubitId(0), QubitId(2)]).unwrap();
        assert_eq!(json, "[0,2]");
    }
}

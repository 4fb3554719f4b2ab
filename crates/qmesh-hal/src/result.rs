//! Parsed job results.
//!
//! Endpoints report outcomes as packed keys: either `0x`-prefixed hex or a
//! plain binary string, with classical bit 0 as the least significant bit.
//! Keys are unpacked into bitstrings grouped per classical register, most
//! significant bit first, the last-added register leftmost, groups separated
//! by a single space. This matches the usual `"c1 c0"` convention.

use std::collections::BTreeMap;

use qmesh_ir::{CircuitSnapshot, Register};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HalError, HalResult};
use crate::wire::WireResponse;

/// Measurement outcome histogram.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts {
    counts: BTreeMap<String, u64>,
}

impl Counts {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `bitstring`. Repeated keys accumulate.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.counts.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Occurrences of `bitstring`, zero if never seen.
    pub fn get(&self, bitstring: &str) -> u64 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Relative frequency of `bitstring`.
    pub fn probability(&self, bitstring: &str) -> f64 {
        let total = self.total_shots();
        if total == 0 {
            0.0
        } else {
            self.get(bitstring) as f64 / total as f64
        }
    }

    /// The outcome seen most often. Ties go to the smallest bitstring.
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(k, v)| (k.as_str(), *v))
    }

    /// Outcomes by descending count.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Outcomes in bitstring order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no outcome was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Result of one job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Circuit the result belongs to.
    pub circuit_id: String,
    /// Endpoint that computed it.
    pub endpoint: String,
    /// Unpacked outcome histogram.
    pub counts: Counts,
    /// Seconds the endpoint spent computing.
    pub time_taken: f64,
    /// Parameters the circuit ran with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<f64>,
}

impl RunResult {
    /// Parse an endpoint's raw answer for `snapshot`.
    ///
    /// An error marker always becomes [`HalError::RemoteComputation`].
    pub fn parse(raw: Value, snapshot: &CircuitSnapshot, endpoint: &str) -> HalResult<Self> {
        let response: WireResponse = serde_json::from_value(raw)
            .map_err(|e| HalError::InvalidResult(format!("unexpected response shape: {e}")))?;

        if let Some(message) = response.error {
            return Err(HalError::RemoteComputation {
                endpoint: endpoint.to_string(),
                message,
            });
        }
        let Some(packed) = response.counts else {
            return Err(HalError::InvalidResult(
                "response carries neither an error marker nor counts".into(),
            ));
        };
        let Some(time_taken) = response.time_taken else {
            return Err(HalError::InvalidResult(
                "response carries counts but no timing".into(),
            ));
        };

        let mut counts = Counts::new();
        for (key, count) in packed {
            let bits = unpack_key(&key, snapshot.num_clbits)?;
            counts.insert(group_bits(&bits, &snapshot.classical_registers), count);
        }

        Ok(Self {
            circuit_id: snapshot.id.clone(),
            endpoint: endpoint.to_string(),
            counts,
            time_taken,
            parameters: snapshot.parameters(),
        })
    }

    /// Total shots recorded.
    pub fn shots(&self) -> u64 {
        self.counts.total_shots()
    }

    /// Counts of one classical register, marginalizing the others.
    pub fn register_counts(&self, snapshot: &CircuitSnapshot, register: &str) -> Option<Counts> {
        let position = snapshot
            .classical_registers
            .iter()
            .rev()
            .position(|r| r.name == register)?;
        let mut marginal = Counts::new();
        for (key, count) in self.counts.iter() {
            let group = key.split(' ').nth(position)?;
            marginal.insert(group, count);
        }
        Some(marginal)
    }
}

/// Decode a packed key into `width` bits, index 0 = classical bit 0.
fn unpack_key(key: &str, width: u32) -> HalResult<Vec<bool>> {
    let invalid = |why: &str| HalError::InvalidResult(format!("outcome key '{key}': {why}"));
    let width = width as usize;

    // Least significant bit first.
    let mut bits = Vec::with_capacity(width);
    if let Some(hex) = key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        if hex.is_empty() {
            return Err(invalid("empty hex value"));
        }
        for c in hex.chars().rev() {
            let nibble = c.to_digit(16).ok_or_else(|| invalid("not a hex digit"))?;
            bits.extend((0..4).map(|i| (nibble >> i) & 1 == 1));
        }
    } else {
        for c in key.chars().rev().filter(|c| *c != ' ') {
            match c {
                '0' => bits.push(false),
                '1' => bits.push(true),
                _ => return Err(invalid("not a binary digit")),
            }
        }
    }

    if bits.iter().skip(width).any(|b| *b) {
        return Err(invalid(&format!("does not fit in {width} classical bits")));
    }
    bits.resize(width, false);
    Ok(bits)
}

/// Render bits per register, last-added register first.
fn group_bits(bits: &[bool], registers: &[Register]) -> String {
    let render = |indices: &mut dyn Iterator<Item = usize>| -> String {
        indices
            .map(|i| if bits.get(i).copied().unwrap_or(false) { '1' } else { '0' })
            .collect()
    };

    if registers.is_empty() {
        return render(&mut (0..bits.len()).rev());
    }
    registers
        .iter()
        .rev()
        .map(|r| render(&mut r.indices.iter().rev().map(|&i| i as usize)))
        .collect::<Vec<_>>()
        .join(" ")
}

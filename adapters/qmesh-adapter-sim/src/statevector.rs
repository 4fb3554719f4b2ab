//! Statevector simulation engine.
//!
//! Qubit `k` is bit `k` of the amplitude index. Matrices supplied for the
//! `unitary` family follow the same little-endian rule: `qubits[0]` is the
//! least significant bit of the matrix row/column index.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use num_complex::Complex64;
use qmesh_ir::Matrix;
use qmesh_ir::catalog::UNITARY;
use rand::Rng;

use crate::error::{SimError, SimResult};

/// A single-qubit operator.
type Gate1 = [[Complex64; 2]; 2];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

const PAULI_I: Gate1 = [[ONE, ZERO], [ZERO, ONE]];
const PAULI_X: Gate1 = [[ZERO, ONE], [ONE, ZERO]];
const PAULI_Y: Gate1 = [[ZERO, Complex64::new(0.0, -1.0)], [I, ZERO]];
const PAULI_Z: Gate1 = [[ONE, ZERO], [ZERO, Complex64::new(-1.0, 0.0)]];

/// A statevector representing a quantum state.
#[derive(Debug, Clone)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![ZERO; size];
        amplitudes[0] = ONE;
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The raw amplitudes.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Probability of reading 1 on `qubit`.
    pub fn probability_one(&self, qubit: usize) -> f64 {
        let mask = 1 << qubit;
        self.amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    /// Measure `qubit` in the computational basis, collapsing the state.
    pub fn measure<R: Rng>(&mut self, qubit: usize, rng: &mut R) -> bool {
        let p1 = self.probability_one(qubit);
        let outcome = rng.r#gen::<f64>() < p1;
        let kept = if outcome { p1 } else { 1.0 - p1 };

        let mask = 1 << qubit;
        let scale = if kept > 0.0 { 1.0 / kept.sqrt() } else { 0.0 };
        for (i, amplitude) in self.amplitudes.iter_mut().enumerate() {
            if (i & mask != 0) == outcome {
                *amplitude *= scale;
            } else {
                *amplitude = ZERO;
            }
        }
        outcome
    }

    /// Return `qubit` to |0⟩.
    pub fn reset<R: Rng>(&mut self, qubit: usize, rng: &mut R) {
        if self.measure(qubit, rng) {
            self.apply_x(qubit);
        }
    }

    /// Exchange two qubits.
    pub fn swap(&mut self, q1: usize, q2: usize) {
        self.apply_swap(q1, q2);
    }

    /// Apply a unitary catalog gate by name.
    ///
    /// Non-unitary and relay instructions are the executor's business and
    /// are rejected here.
    pub fn apply_gate(
        &mut self,
        name: &str,
        qubits: &[usize],
        params: &[f64],
        matrix: Option<&Matrix>,
    ) -> SimResult<()> {
        let unsupported = || SimError::UnsupportedInstruction(name.to_string());

        if name == UNITARY {
            let matrix = matrix.ok_or_else(unsupported)?;
            return self.apply_matrix(qubits, matrix);
        }

        match (name, qubits) {
            ("x", [q]) => self.apply_x(*q),
            ("h", [q]) => self.apply_h(*q),
            ("cx", [c, t]) => self.apply_cx(*c, *t),
            ("cz", [c, t]) => self.apply_cz(*c, *t),
            ("swap", [a, b]) => self.apply_swap(*a, *b),
            ("iswap", [a, b]) => self.apply_iswap(*a, *b),
            ("ccx", [c1, c2, t]) => self.apply_ccx(*c1, *c2, *t),
            ("cswap", [c, a, b]) => self.apply_cswap(*c, *a, *b),
            ("ccz", [c1, c2, t]) => self.apply_controlled(&[*c1, *c2], *t, &PAULI_Z),
            ("cu", [c, t]) => {
                let [theta, phi, lambda, gamma] = params else {
                    return Err(unsupported());
                };
                let phase = Complex64::from_polar(1.0, *gamma);
                let mut gate = u(*theta, *phi, *lambda);
                for entry in gate.iter_mut().flatten() {
                    *entry *= phase;
                }
                self.apply_controlled(&[*c], *t, &gate);
            }
            ("ecr", [a, b]) => self.apply_matrix(&[*a, *b], &ecr())?,
            ("rxx" | "ryy" | "rzz" | "rzx", [a, b]) => {
                let [theta] = params else {
                    return Err(unsupported());
                };
                // (high, low) = (qubits[1], qubits[0])
                let (high, low) = match name {
                    "rxx" => (PAULI_X, PAULI_X),
                    "ryy" => (PAULI_Y, PAULI_Y),
                    "rzz" => (PAULI_Z, PAULI_Z),
                    _ => (PAULI_X, PAULI_Z),
                };
                self.apply_matrix(&[*a, *b], &pauli_rotation(*theta, &high, &low))?;
            }
            (_, [q]) => {
                let gate = single_qubit(name, params).ok_or_else(unsupported)?;
                self.apply_1q(*q, &gate);
            }
            (_, [c, t]) => {
                let base = name.strip_prefix('c').ok_or_else(unsupported)?;
                let gate = single_qubit(base, params).ok_or_else(unsupported)?;
                self.apply_controlled(&[*c], *t, &gate);
            }
            _ => return Err(unsupported()),
        }
        Ok(())
    }

    // =========================================================================
    // Generic kernels
    // =========================================================================

    fn apply_1q(&mut self, qubit: usize, gate: &Gate1) {
        self.apply_controlled(&[], qubit, gate);
    }

    fn apply_controlled(&mut self, controls: &[usize], target: usize, gate: &Gate1) {
        let ctrl_mask = controls.iter().fold(0usize, |m, &c| m | (1 << c));
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask == ctrl_mask) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = gate[0][0] * a + gate[0][1] * b;
                self.amplitudes[j] = gate[1][0] * a + gate[1][1] * b;
            }
        }
    }

    fn apply_matrix(&mut self, qubits: &[usize], matrix: &Matrix) -> SimResult<()> {
        let dim = 1usize << qubits.len();
        if matrix.len() != dim || matrix.iter().any(|row| row.len() != dim) {
            return Err(SimError::InvalidRequest(format!(
                "matrix does not act on {} qubits",
                qubits.len()
            )));
        }

        let mask = qubits.iter().fold(0usize, |m, &q| m | (1 << q));
        let offsets: Vec<usize> = (0..dim)
            .map(|k| {
                qubits
                    .iter()
                    .enumerate()
                    .filter(|&(bit, _)| k & (1 << bit) != 0)
                    .fold(0usize, |acc, (_, &q)| acc | (1 << q))
            })
            .collect();

        let mut scratch = vec![ZERO; dim];
        for base in 0..(1 << self.num_qubits) {
            if base & mask != 0 {
                continue;
            }
            for (slot, offset) in scratch.iter_mut().zip(&offsets) {
                *slot = self.amplitudes[base | offset];
            }
            for (row, offset) in matrix.iter().zip(&offsets) {
                self.amplitudes[base | offset] =
                    row.iter().zip(&scratch).map(|(m, a)| m * a).sum();
            }
        }
        Ok(())
    }

    // =========================================================================
    // Specialised kernels
    // =========================================================================

    fn apply_x(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                self.amplitudes.swap(i, i | mask);
            }
        }
    }

    fn apply_h(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = FRAC_1_SQRT_2 * (a + b);
                self.amplitudes[j] = FRAC_1_SQRT_2 * (a - b);
            }
        }
    }

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                self.amplitudes.swap(i, i | tgt_mask);
            }
        }
    }

    fn apply_cz(&mut self, control: usize, target: usize) {
        let both = (1 << control) | (1 << target);
        for i in 0..(1 << self.num_qubits) {
            if i & both == both {
                self.amplitudes[i] = -self.amplitudes[i];
            }
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        for i in 0..(1 << self.num_qubits) {
            if (i & mask1 != 0) && (i & mask2 == 0) {
                self.amplitudes.swap(i, (i & !mask1) | mask2);
            }
        }
    }

    fn apply_iswap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        for i in 0..(1 << self.num_qubits) {
            if (i & mask1 != 0) && (i & mask2 == 0) {
                let j = (i & !mask1) | mask2;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = I * self.amplitudes[j];
                self.amplitudes[j] = I * tmp;
            }
        }
    }

    fn apply_ccx(&mut self, c1: usize, c2: usize, target: usize) {
        let ctrl_mask = (1 << c1) | (1 << c2);
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask == ctrl_mask) && (i & tgt_mask == 0) {
                self.amplitudes.swap(i, i | tgt_mask);
            }
        }
    }

    fn apply_cswap(&mut self, control: usize, t1: usize, t2: usize) {
        let ctrl_mask = 1 << control;
        let t1_mask = 1 << t1;
        let t2_mask = 1 << t2;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & t1_mask != 0) && (i & t2_mask == 0) {
                self.amplitudes.swap(i, (i & !t1_mask) | t2_mask);
            }
        }
    }
}

/// Matrix of a single-qubit catalog gate, if `name` is one.
fn single_qubit(name: &str, params: &[f64]) -> Option<Gate1> {
    let gate = match (name, params) {
        ("id", []) => PAULI_I,
        ("x", []) => PAULI_X,
        ("y", []) => PAULI_Y,
        ("z", []) => PAULI_Z,
        ("h", []) => {
            let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
            [[h, h], [h, -h]]
        }
        ("s", []) => phase(PI / 2.0),
        ("sdg", []) => phase(-PI / 2.0),
        ("t", []) => phase(PI / 4.0),
        ("tdg", []) => phase(-PI / 4.0),
        ("sx", []) => sx(1.0),
        ("sxdg", []) => sx(-1.0),
        ("rx", [theta]) => r(*theta, 0.0),
        ("ry", [theta]) => r(*theta, PI / 2.0),
        ("rz", [theta]) => {
            let half = theta / 2.0;
            [
                [Complex64::from_polar(1.0, -half), ZERO],
                [ZERO, Complex64::from_polar(1.0, half)],
            ]
        }
        ("p", [lambda]) => phase(*lambda),
        ("u2", [phi, lambda]) => u(PI / 2.0, *phi, *lambda),
        ("r", [theta, phi]) => r(*theta, *phi),
        ("u" | "u3", [theta, phi, lambda]) => u(*theta, *phi, *lambda),
        _ => return None,
    };
    Some(gate)
}

fn phase(lambda: f64) -> Gate1 {
    [[ONE, ZERO], [ZERO, Complex64::from_polar(1.0, lambda)]]
}

fn sx(sign: f64) -> Gate1 {
    let p = Complex64::new(0.5, 0.5 * sign);
    let m = Complex64::new(0.5, -0.5 * sign);
    [[p, m], [m, p]]
}

/// Rotation by `theta` about the axis `cos(phi) X + sin(phi) Y`.
fn r(theta: f64, phi: f64) -> Gate1 {
    let c = Complex64::new((theta / 2.0).cos(), 0.0);
    let s = (theta / 2.0).sin();
    [
        [c, -I * Complex64::from_polar(s, -phi)],
        [-I * Complex64::from_polar(s, phi), c],
    ]
}

fn u(theta: f64, phi: f64, lambda: f64) -> Gate1 {
    let c = (theta / 2.0).cos();
    let s = (theta / 2.0).sin();
    [
        [Complex64::new(c, 0.0), -Complex64::from_polar(s, lambda)],
        [
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        ],
    ]
}

/// `high ⊗ low`, with `low` on the least significant index bit.
fn kron(high: &Gate1, low: &Gate1) -> Matrix {
    (0..4)
        .map(|row| {
            (0..4)
                .map(|col| high[row >> 1][col >> 1] * low[row & 1][col & 1])
                .collect()
        })
        .collect()
}

/// `exp(-i θ/2 · high ⊗ low)`.
fn pauli_rotation(theta: f64, high: &Gate1, low: &Gate1) -> Matrix {
    let c = (theta / 2.0).cos();
    let s = (theta / 2.0).sin();
    let product = kron(high, low);
    (0..4)
        .map(|row| {
            (0..4)
                .map(|col| {
                    let identity = if row == col { c } else { 0.0 };
                    Complex64::new(identity, 0.0) - I * s * product[row][col]
                })
                .collect()
        })
        .collect()
}

/// `(I ⊗ X − X ⊗ Y) / √2`.
fn ecr() -> Matrix {
    let ix = kron(&PAULI_I, &PAULI_X);
    let xy = kron(&PAULI_X, &PAULI_Y);
    ix.iter()
        .zip(&xy)
        .map(|(a, b)| {
            a.iter()
                .zip(b)
                .map(|(a, b)| (a - b) * FRAC_1_SQRT_2)
                .collect()
        })
        .collect()
}

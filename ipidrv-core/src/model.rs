// MIT License
// Copyright 2026--present ipidrv developers

//! Per-step data exchanged between the codec, the session and evaluators.
//!
//! Everything here is in internal SI units. Conversion to and from atomic
//! units happens exclusively in [`crate::codec`].

/// A 3x3 matrix stored row-major.
pub type Matrix3 = [[f64; 3]; 3];

/// Periodic simulation box for the current step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationCell {
    /// Cell vectors in metres.
    pub cell: Matrix3,
    /// Inverse cell matrix in 1/m.
    pub inverse: Matrix3,
}

/// Atomic geometry received with POSDATA.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub cell: SimulationCell,
    /// Coordinates in metres, one row per atom.
    pub positions: Vec<[f64; 3]>,
}

impl Configuration {
    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }
}

/// Blob received with an INIT command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPayload {
    /// Replica (bead) index assigned by the orchestrator.
    pub bead: i32,
    pub data: Vec<u8>,
}

/// Physics computed for one configuration, waiting for GETFORCE.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceResult {
    /// Potential energy in Joules.
    pub energy: f64,
    /// Forces in J/m, one row per atom.
    pub forces: Vec<[f64; 3]>,
    /// Virial in Joules, `virial[i][j] = sum_a forces[a][i] * positions[a][j]`.
    pub virial: Matrix3,
    /// Opaque string attached to the reply; empty when unused.
    pub extra: String,
}

impl ForceResult {
    /// Build a result and derive its virial from `forces` and `positions`.
    ///
    /// The virial is the plain outer product of force and position summed
    /// over atoms; it is not symmetrised.
    pub fn new(
        energy: f64,
        forces: Vec<[f64; 3]>,
        positions: &[[f64; 3]],
        extra: String,
    ) -> Self {
        let mut virial = [[0.0; 3]; 3];
        for (f, x) in forces.iter().zip(positions) {
            for i in 0..3 {
                for j in 0..3 {
                    virial[i][j] += f[i] * x[j];
                }
            }
        }
        Self {
            energy,
            forces,
            virial,
            extra,
        }
    }

    pub fn n_atoms(&self) -> usize {
        self.forces.len()
    }
}

// MIT License
// Copyright 2026--present ipidrv developers

use crate::error::Result;
use crate::evaluator::{Evaluation, Evaluator};
use crate::model::Configuration;
use crate::units;

/// Ideal-gas toy potential used to test the socket plumbing.
///
/// With `r_i = |x_i|^2` and `k' = k` converted from kJ/mol to J:
///
/// ```text
/// E      = k' * sum_i r_i^2
/// grad_i = 2 k' x_i / r_i
/// ```
///
/// The gradient is not the analytic derivative of the energy. Both formulas
/// are kept as they are because drivers and orchestrator test suites compare
/// against them bit for bit. An atom sitting exactly at the origin yields
/// NaN gradient components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    kconst: f64,
}

impl Harmonic {
    /// `k` in kJ/mol.
    pub fn new(k: f64) -> Self {
        Self {
            kconst: units::kj_per_mol_to_joule(k),
        }
    }

    /// Force constant in Joules.
    pub fn kconst(&self) -> f64 {
        self.kconst
    }
}

impl Evaluator for Harmonic {
    fn evaluate(&mut self, config: &Configuration) -> Result<Evaluation> {
        let mut energy = 0.0;
        let mut gradient = Vec::with_capacity(config.n_atoms());
        for x in &config.positions {
            let r = x[0] * x[0] + x[1] * x[1] + x[2] * x[2];
            energy += self.kconst * (r * r);
            gradient.push(x.map(|xi| 2.0 * self.kconst * xi / r));
        }
        Ok(Evaluation {
            energy,
            gradient,
            extra: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SimulationCell;
    use crate::units::BOHR;

    fn config(positions: Vec<[f64; 3]>) -> Configuration {
        Configuration {
            cell: SimulationCell {
                cell: [[0.0; 3]; 3],
                inverse: [[0.0; 3]; 3],
            },
            positions,
        }
    }

    #[test]
    fn kconst_is_k_per_particle() {
        let h = Harmonic::new(100.0);
        assert_eq!(h.kconst(), 100.0 * (1000.0 / 6.02214129e23));
    }

    #[test]
    fn two_atom_scenario_matches_formula() {
        // [[0,0,0],[1,0,0]] Bohr with k = 100 kJ/mol.
        let kp = 100.0 * (1000.0 / 6.02214129e23);
        let x = 1.0 * BOHR;
        let mut h = Harmonic::new(100.0);
        let out = h
            .evaluate(&config(vec![[0.0, 0.0, 0.0], [x, 0.0, 0.0]]))
            .unwrap();

        let r1 = x * x + 0.0 * 0.0 + 0.0 * 0.0;
        let expected_energy = 0.0 + kp * (0.0 * 0.0) + kp * (r1 * r1);
        assert_eq!(out.energy, expected_energy);

        // The atom at the origin divides zero by zero.
        assert!(out.gradient[0].iter().all(|g| g.is_nan()));
        assert_eq!(out.gradient[1], [2.0 * kp * x / r1, 0.0, 0.0]);
        assert_eq!(out.extra, None);
    }

    #[test]
    fn off_axis_atoms_match_hand_values() {
        let kp = 100.0 * (1000.0 / 6.02214129e23);
        let a = [1.0 * BOHR, 2.0 * BOHR, 0.0];
        let b = [0.0, -1.5 * BOHR, 0.5 * BOHR];
        let mut h = Harmonic::new(100.0);
        let out = h.evaluate(&config(vec![a, b])).unwrap();

        let ra = a[0] * a[0] + a[1] * a[1] + a[2] * a[2];
        let rb = b[0] * b[0] + b[1] * b[1] + b[2] * b[2];
        assert_eq!(out.energy, kp * (ra * ra) + kp * (rb * rb));
        for i in 0..3 {
            assert_eq!(out.gradient[0][i], 2.0 * kp * a[i] / ra);
            assert_eq!(out.gradient[1][i], 2.0 * kp * b[i] / rb);
        }
    }

    #[test]
    fn empty_configuration_has_zero_energy() {
        let out = Harmonic::new(1.0).evaluate(&config(vec![])).unwrap();
        assert_eq!(out.energy, 0.0);
        assert!(out.gradient.is_empty());
    }
}

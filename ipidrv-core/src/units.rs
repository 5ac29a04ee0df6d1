// MIT License
// Copyright 2026--present ipidrv developers

//! Physical constants and unit conversions.
//!
//! The i-PI wire protocol speaks atomic units (Bohr, Hartree). Evaluators work
//! in SI units (metres, Joules). Every conversion between the two happens in
//! this module so the rest of the crate never multiplies by a bare constant.
//!
//! | Quantity | Wire | Internal | Conversion |
//! |----------|------|----------|------------|
//! | length | Bohr | m | `× BOHR` |
//! | inverse length | 1/Bohr | 1/m | `÷ BOHR` |
//! | energy | Hartree | J | `× HARTREE` |
//! | force | Hartree/Bohr | J/m | `× HARTREE / BOHR` |

/// Bohr radius in metres.
pub const BOHR: f64 = 5.291772108e-11;
/// Ångström in metres.
pub const ANGSTROM: f64 = 1e-10;
/// Hartree in Joules.
pub const HARTREE: f64 = 4.35974417e-18;
/// Electron-volt in Joules.
pub const EV: f64 = 1.6021766209e-19;
/// Avogadro constant.
pub const MOLE: f64 = 6.02214129e23;
/// Kilojoule in Joules.
pub const KJ: f64 = 1000.0;

/// Force unit of the wire (Hartree/Bohr) expressed in J/m.
pub const HARTREE_PER_BOHR: f64 = HARTREE / BOHR;

#[inline]
pub fn bohr_to_m(x: f64) -> f64 {
    x * BOHR
}

#[inline]
pub fn m_to_bohr(x: f64) -> f64 {
    x / BOHR
}

/// Inverse lengths scale the other way round.
#[inline]
pub fn inv_bohr_to_inv_m(x: f64) -> f64 {
    x / BOHR
}

#[inline]
pub fn joule_to_hartree(e: f64) -> f64 {
    e / HARTREE
}

#[inline]
pub fn hartree_to_joule(e: f64) -> f64 {
    e * HARTREE
}

#[inline]
pub fn force_to_wire(f: f64) -> f64 {
    f / HARTREE_PER_BOHR
}

#[inline]
pub fn force_from_wire(f: f64) -> f64 {
    f * HARTREE_PER_BOHR
}

/// Convert a per-mole energy in kJ/mol to Joules per particle.
#[inline]
pub fn kj_per_mol_to_joule(e: f64) -> f64 {
    e * (KJ / MOLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel_err(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn bohr_round_trip_is_within_tolerance() {
        for x in [1.0, -3.25, 0.5e-3, 12345.678] {
            let back = m_to_bohr(bohr_to_m(x));
            assert!(rel_err(back, x) < 1e-12, "{x} -> {back}");
        }
    }

    #[test]
    fn hartree_round_trip_is_within_tolerance() {
        let e = -1.1743;
        assert!(rel_err(joule_to_hartree(hartree_to_joule(e)), e) < 1e-12);
    }

    #[test]
    fn force_unit_is_hartree_over_bohr() {
        assert!(rel_err(force_from_wire(1.0), HARTREE / BOHR) < 1e-15);
        assert!(rel_err(force_to_wire(force_from_wire(0.25)), 0.25) < 1e-12);
    }

    #[test]
    fn inverse_cell_scales_reciprocally() {
        // A cell vector of 10 Bohr and its inverse of 0.1/Bohr must still
        // multiply to one after conversion.
        let product = bohr_to_m(10.0) * inv_bohr_to_inv_m(0.1);
        assert!((product - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kj_per_mol_matches_reference_factor() {
        assert_eq!(kj_per_mol_to_joule(100.0), 100.0 * (1000.0 / 6.02214129e23));
    }
}

// MIT License
// Copyright 2026--present ipidrv developers

//! Callback-based potentials.
//!
//! [`CallbackPotential`] wraps a C function pointer together with a
//! `void* user_data` and an optional destructor, and plugs it into the driver
//! as an [`Evaluator`]. This is how existing C/C++ potentials answer an i-PI
//! orchestrator without the Rust side knowing their concrete type.
//!
//! **How it Works**
//!
//! 1. The C++ side creates its potential object.
//! 2. A trampoline with the [`PotentialCallback`] signature casts
//!    `user_data` back to the concrete type and computes energy and forces.
//! 3. On every POSDATA the session calls [`Evaluator::evaluate`], which
//!    converts the configuration to Å, hands it to the trampoline as borrowed
//!    DLPack tensors, and converts the returned eV and eV/Å back to SI.
//!
//! **Lifetime Contract**
//!
//! - `user_data` is borrowed unless a `free_fn` is given, in which case it
//!   is called on drop (for non-null `user_data`).
//! - The handle is exposed to C as `ipidrv_potential_t`, managed via
//!   `ipidrv_potential_new` / `ipidrv_potential_free`.

use std::os::raw::c_void;

use crate::error::{DriverError, Result};
use crate::evaluator::{Evaluation, Evaluator};
use crate::model::Configuration;
use crate::status::{ipidrv_status_t, last_error_string};
use crate::tensor::{ipidrv_tensor_free, read_nx3};
use crate::types::{ipidrv_force_input_t, ipidrv_force_out_t};
use crate::units;

/// Function pointer type for an energy/force calculation.
///
/// The callback receives `user_data`, the configuration, and an output
/// struct whose `forces` it must set to an owned tensor (see
/// `ipidrv_tensor_owned_cpu_f64_2d`). Any status other than
/// `IPIDRV_SUCCESS` aborts the step.
pub type PotentialCallback = unsafe extern "C" fn(
    user_data: *mut c_void,
    input: *const ipidrv_force_input_t,
    output: *mut ipidrv_force_out_t,
) -> ipidrv_status_t;

/// Destructor for the user_data pointer.
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

/// A potential implemented behind a C callback.
pub struct CallbackPotential {
    callback: PotentialCallback,
    user_data: *mut c_void,
    free_fn: Option<FreeFn>,
}

// The handle is only ever driven from the thread that runs the session.
unsafe impl Send for CallbackPotential {}

impl CallbackPotential {
    pub fn new(callback: PotentialCallback, user_data: *mut c_void, free_fn: Option<FreeFn>) -> Self {
        Self {
            callback,
            user_data,
            free_fn,
        }
    }

    /// Invoke the callback on raw structs.
    ///
    /// # Safety
    /// `input` and `output` must point to valid structures.
    unsafe fn call(
        &self,
        input: *const ipidrv_force_input_t,
        output: *mut ipidrv_force_out_t,
    ) -> ipidrv_status_t {
        unsafe { (self.callback)(self.user_data, input, output) }
    }
}

impl Drop for CallbackPotential {
    fn drop(&mut self) {
        if let Some(free) = self.free_fn {
            if !self.user_data.is_null() {
                unsafe { free(self.user_data) };
            }
        }
    }
}

impl Evaluator for CallbackPotential {
    fn evaluate(&mut self, config: &Configuration) -> Result<Evaluation> {
        let n = config.n_atoms();
        let mut positions: Vec<f64> = config
            .positions
            .iter()
            .flatten()
            .map(|x| x / units::ANGSTROM)
            .collect();
        let mut box_matrix = [0.0; 9];
        for (dst, src) in box_matrix.iter_mut().zip(config.cell.cell.iter().flatten()) {
            *dst = src / units::ANGSTROM;
        }

        let mut input = unsafe { ipidrv_force_input_t::borrowed(&mut positions, &mut box_matrix) };
        let mut output = ipidrv_force_out_t::default();
        let status = unsafe { self.call(&input, &mut output) };
        input.release();

        let forces = if status == ipidrv_status_t::IPIDRV_SUCCESS {
            unsafe { read_nx3(output.forces, n) }.map_err(DriverError::Evaluator)
        } else {
            Err(DriverError::Evaluator(format!(
                "potential callback returned {status:?}: {}",
                last_error_string()
            )))
        };
        unsafe { ipidrv_tensor_free(output.forces) };
        let forces = forces?;

        let to_si = units::EV / units::ANGSTROM;
        Ok(Evaluation {
            energy: output.energy * units::EV,
            gradient: forces.into_iter().map(|f| f.map(|fi| -fi * to_si)).collect(),
            extra: None,
        })
    }
}

/// Opaque handle exposed to C as `ipidrv_potential_t`.
pub type ipidrv_potential_t = CallbackPotential;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::SimulationCell;
    use crate::status::set_last_error;
    use crate::tensor::ipidrv_tensor_owned_cpu_f64_2d;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Spring to the origin in Å/eV: E = sum |x|^2, F = -2x.
    pub(crate) unsafe extern "C" fn spring_callback(
        _ud: *mut c_void,
        input: *const ipidrv_force_input_t,
        output: *mut ipidrv_force_out_t,
    ) -> ipidrv_status_t {
        let inp = unsafe { &*input };
        let out = unsafe { &mut *output };
        let n = unsafe { inp.n_atoms() }.unwrap_or(0);
        let pos = unsafe {
            std::slice::from_raw_parts((*inp.positions).dl_tensor.data as *const f64, n * 3)
        };
        let forces: Vec<f64> = pos.iter().map(|x| -2.0 * x).collect();
        out.energy = pos.iter().map(|x| x * x).sum();
        out.forces = unsafe { ipidrv_tensor_owned_cpu_f64_2d(forces.as_ptr(), n as i64, 3) };
        ipidrv_status_t::IPIDRV_SUCCESS
    }

    unsafe extern "C" fn failing_callback(
        _ud: *mut c_void,
        _input: *const ipidrv_force_input_t,
        _output: *mut ipidrv_force_out_t,
    ) -> ipidrv_status_t {
        set_last_error("deliberately failed");
        ipidrv_status_t::IPIDRV_EVALUATOR_ERROR
    }

    unsafe extern "C" fn no_forces_callback(
        _ud: *mut c_void,
        _input: *const ipidrv_force_input_t,
        _output: *mut ipidrv_force_out_t,
    ) -> ipidrv_status_t {
        ipidrv_status_t::IPIDRV_SUCCESS
    }

    unsafe extern "C" fn counting_callback(
        ud: *mut c_void,
        input: *const ipidrv_force_input_t,
        output: *mut ipidrv_force_out_t,
    ) -> ipidrv_status_t {
        let counter = unsafe { &*(ud as *const AtomicU32) };
        counter.fetch_add(1, Ordering::SeqCst);
        unsafe { spring_callback(std::ptr::null_mut(), input, output) }
    }

    fn config(angstrom: &[[f64; 3]]) -> Configuration {
        Configuration {
            cell: SimulationCell {
                cell: [[10.0 * units::ANGSTROM, 0.0, 0.0], [0.0; 3], [0.0; 3]],
                inverse: [[0.0; 3]; 3],
            },
            positions: angstrom
                .iter()
                .map(|x| x.map(|xi| xi * units::ANGSTROM))
                .collect(),
        }
    }

    #[test]
    fn callback_results_are_converted_to_si_gradient() {
        let mut pot = CallbackPotential::new(spring_callback, std::ptr::null_mut(), None);
        let out = pot.evaluate(&config(&[[1.0, 0.0, 0.0], [0.0, -2.0, 0.0]])).unwrap();

        assert!((out.energy / units::EV - 5.0).abs() < 1e-9);
        let to_si = units::EV / units::ANGSTROM;
        assert!((out.gradient[0][0] / to_si - 2.0).abs() < 1e-9);
        assert!((out.gradient[1][1] / to_si + 4.0).abs() < 1e-9);
    }

    #[test]
    fn callback_error_carries_last_error() {
        let mut pot = CallbackPotential::new(failing_callback, std::ptr::null_mut(), None);
        let err = pot.evaluate(&config(&[[1.0, 0.0, 0.0]])).unwrap_err();
        match err {
            DriverError::Evaluator(msg) => assert!(msg.contains("deliberately failed"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_forces_tensor_is_an_error() {
        let mut pot = CallbackPotential::new(no_forces_callback, std::ptr::null_mut(), None);
        assert!(matches!(
            pot.evaluate(&config(&[[1.0, 0.0, 0.0]])),
            Err(DriverError::Evaluator(_))
        ));
    }

    #[test]
    fn user_data_is_forwarded() {
        let counter = AtomicU32::new(0);
        let mut pot = CallbackPotential::new(
            counting_callback,
            &counter as *const _ as *mut c_void,
            None,
        );
        pot.evaluate(&config(&[[1.0, 0.0, 0.0]])).unwrap();
        pot.evaluate(&config(&[[1.0, 0.0, 0.0]])).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    static DROP_CALLED: AtomicBool = AtomicBool::new(false);

    unsafe extern "C" fn track_drop(ptr: *mut c_void) {
        DROP_CALLED.store(true, Ordering::SeqCst);
        assert_eq!(unsafe { *(ptr as *const u64) }, 0xDEAD_BEEF);
    }

    #[test]
    fn drop_calls_free_fn_with_user_data() {
        DROP_CALLED.store(false, Ordering::SeqCst);
        let mut sentinel: u64 = 0xDEAD_BEEF;
        {
            let _pot = CallbackPotential::new(
                spring_callback,
                &mut sentinel as *mut u64 as *mut c_void,
                Some(track_drop),
            );
            assert!(!DROP_CALLED.load(Ordering::SeqCst));
        }
        assert!(DROP_CALLED.load(Ordering::SeqCst));
    }

    #[test]
    fn drop_skips_free_fn_for_null_user_data() {
        let _pot = CallbackPotential::new(spring_callback, std::ptr::null_mut(), Some(track_drop));
    }

    #[test]
    fn callback_potential_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CallbackPotential>();
    }
}

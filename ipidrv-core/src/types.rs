// MIT License
// Copyright 2026--present ipidrv developers

//! C-compatible argument structs for callback potentials.
//!
//! ## Units and Shapes
//!
//! The C boundary speaks Å and eV, the units most existing C/C++ potentials
//! are written in. Conversion to the driver's SI units happens in
//! [`crate::potential`].
//!
//! | Field | dtype | shape | unit |
//! |-------|-------|-------|------|
//! | `positions` | f64 | `[n_atoms, 3]` | Å |
//! | `box_matrix` | f64 | `[3, 3]` | Å |
//! | `forces` | f64 | `[n_atoms, 3]` | eV/Å |
//! | `energy` | f64 | scalar | eV |
//!
//! Input tensors are borrowed for the duration of one callback. The callback
//! stores a callee-allocated tensor in `forces`; the driver takes ownership
//! and frees it.

use dlpk::sys::DLManagedTensorVersioned;

use crate::tensor::{borrow_f64_tensor, ipidrv_tensor_free};

/// Configuration handed to a callback potential.
#[repr(C)]
pub struct ipidrv_force_input_t {
    /// Positions tensor `[n_atoms, 3]`, f64, CPU.
    pub positions: *mut DLManagedTensorVersioned,
    /// Cell vectors as rows, `[3, 3]`, f64, CPU.
    pub box_matrix: *mut DLManagedTensorVersioned,
}

/// Results written by a callback potential.
#[repr(C)]
pub struct ipidrv_force_out_t {
    /// Forces tensor `[n_atoms, 3]`, f64, set by the callback.
    pub forces: *mut DLManagedTensorVersioned,
    /// Potential energy.
    pub energy: f64,
}

impl ipidrv_force_input_t {
    /// Wrap caller-owned buffers.
    ///
    /// # Safety
    /// `positions` must hold `3 * n_atoms` values and both buffers must
    /// outlive the returned struct; release it with [`Self::release`].
    pub(crate) unsafe fn borrowed(positions: &mut [f64], box_matrix: &mut [f64; 9]) -> Self {
        let n = (positions.len() / 3) as i64;
        Self {
            positions: unsafe { borrow_f64_tensor(positions.as_mut_ptr(), vec![n, 3]) },
            box_matrix: unsafe { borrow_f64_tensor(box_matrix.as_mut_ptr(), vec![3, 3]) },
        }
    }

    /// Free the tensor metadata; the borrowed buffers are untouched.
    pub(crate) fn release(&mut self) {
        unsafe {
            ipidrv_tensor_free(self.positions);
            ipidrv_tensor_free(self.box_matrix);
        }
        self.positions = std::ptr::null_mut();
        self.box_matrix = std::ptr::null_mut();
    }

    /// `n_atoms` from the positions tensor's `shape[0]`.
    ///
    /// # Safety
    /// `positions` must be null or a valid DLPack tensor.
    pub unsafe fn n_atoms(&self) -> Option<usize> {
        if self.positions.is_null() {
            return None;
        }
        let t = unsafe { &(*self.positions).dl_tensor };
        if t.ndim < 1 || t.shape.is_null() {
            return None;
        }
        Some(unsafe { *t.shape } as usize)
    }
}

impl Default for ipidrv_force_out_t {
    fn default() -> Self {
        Self {
            forces: std::ptr::null_mut(),
            energy: 0.0,
        }
    }
}

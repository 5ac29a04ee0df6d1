// MIT License
// Copyright 2026--present ipidrv developers

//! C API for the potential handle lifecycle.
//!
//! ```c
//! // 1. Wrap the C++ object behind a callback
//! ipidrv_potential_t *pot = ipidrv_potential_new(my_callback, my_data, NULL);
//!
//! // 2. Serve the orchestrator until it sends EXIT
//! ipidrv_status_t s = ipidrv_driver_run(pot, "127.0.0.1", 31415, 10.0);
//!
//! // 3. Clean up
//! ipidrv_potential_free(pot);
//! ```

use std::os::raw::c_void;

use crate::potential::{ipidrv_potential_t, CallbackPotential, FreeFn, PotentialCallback};

/// Create a new potential handle from a callback function pointer.
///
/// - `callback`: computes energy (eV) and forces (eV/Å) for one
///   configuration.
/// - `user_data`: opaque pointer forwarded to every callback invocation
///   (typically a pointer to the C++ potential object).
/// - `free_fn`: optional destructor for `user_data`. Pass `NULL` if the
///   caller manages the lifetime externally.
///
/// The returned handle must eventually be passed to `ipidrv_potential_free`.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_potential_new(
    callback: PotentialCallback,
    user_data: *mut c_void,
    free_fn: Option<FreeFn>,
) -> *mut ipidrv_potential_t {
    Box::into_raw(Box::new(CallbackPotential::new(callback, user_data, free_fn)))
}

/// Free a potential handle previously obtained from `ipidrv_potential_new`.
///
/// `NULL` is a no-op. After this call, `pot` must not be used again.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_potential_free(pot: *mut ipidrv_potential_t) {
    if !pot.is_null() {
        drop(unsafe { Box::from_raw(pot) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::tests::spring_callback;
    use std::sync::atomic::{AtomicBool, Ordering};

    static FREE_CALLED: AtomicBool = AtomicBool::new(false);

    unsafe extern "C" fn track_free(_ptr: *mut c_void) {
        FREE_CALLED.store(true, Ordering::SeqCst);
    }

    #[test]
    fn new_returns_non_null() {
        let pot = unsafe { ipidrv_potential_new(spring_callback, std::ptr::null_mut(), None) };
        assert!(!pot.is_null());
        unsafe { ipidrv_potential_free(pot) };
    }

    #[test]
    fn free_null_is_noop() {
        unsafe { ipidrv_potential_free(std::ptr::null_mut()) };
    }

    #[test]
    fn free_runs_user_destructor() {
        FREE_CALLED.store(false, Ordering::SeqCst);
        let mut dummy: u8 = 42;
        let pot = unsafe {
            ipidrv_potential_new(
                spring_callback,
                &mut dummy as *mut u8 as *mut c_void,
                Some(track_free),
            )
        };
        assert!(!FREE_CALLED.load(Ordering::SeqCst));
        unsafe { ipidrv_potential_free(pot) };
        assert!(FREE_CALLED.load(Ordering::SeqCst));
    }
}

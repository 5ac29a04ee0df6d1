// MIT License
// Copyright 2026--present ipidrv developers

//! C API for serving an orchestrator.
//!
//! `ipidrv_driver_run` blocks the calling thread for the whole session: it
//! connects, answers every command with the given potential, and returns
//! once the orchestrator sends EXIT (`IPIDRV_SUCCESS`) or something goes
//! wrong (any other status, with details in `ipidrv_last_error()`).

use std::ffi::CStr;
use std::os::raw::c_char;
use std::time::Duration;

use tracing::info;

use crate::driver::{ConnectOptions, Driver};
use crate::potential::ipidrv_potential_t;
use crate::status::{catch_unwind, ipidrv_status_t, report, set_last_error};

/// Connect to `host:port` and serve the orchestrator with `pot` until EXIT.
///
/// `connect_timeout_secs` bounds the wait for the orchestrator to accept.
/// The potential handle stays owned by the caller and may be reused for
/// another run.
///
/// # Safety
/// `pot` must be a handle from `ipidrv_potential_new`; `host` must be a
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_driver_run(
    pot: *mut ipidrv_potential_t,
    host: *const c_char,
    port: u16,
    connect_timeout_secs: f64,
) -> ipidrv_status_t {
    catch_unwind(std::panic::AssertUnwindSafe(|| {
        if pot.is_null() {
            set_last_error("ipidrv_driver_run: pot is NULL");
            return ipidrv_status_t::IPIDRV_INVALID_PARAMETER;
        }
        if host.is_null() {
            set_last_error("ipidrv_driver_run: host is NULL");
            return ipidrv_status_t::IPIDRV_INVALID_PARAMETER;
        }
        let host = match unsafe { CStr::from_ptr(host) }.to_str() {
            Ok(s) => s.to_owned(),
            Err(e) => {
                set_last_error(&format!("ipidrv_driver_run: invalid host string: {e}"));
                return ipidrv_status_t::IPIDRV_INVALID_PARAMETER;
            }
        };
        let connect_timeout = match Duration::try_from_secs_f64(connect_timeout_secs) {
            Ok(d) => d,
            Err(_) => {
                set_last_error(&format!(
                    "ipidrv_driver_run: invalid connect timeout {connect_timeout_secs}"
                ));
                return ipidrv_status_t::IPIDRV_INVALID_PARAMETER;
            }
        };

        let opts = ConnectOptions {
            host,
            port,
            connect_timeout,
            ..Default::default()
        };
        let pot = unsafe { &mut *pot };
        let result = Driver::connect(&opts, pot).and_then(|mut driver| driver.run());
        match result {
            Ok(()) => {
                info!(host = %opts.host, port, "orchestrator finished");
                ipidrv_status_t::IPIDRV_SUCCESS
            }
            Err(e) => report("ipidrv_driver_run", &e),
        }
    }))
}

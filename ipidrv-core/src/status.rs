// MIT License
// Copyright 2026--present ipidrv developers

//! Error reporting across the C boundary.
//!
//! Every `extern "C"` function returns an [`ipidrv_status_t`]. On failure a
//! human-readable description is stored in a thread-local slot that the caller
//! reads with [`ipidrv_last_error()`]; the pointer stays valid until the next
//! `ipidrv_*` call on the same thread. Rust panics are caught by
//! [`catch_unwind`] before they reach C and become `IPIDRV_INTERNAL_ERROR`.
//!
//! ```c
//! ipidrv_status_t s = ipidrv_driver_run(pot, "127.0.0.1", 31415, 10.0);
//! if (s != IPIDRV_SUCCESS) {
//!     fprintf(stderr, "ipidrv error: %s\n", ipidrv_last_error());
//! }
//! ```

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use crate::error::DriverError;

/// Status codes returned by all C API functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ipidrv_status_t {
    /// Operation completed successfully (for a driver run: the orchestrator
    /// sent EXIT).
    IPIDRV_SUCCESS = 0,
    /// An invalid parameter was passed (null pointer, bad string, etc.).
    IPIDRV_INVALID_PARAMETER = 1,
    /// An internal error occurred (e.g. a Rust panic was caught).
    IPIDRV_INTERNAL_ERROR = 2,
    /// The socket failed or the orchestrator went away.
    IPIDRV_TRANSPORT_ERROR = 3,
    /// Connecting, or waiting for a header, timed out.
    IPIDRV_TIMEOUT = 4,
    /// The orchestrator broke the protocol.
    IPIDRV_PROTOCOL_ERROR = 5,
    /// The potential failed to produce a result.
    IPIDRV_EVALUATOR_ERROR = 6,
}

impl From<&DriverError> for ipidrv_status_t {
    fn from(e: &DriverError) -> Self {
        match e {
            DriverError::ConnectionTimeout { .. } => Self::IPIDRV_TIMEOUT,
            DriverError::ConnectionClosed | DriverError::Io(_) => Self::IPIDRV_TRANSPORT_ERROR,
            DriverError::UnknownCommand(_)
            | DriverError::MalformedPayload(_)
            | DriverError::ProtocolViolation(_) => Self::IPIDRV_PROTOCOL_ERROR,
            DriverError::Evaluator(_) => Self::IPIDRV_EVALUATOR_ERROR,
            DriverError::Config(_) => Self::IPIDRV_INVALID_PARAMETER,
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

/// Store an error message in the thread-local slot.
pub(crate) fn set_last_error(msg: &str) {
    let c = CString::new(msg.replace('\0', "\\0")).unwrap_or_default();
    LAST_ERROR.with(|cell| *cell.borrow_mut() = c);
}

/// Read the thread-local error message back as a Rust string.
pub(crate) fn last_error_string() -> String {
    LAST_ERROR.with(|cell| cell.borrow().to_string_lossy().into_owned())
}

/// Record `e` as the last error and return its status code.
pub(crate) fn report(context: &str, e: &DriverError) -> ipidrv_status_t {
    set_last_error(&format!("{context}: {e}"));
    e.into()
}

/// Pointer to the last error message for the current thread.
///
/// # Safety
/// Intended to be called from C. The returned pointer must not be freed and
/// is invalidated by the next `ipidrv_*` call on the same thread.
#[no_mangle]
pub unsafe extern "C" fn ipidrv_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| cell.borrow().as_ptr())
}

/// Run `f`, turning a panic into `IPIDRV_INTERNAL_ERROR` with the panic
/// message stored as the last error.
pub(crate) fn catch_unwind<F>(f: F) -> ipidrv_status_t
where
    F: FnOnce() -> ipidrv_status_t + std::panic::UnwindSafe,
{
    std::panic::catch_unwind(f).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        set_last_error(&msg);
        ipidrv_status_t::IPIDRV_INTERNAL_ERROR
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn last_error_round_trips_through_c_string() {
        set_last_error("socket gone");
        let msg = unsafe { std::ffi::CStr::from_ptr(ipidrv_last_error()) };
        assert_eq!(msg.to_str().unwrap(), "socket gone");
        assert_eq!(last_error_string(), "socket gone");
    }

    #[test]
    fn interior_nul_is_escaped() {
        set_last_error("a\0b");
        assert_eq!(last_error_string(), "a\\0b");
    }

    #[test]
    fn driver_errors_map_to_codes() {
        let timeout = DriverError::ConnectionTimeout {
            addr: "h:1".into(),
            after: Duration::from_secs(1),
        };
        assert_eq!(ipidrv_status_t::from(&timeout), ipidrv_status_t::IPIDRV_TIMEOUT);
        assert_eq!(
            ipidrv_status_t::from(&DriverError::ConnectionClosed),
            ipidrv_status_t::IPIDRV_TRANSPORT_ERROR
        );
        assert_eq!(
            ipidrv_status_t::from(&DriverError::ProtocolViolation("x".into())),
            ipidrv_status_t::IPIDRV_PROTOCOL_ERROR
        );
        assert_eq!(
            ipidrv_status_t::from(&DriverError::Evaluator("x".into())),
            ipidrv_status_t::IPIDRV_EVALUATOR_ERROR
        );
    }

    #[test]
    fn report_prefixes_context() {
        let code = report("ipidrv_driver_run", &DriverError::ConnectionClosed);
        assert_eq!(code, ipidrv_status_t::IPIDRV_TRANSPORT_ERROR);
        assert_eq!(
            last_error_string(),
            "ipidrv_driver_run: connection closed by peer"
        );
    }

    #[test]
    fn catch_unwind_passes_status_through() {
        let status = catch_unwind(|| ipidrv_status_t::IPIDRV_SUCCESS);
        assert_eq!(status, ipidrv_status_t::IPIDRV_SUCCESS);
    }

    #[test]
    fn catch_unwind_converts_panic() {
        let status = catch_unwind(|| panic!("boom"));
        assert_eq!(status, ipidrv_status_t::IPIDRV_INTERNAL_ERROR);
        assert_eq!(last_error_string(), "boom");
    }
}

// MIT License
// Copyright 2026--present ipidrv developers

//! Public C API entry points.
//!
//! Each submodule exposes `extern "C"` functions that cbindgen collects into
//! `ipidrv-core/include/ipidrv.h`. All functions in this module follow three
//! invariants:
//!
//! 1. **Return [`ipidrv_status_t`](crate::status::ipidrv_status_t)** (or a
//!    pointer / void for constructors and destructors).
//! 2. **Wrap the body in [`catch_unwind`](crate::status::catch_unwind)** so
//!    that panics never cross the FFI boundary.
//! 3. **Validate pointer arguments** and call
//!    [`set_last_error`](crate::status::set_last_error) before returning a
//!    non-success status.
//!
//! ## Submodules
//!
//! - [`potential`]: lifecycle of
//!   [`ipidrv_potential_t`](crate::potential::ipidrv_potential_t), create and
//!   free.
//! - [`driver`]: serve an i-PI orchestrator with a potential handle.

pub mod driver;
pub mod potential;

// MIT License
// Copyright 2026--present ipidrv developers

//! # ipidrv-core
//!
//! Client side of the i-PI socket protocol: a force driver that connects to
//! an orchestrator over TCP, receives atomic configurations, and answers with
//! energies, forces and the virial computed by a pluggable [`Evaluator`].
//!
//! ## Layers
//!
//! - [`transport`]: connect, send-all, receive-exact over a TCP socket.
//! - [`codec`]: fixed-width headers and binary payloads, atomic-unit
//!   conversion at the wire.
//! - [`session`]: the protocol state machine, one command per step.
//! - [`evaluator`]: the force capability and the bundled backends.
//! - [`driver`]: connected clients and the reconnecting supervisor.
//! - [`config`]: TOML configuration used by the `ipidrv` binary.
//!
//! ## C API
//!
//! The library is also built as `staticlib`/`cdylib` so that C and C++
//! potentials can be served directly: wrap the potential in a callback with
//! `ipidrv_potential_new`, then hand it to `ipidrv_driver_run`. Tensors cross
//! the boundary as DLPack (see [`tensor`] and [`types`]); errors are reported
//! through [`status`].
//!
//! ## Units
//!
//! Everything inside the crate is SI (m, J, N). The wire carries atomic
//! units; [`units`] holds the conversion constants.

#![allow(non_camel_case_types)]

pub mod units;
pub mod error;
pub mod model;
pub mod transport;
pub mod codec;
pub mod evaluator;
pub mod session;
pub mod driver;
pub mod config;

pub mod status;
pub mod tensor;
pub mod types;
pub mod potential;
pub mod c_api;

pub use driver::{supervise, ConnectOptions, Driver};
pub use error::{DriverError, Result};
pub use evaluator::{Evaluation, Evaluator};
pub use model::{Configuration, ForceResult, InitPayload, SimulationCell};
pub use session::{Flow, Policy, Session, SessionState};

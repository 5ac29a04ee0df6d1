// MIT License
// Copyright 2026--present ipidrv developers

//! The force-evaluation capability.
//!
//! An [`Evaluator`] turns a [`Configuration`] into an energy and its gradient.
//! It is the only extension point of the driver: the session decodes
//! coordinates, calls [`Evaluator::evaluate`], negates the gradient into
//! forces, and keeps the result until the orchestrator asks for it.
//!
//! **Sign Convention**
//!
//! `Evaluation::gradient` is `dE/dx`, not the force. Every implementation in
//! this crate follows that convention, and so must external ones.
//!
//! **Provided Evaluators**
//!
//! - [`Harmonic`]: closed-form toy potential, no I/O.
//! - [`Gaussian`]: runs an external Gaussian executable per step.
//! - [`CallbackPotential`](crate::potential::CallbackPotential): a C/C++
//!   potential behind a function pointer.

mod gaussian;
mod harmonic;

pub use gaussian::Gaussian;
pub use harmonic::Harmonic;

use crate::error::Result;
use crate::model::{Configuration, InitPayload};

/// Energy and gradient for one configuration, in SI units.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Potential energy in Joules.
    pub energy: f64,
    /// `dE/dx` in J/m, one row per atom.
    pub gradient: Vec<[f64; 3]>,
    /// Optional string forwarded verbatim in the GETFORCE reply.
    pub extra: Option<String>,
}

/// A synchronous energy/gradient backend.
pub trait Evaluator {
    /// Compute energy and gradient for `config`.
    ///
    /// Failures are fatal for the step: the session never sends a partial
    /// result.
    fn evaluate(&mut self, config: &Configuration) -> Result<Evaluation>;

    /// Hook for the orchestrator's INIT blob. Most evaluators ignore it.
    fn on_init(&mut self, _init: &InitPayload) -> Result<()> {
        Ok(())
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&mut self, config: &Configuration) -> Result<Evaluation> {
        (**self).evaluate(config)
    }

    fn on_init(&mut self, init: &InitPayload) -> Result<()> {
        (**self).on_init(init)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for &mut E {
    fn evaluate(&mut self, config: &Configuration) -> Result<Evaluation> {
        (**self).evaluate(config)
    }

    fn on_init(&mut self, init: &InitPayload) -> Result<()> {
        (**self).on_init(init)
    }
}

// MIT License
// Copyright 2026--present ipidrv developers

//! The client-side protocol state machine.
//!
//! A [`Session`] owns one [`Channel`] and one [`Evaluator`]. Each call to
//! [`Session::step`] reads exactly one 12-byte header and handles it
//! completely before returning; the driver never sends anything unsolicited.
//!
//! | Command | Effect | Reply |
//! |---------|--------|-------|
//! | `STATUS` | none | `NEEDINIT` / `HAVEDATA` / `READY` |
//! | `INIT` | read bead + blob, call `on_init`, mark initialised | none |
//! | `POSDATA` | read cell + coordinates, evaluate, store result | none |
//! | `GETFORCE` | send the stored result, clear it | `FORCEREADY` + payload |
//! | `EXIT` | close the channel | none, returns [`Flow::Exit`] |
//!
//! Outcomes are tagged: `Ok(Flow::Continue)`, `Ok(Flow::Exit)`, or `Err(_)`
//! for anything fatal to this client instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec::{self, Command, Reply};
use crate::error::{DriverError, Result};
use crate::evaluator::Evaluator;
use crate::model::{Configuration, ForceResult};
use crate::transport::Channel;

/// How strictly protocol irregularities are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Ignore unknown headers and let a second POSDATA overwrite a pending
    /// result, logging a warning each time.
    #[default]
    Lenient,
    /// Fail on unknown headers and on POSDATA while a result is pending.
    Strict,
}

/// What the caller should do after a handled command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The orchestrator sent EXIT; the channel is closed.
    Exit,
}

/// Observable protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub initialized: bool,
    pub result_pending: bool,
}

pub struct Session<C, E> {
    channel: C,
    evaluator: E,
    policy: Policy,
    header_timeout: Option<Duration>,
    initialized: bool,
    bead: Option<i32>,
    configuration: Option<Configuration>,
    pending: Option<ForceResult>,
}

impl<C: Channel, E: Evaluator> Session<C, E> {
    pub fn new(channel: C, evaluator: E) -> Self {
        Self {
            channel,
            evaluator,
            policy: Policy::default(),
            header_timeout: None,
            initialized: false,
            bead: None,
            configuration: None,
            pending: None,
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound the wait for each command header. Payload reads are never
    /// bounded.
    pub fn with_header_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.header_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            initialized: self.initialized,
            result_pending: self.pending.is_some(),
        }
    }

    /// Bead index from the last INIT, if any.
    pub fn bead(&self) -> Option<i32> {
        self.bead
    }

    /// Geometry from the last POSDATA, if any.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn into_parts(self) -> (C, E) {
        (self.channel, self.evaluator)
    }

    /// The STATUS reply for the current state.
    pub fn status_reply(&self) -> Reply {
        if !self.initialized {
            Reply::NeedInit
        } else if self.pending.is_some() {
            Reply::HaveData
        } else {
            Reply::Ready
        }
    }

    /// Read one header and handle it.
    pub fn step(&mut self) -> Result<Flow> {
        match codec::decode_header(&mut self.channel, self.header_timeout) {
            Ok(cmd) => self.dispatch(cmd),
            Err(DriverError::UnknownCommand(header)) if self.policy == Policy::Lenient => {
                warn!(header = %header, "ignoring unknown command");
                Ok(Flow::Continue)
            }
            Err(e) => Err(e),
        }
    }

    /// Handle `cmd` whose header has already been consumed.
    pub fn dispatch(&mut self, cmd: Command) -> Result<Flow> {
        debug!(command = cmd.literal(), "received");
        match cmd {
            Command::Status => self.handle_status(),
            Command::Init => self.handle_init(),
            Command::PosData => self.handle_posdata(),
            Command::GetForce => self.handle_getforce(),
            Command::Exit => {
                self.channel.close();
                info!("orchestrator requested exit");
                return Ok(Flow::Exit);
            }
        }?;
        Ok(Flow::Continue)
    }

    /// Step until EXIT. Any error closes the channel before it is returned.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(()),
                Err(e) => {
                    self.channel.close();
                    return Err(e);
                }
            }
        }
    }

    fn handle_status(&mut self) -> Result<()> {
        let reply = self.status_reply();
        self.channel.send_all(&codec::encode_status_reply(reply))
    }

    fn handle_init(&mut self) -> Result<()> {
        let init = codec::decode_init(&mut self.channel)?;
        info!(bead = init.bead, bytes = init.data.len(), "initialised");
        self.evaluator.on_init(&init)?;
        self.bead = Some(init.bead);
        self.initialized = true;
        Ok(())
    }

    fn handle_posdata(&mut self) -> Result<()> {
        if self.pending.is_some() {
            if self.policy == Policy::Strict {
                return Err(DriverError::ProtocolViolation(
                    "POSDATA received while a result is still pending".into(),
                ));
            }
            warn!("POSDATA overwrites a result that was never retrieved");
        }

        let cell = codec::decode_cell(&mut self.channel)?;
        let n = codec::decode_atom_count(&mut self.channel)?;
        let positions = codec::decode_coordinates(&mut self.channel, n)?;
        let config = Configuration { cell, positions };

        let eval = self.evaluator.evaluate(&config)?;
        if eval.gradient.len() != n {
            return Err(DriverError::Evaluator(format!(
                "evaluator returned {} gradient rows for {n} atoms",
                eval.gradient.len()
            )));
        }
        let forces = eval.gradient.iter().map(|g| g.map(|gi| -gi)).collect();
        self.pending = Some(ForceResult::new(
            eval.energy,
            forces,
            &config.positions,
            eval.extra.unwrap_or_default(),
        ));
        self.configuration = Some(config);
        debug!(atoms = n, "result ready");
        Ok(())
    }

    fn handle_getforce(&mut self) -> Result<()> {
        let result = self.pending.take().ok_or_else(|| {
            DriverError::ProtocolViolation("GETFORCE received with no pending result".into())
        })?;
        let bytes = codec::encode_force_reply(&result)?;
        self.channel.send_all(&bytes)
    }
}

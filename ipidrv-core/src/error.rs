// MIT License
// Copyright 2026--present ipidrv developers

//! Error type shared by the transport, codec, session and evaluators.
//!
//! A normal `EXIT` from the orchestrator is *not* an error; it is reported as
//! [`Flow::Exit`](crate::session::Flow::Exit). Everything in this enum aborts
//! the current client instance. [`DriverError::is_disconnect`] tells a
//! supervisor whether constructing a fresh client and reconnecting makes
//! sense.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while driving an i-PI session.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The peer did not accept (or did not send) within the configured window.
    #[error("connection to {addr} timed out after {after:?}")]
    ConnectionTimeout { addr: String, after: Duration },

    /// The peer shut the connection down, or the pipe broke mid-write.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Any other socket-level failure.
    #[error("transport I/O error: {0}")]
    Io(#[source] io::Error),

    /// A 12-byte header that is not one of the recognised commands.
    #[error("unknown command header {0:?}")]
    UnknownCommand(String),

    /// A payload whose declared sizes cannot be honoured.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A command arrived in a state where it is not legal.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The force evaluator failed to produce a result for this step.
    #[error("evaluator failed: {0}")]
    Evaluator(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DriverError {
    /// Conditions after which a supervisor may reconnect with a fresh client.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::ConnectionTimeout { .. })
    }
}

impl From<io::Error> for DriverError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::ConnectionClosed,
            _ => Self::Io(e),
        }
    }
}

pub type Result<T, E = DriverError> = std::result::Result<T, E>;

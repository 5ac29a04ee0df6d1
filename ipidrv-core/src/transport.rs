// MIT License
// Copyright 2026--present ipidrv developers

//! Exact-length byte transfer over the orchestrator socket.
//!
//! [`Channel`] is the seam between the protocol engine and the wire: the
//! session only ever asks for "exactly these many bytes" or "all of these
//! bytes". [`TcpTransport`] is the production implementation.
//!
//! ## Blocking over an owned runtime
//!
//! Like the rest of the crate, the transport is synchronous from the caller's
//! point of view. Internally it owns a current-thread tokio runtime and drives
//! the async socket with `block_on`, which keeps the connect and read
//! timeouts on `tokio::time` instead of raw socket options.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::error::{DriverError, Result};

/// A bidirectional byte stream with exact-length semantics.
pub trait Channel {
    /// Fill `buf` completely.
    ///
    /// With `timeout == None` the call blocks until the bytes arrive or the
    /// peer goes away.
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<()>;

    /// Write every byte of `bytes`.
    fn send_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Release the underlying stream. Calling it twice is harmless.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// TCP connection to an i-PI orchestrator.
pub struct TcpTransport {
    runtime: Runtime,
    stream: Option<TcpStream>,
    peer: String,
}

impl TcpTransport {
    /// Connect to `host:port`, failing with
    /// [`DriverError::ConnectionTimeout`] if the orchestrator does not accept
    /// within `connect_timeout`.
    ///
    /// Once connected, reads block indefinitely unless a timeout is passed to
    /// [`Channel::recv_exact`].
    pub fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(DriverError::Io)?;
        let peer = format!("{host}:{port}");

        let stream = runtime
            .block_on(async {
                tokio::time::timeout(connect_timeout, TcpStream::connect(peer.as_str())).await
            })
            .map_err(|_| DriverError::ConnectionTimeout {
                addr: peer.clone(),
                after: connect_timeout,
            })?
            .map_err(DriverError::from)?;
        stream.set_nodelay(true)?;

        info!(peer = %peer, "connected to orchestrator");
        Ok(Self {
            runtime,
            stream: Some(stream),
            peer,
        })
    }

    /// The `host:port` this transport was connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Channel for TcpTransport {
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<()> {
        let Self {
            runtime,
            stream,
            peer,
        } = self;
        let stream = stream.as_mut().ok_or(DriverError::ConnectionClosed)?;

        runtime.block_on(async {
            let read = stream.read_exact(buf);
            match timeout {
                Some(after) => tokio::time::timeout(after, read)
                    .await
                    .map_err(|_| DriverError::ConnectionTimeout {
                        addr: peer.clone(),
                        after,
                    })?
                    .map_err(DriverError::from)?,
                None => read.await.map_err(DriverError::from)?,
            };
            Ok::<(), DriverError>(())
        })
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        let Self {
            runtime, stream, ..
        } = self;
        let stream = stream.as_mut().ok_or(DriverError::ConnectionClosed)?;

        runtime.block_on(async {
            stream.write_all(bytes).await?;
            stream.flush().await?;
            Ok::<(), DriverError>(())
        })
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = self.runtime.block_on(stream.shutdown());
            debug!(peer = %self.peer, "transport closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-memory channel used by unit tests: reads come from a scripted input
/// buffer, writes are collected for inspection.
#[cfg(test)]
pub(crate) struct MemoryChannel {
    pub input: Vec<u8>,
    pub cursor: usize,
    pub output: Vec<u8>,
    pub open: bool,
}

#[cfg(test)]
impl MemoryChannel {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input,
            cursor: 0,
            output: Vec::new(),
            open: true,
        }
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.cursor
    }
}

#[cfg(test)]
impl Channel for MemoryChannel {
    fn recv_exact(&mut self, buf: &mut [u8], _timeout: Option<Duration>) -> Result<()> {
        if !self.open || self.remaining() < buf.len() {
            return Err(DriverError::ConnectionClosed);
        }
        buf.copy_from_slice(&self.input[self.cursor..self.cursor + buf.len()]);
        self.cursor += buf.len();
        Ok(())
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(DriverError::ConnectionClosed);
        }
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

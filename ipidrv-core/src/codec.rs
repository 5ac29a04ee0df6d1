// MIT License
// Copyright 2026--present ipidrv developers

//! Binary layouts of the i-PI socket protocol.
//!
//! ## Wire Format
//!
//! Every message starts with a 12-byte ASCII header, right-padded with
//! spaces. Integers are 4-byte `i32`, reals are 8-byte IEEE-754 `f64`, both in
//! the native byte order of the orchestrator's machine (there is no
//! negotiation, so the driver must run on a platform of the same endianness).
//!
//! ```text
//! INIT      -> [bead:i32][len:i32][payload:len]
//! POSDATA   -> [cell:9*f64][inverse:9*f64][n:i32][coords:3n*f64]
//! GETFORCE  <- [FORCEREADY:12][energy:f64][n:i32][forces:3n*f64]
//!              [virial:9*f64][len:i32][extra:len]
//! ```
//!
//! Lengths and energies on the wire are in atomic units (Bohr, Hartree). The
//! decode functions return SI values and the encode functions expect them;
//! see [`crate::units`].

use std::time::Duration;

use crate::error::{DriverError, Result};
use crate::model::{ForceResult, InitPayload, Matrix3, SimulationCell};
use crate::transport::Channel;
use crate::units;

/// Size of every command/reply header.
pub const HEADER_LEN: usize = 12;
/// Size of an integer on the wire.
pub const INT: usize = 4;
/// Size of a real on the wire.
pub const FLOAT: usize = 8;
/// Variable-length payloads are received in pieces of at most this size, so
/// memory grows with the bytes that actually arrive, not with a declared count.
const READ_CHUNK: usize = 64 * 1024;

/// Commands the orchestrator sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Status,
    Init,
    PosData,
    GetForce,
    Exit,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Status,
        Command::Init,
        Command::PosData,
        Command::GetForce,
        Command::Exit,
    ];

    pub fn literal(self) -> &'static str {
        match self {
            Command::Status => "STATUS",
            Command::Init => "INIT",
            Command::PosData => "POSDATA",
            Command::GetForce => "GETFORCE",
            Command::Exit => "EXIT",
        }
    }

    /// Parse a raw header. Surrounding whitespace is ignored, the rest must
    /// match a command literal exactly.
    pub fn parse(raw: &[u8; HEADER_LEN]) -> Result<Self> {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim();
        Command::ALL
            .into_iter()
            .find(|c| c.literal() == trimmed)
            .ok_or_else(|| DriverError::UnknownCommand(trimmed.to_string()))
    }

    pub fn header(self) -> [u8; HEADER_LEN] {
        pad_header(self.literal())
    }
}

/// Replies the driver sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reply {
    NeedInit,
    Ready,
    HaveData,
    ForceReady,
}

impl Reply {
    pub fn literal(self) -> &'static str {
        match self {
            Reply::NeedInit => "NEEDINIT",
            Reply::Ready => "READY",
            Reply::HaveData => "HAVEDATA",
            Reply::ForceReady => "FORCEREADY",
        }
    }

    pub fn header(self) -> [u8; HEADER_LEN] {
        pad_header(self.literal())
    }
}

/// Right-pad `literal` with spaces to a full header.
pub fn pad_header(literal: &str) -> [u8; HEADER_LEN] {
    let mut out = [b' '; HEADER_LEN];
    let bytes = literal.as_bytes();
    let n = bytes.len().min(HEADER_LEN);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Read one header. An unrecognised header yields
/// [`DriverError::UnknownCommand`] after the 12 bytes have been consumed.
pub fn decode_header<C: Channel + ?Sized>(ch: &mut C, timeout: Option<Duration>) -> Result<Command> {
    let mut raw = [0u8; HEADER_LEN];
    ch.recv_exact(&mut raw, timeout)?;
    Command::parse(&raw)
}

/// Read the INIT body: bead index, declared length, then that many bytes.
pub fn decode_init<C: Channel + ?Sized>(ch: &mut C) -> Result<InitPayload> {
    let bead = recv_i32(ch)?;
    let len = recv_i32(ch)?;
    let len = usize::try_from(len)
        .map_err(|_| DriverError::MalformedPayload(format!("negative INIT length {len}")))?;
    let data = recv_bytes(ch, len)?;
    Ok(InitPayload { bead, data })
}

/// Read the cell and inverse cell, converting Bohr to metres.
pub fn decode_cell<C: Channel + ?Sized>(ch: &mut C) -> Result<SimulationCell> {
    let cell = recv_matrix3(ch)?.map(|row| row.map(units::bohr_to_m));
    let inverse = recv_matrix3(ch)?.map(|row| row.map(units::inv_bohr_to_inv_m));
    Ok(SimulationCell { cell, inverse })
}

pub fn decode_atom_count<C: Channel + ?Sized>(ch: &mut C) -> Result<usize> {
    let n = recv_i32(ch)?;
    usize::try_from(n)
        .map_err(|_| DriverError::MalformedPayload(format!("negative atom count {n}")))
}

/// Read `n` coordinate triples, converting Bohr to metres.
pub fn decode_coordinates<C: Channel + ?Sized>(ch: &mut C, n: usize) -> Result<Vec<[f64; 3]>> {
    let len = n
        .checked_mul(3 * FLOAT)
        .ok_or_else(|| DriverError::MalformedPayload(format!("atom count {n} overflows")))?;
    let raw = recv_bytes(ch, len)?;
    Ok(f64s_from_ne_bytes(&raw)
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]].map(units::bohr_to_m))
        .collect())
}

fn recv_bytes<C: Channel + ?Sized>(ch: &mut C, len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(len.min(READ_CHUNK));
    let mut chunk = vec![0u8; len.min(READ_CHUNK)];
    while out.len() < len {
        let take = (len - out.len()).min(READ_CHUNK);
        ch.recv_exact(&mut chunk[..take], None)?;
        out.extend_from_slice(&chunk[..take]);
    }
    Ok(out)
}

fn recv_i32<C: Channel + ?Sized>(ch: &mut C) -> Result<i32> {
    let mut buf = [0u8; INT];
    ch.recv_exact(&mut buf, None)?;
    Ok(i32::from_ne_bytes(buf))
}

fn recv_matrix3<C: Channel + ?Sized>(ch: &mut C) -> Result<Matrix3> {
    let mut buf = [0u8; 9 * FLOAT];
    ch.recv_exact(&mut buf, None)?;
    let v = f64s_from_ne_bytes(&buf);
    Ok([
        [v[0], v[1], v[2]],
        [v[3], v[4], v[5]],
        [v[6], v[7], v[8]],
    ])
}

fn f64s_from_ne_bytes(raw: &[u8]) -> Vec<f64> {
    raw.chunks_exact(FLOAT)
        .map(|c| {
            let mut b = [0u8; FLOAT];
            b.copy_from_slice(c);
            f64::from_ne_bytes(b)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Header for a STATUS reply.
pub fn encode_status_reply(kind: Reply) -> [u8; HEADER_LEN] {
    kind.header()
}

/// Number of bytes [`encode_force_reply`] produces for `n_atoms` atoms and an
/// extra string of `extra_len` bytes (an empty string is sent as one space).
pub fn force_reply_len(n_atoms: usize, extra_len: usize) -> usize {
    HEADER_LEN + FLOAT + INT + 3 * n_atoms * FLOAT + 9 * FLOAT + INT + extra_len.max(1)
}

/// Serialise a complete GETFORCE reply, converting SI to atomic units.
pub fn encode_force_reply(result: &ForceResult) -> Result<Vec<u8>> {
    let extra: &[u8] = if result.extra.is_empty() {
        b" "
    } else {
        result.extra.as_bytes()
    };
    let n = i32::try_from(result.n_atoms()).map_err(|_| {
        DriverError::MalformedPayload(format!("{} atoms do not fit in i32", result.n_atoms()))
    })?;
    let extra_len = i32::try_from(extra.len()).map_err(|_| {
        DriverError::MalformedPayload(format!("extra string of {} bytes is too long", extra.len()))
    })?;

    let mut buf = Vec::with_capacity(force_reply_len(result.n_atoms(), extra.len()));
    buf.extend_from_slice(&Reply::ForceReady.header());
    buf.extend_from_slice(&units::joule_to_hartree(result.energy).to_ne_bytes());
    buf.extend_from_slice(&n.to_ne_bytes());
    for f in result.forces.iter().flatten() {
        buf.extend_from_slice(&units::force_to_wire(*f).to_ne_bytes());
    }
    for v in result.virial.iter().flatten() {
        buf.extend_from_slice(&units::joule_to_hartree(*v).to_ne_bytes());
    }
    buf.extend_from_slice(&extra_len.to_ne_bytes());
    buf.extend_from_slice(extra);
    Ok(buf)
}

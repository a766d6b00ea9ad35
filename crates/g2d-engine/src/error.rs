use core::fmt;

use thiserror::Error;

use crate::params::ColorFormat;

/// Which operand of a blit an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "src"),
            Side::Destination => write!(f, "dst"),
        }
    }
}

/// Geometry/format problems found before any side effect.
///
/// The same request will fail again; callers must not resubmit it unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{side} address is null")]
    NullAddress { side: Side },

    #[error("{side} rectangle is empty ({w}x{h})")]
    EmptyRect { side: Side, w: u32, h: u32 },

    #[error("{side} rectangle x={x} y={y} w={w} h={h} exceeds surface {full_w}x{full_h}")]
    OutOfBounds {
        side: Side,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        full_w: u32,
        full_h: u32,
    },

    #[error("{side} bytes per pixel {bpp} does not match {format:?} ({expected})")]
    PixelSizeMismatch {
        side: Side,
        format: ColorFormat,
        bpp: u32,
        expected: u32,
    },

    #[error("{side} buffer {addr:#x}+{size:#x} exceeds the 32-bit device address space")]
    AddressOverflow { side: Side, addr: u64, size: u64 },

    #[error("rotated destination {w}x{h} at ({x}, {y}) exceeds surface {full_w}x{full_h}")]
    RotatedOutOfBounds {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        full_w: u32,
        full_h: u32,
    },

    #[error("clip window t={t} b={b} l={l} r={r} is inverted or empty")]
    EmptyClip { t: u32, b: u32, l: u32, r: u32 },

    #[error("clip window t={t} b={b} l={l} r={r} is outside the destination drawn area")]
    ClipOutsideDestination { t: u32, b: u32, l: u32, r: u32 },
}

/// Failure of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlitError {
    #[error("invalid blit parameters: {0}")]
    Validation(#[from] ValidationError),

    /// A resolved range is not resident in the requester's page tables.
    #[error("{side} range {start:#x}+{size:#x} is not mapped in {context}")]
    InvalidMapping {
        side: Side,
        start: u64,
        size: u64,
        context: String,
    },

    /// The system MMU raised a translation fault for this transfer.
    #[error("system MMU fault at {addr:#x}")]
    MmuFault { addr: u64 },

    /// The engine reported completion but a fault was raised during the transfer.
    #[error("system MMU fault at {addr:#x} after completion; result discarded")]
    FaultRecovered { addr: u64 },

    /// The engine was reset after failing to complete.
    #[error("engine did not complete within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("wait for completion was interrupted")]
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("engine clock is still in use")]
    InUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("contiguous pool {name} has {free:#x} of {total:#x} bytes free")]
    PoolExhausted { name: String, free: u64, total: u64 },

    #[error("reserved bank for {device} is empty")]
    EmptyBank { device: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("reserved memory: {0}")]
    Region(#[from] RegionError),
}

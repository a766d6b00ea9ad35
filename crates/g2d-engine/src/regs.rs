//! Engine register window.
//!
//! Only the registers the submission path touches are named here.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::params::ColorFormat;

pub const SOFT_RESET: u32 = 0x000;
pub const INTEN: u32 = 0x004;
pub const INTC_PEND: u32 = 0x00C;

pub const BITBLT_START: u32 = 0x100;
pub const BITBLT_COMMAND: u32 = 0x104;

pub const ROTATE: u32 = 0x200;
pub const SRC_MSK_DIRECT: u32 = 0x204;

pub const SRC_SELECT: u32 = 0x300;
pub const SRC_BASE_ADDR: u32 = 0x304;
pub const SRC_STRIDE: u32 = 0x308;
pub const SRC_COLOR_MODE: u32 = 0x30C;
pub const SRC_LEFT_TOP: u32 = 0x310;
pub const SRC_RIGHT_BOTTOM: u32 = 0x314;

pub const DST_SELECT: u32 = 0x400;
pub const DST_BASE_ADDR: u32 = 0x404;
pub const DST_STRIDE: u32 = 0x408;
pub const DST_COLOR_MODE: u32 = 0x40C;
pub const DST_LEFT_TOP: u32 = 0x410;
pub const DST_RIGHT_BOTTOM: u32 = 0x414;

pub const PAT_BASE_ADDR: u32 = 0x500;
pub const PAT_SIZE: u32 = 0x504;
pub const PAT_COLOR_MODE: u32 = 0x508;
pub const PAT_OFFSET: u32 = 0x50C;
pub const PAT_STRIDE: u32 = 0x510;

pub const CW_LEFT_TOP: u32 = 0x600;
pub const CW_RIGHT_BOTTOM: u32 = 0x604;

pub const THIRD_OPERAND: u32 = 0x610;
pub const ROP4: u32 = 0x614;
pub const ALPHA: u32 = 0x618;

pub const FG_COLOR: u32 = 0x700;
pub const BG_COLOR: u32 = 0x704;
pub const BS_COLOR: u32 = 0x708;

// BITBLT_COMMAND
pub const CMD_MASK_EN: u32 = 1 << 0;
pub const CMD_STRETCH_EN: u32 = 1 << 4;
pub const CMD_CW_EN: u32 = 1 << 8;
pub const CMD_TRANSPARENT: u32 = 1 << 12;
pub const CMD_BLUESCREEN: u32 = 2 << 12;
pub const CMD_ALPHA_EN: u32 = 1 << 24;
pub const CMD_BLEND_SHIFT: u32 = 16;

// SRC_MSK_DIRECT
pub const DIR_X_NEGATIVE: u32 = 1 << 0;
pub const DIR_Y_NEGATIVE: u32 = 1 << 4;

pub const ROTATE_90: u32 = 1 << 0;

pub const SELECT_NORMAL: u32 = 0;

// THIRD_OPERAND
pub const THIRD_PATTERN: u32 = 0;
pub const THIRD_FG_COLOR: u32 = 1;
pub const THIRD_BG_COLOR: u32 = 2;

pub const INT_DONE: u32 = 1 << 0;

/// `*_COLOR_MODE` encoding.
pub fn color_mode(format: ColorFormat) -> u32 {
    match format {
        ColorFormat::Xrgb8888 => 0,
        ColorFormat::Argb8888 => 1,
        ColorFormat::Rgb565 => 2,
        ColorFormat::Argb1555 => 4,
        ColorFormat::Argb4444 => 6,
        ColorFormat::Rgb888 => 7,
    }
}

/// Pack a coordinate pair into a `*_LEFT_TOP`/`*_RIGHT_BOTTOM` word.
pub fn xy(x: u32, y: u32) -> u32 {
    ((y & 0xFFFF) << 16) | (x & 0xFFFF)
}

/// Register primitives of the engine's MMIO window.
pub trait EngineRegs {
    fn write(&mut self, offset: u32, value: u32);
    fn read(&mut self, offset: u32) -> u32;
}

impl<T: EngineRegs + ?Sized> EngineRegs for Box<T> {
    fn write(&mut self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }

    fn read(&mut self, offset: u32) -> u32 {
        (**self).read(offset)
    }
}

/// Pulse the soft reset. Aborts whatever the engine was doing.
pub fn reset_engine<R: EngineRegs + ?Sized>(regs: &mut R) {
    regs.write(SOFT_RESET, 1);
}

#[derive(Debug, Default)]
struct Shadow {
    values: BTreeMap<u32, u32>,
    log: Vec<(u32, u32)>,
}

/// Register file that stores values and logs writes in order. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct ShadowRegisters {
    inner: Arc<Mutex<Shadow>>,
}

impl ShadowRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.lock().log.clone()
    }

    pub fn take_writes(&self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.lock().log)
    }

    pub fn value(&self, offset: u32) -> Option<u32> {
        self.lock().values.get(&offset).copied()
    }

    /// Number of writes to `offset`.
    pub fn write_count(&self, offset: u32) -> usize {
        self.lock().log.iter().filter(|(o, _)| *o == offset).count()
    }

    fn lock(&self) -> MutexGuard<'_, Shadow> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EngineRegs for ShadowRegisters {
    fn write(&mut self, offset: u32, value: u32) {
        let mut shadow = self.lock();
        shadow.values.insert(offset, value);
        shadow.log.push((offset, value));
    }

    fn read(&mut self, offset: u32) -> u32 {
        self.lock().values.get(&offset).copied().unwrap_or(0)
    }
}

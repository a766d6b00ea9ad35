//! Blit request model.
//!
//! A request is built by the caller, validated by [`crate::validate`], and then only borrowed by
//! the submission path. Addresses are kernel-physical or user-virtual depending on
//! [`BlitFlags::memory_type`].

use core::fmt;

use bitflags::bitflags;

/// Pixel formats understood by the engine's source/destination/pattern color-mode registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    #[default]
    Rgb565,
    Argb1555,
    Argb4444,
    Rgb888,
    Xrgb8888,
    Argb8888,
}

impl ColorFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ColorFormat::Rgb565 | ColorFormat::Argb1555 | ColorFormat::Argb4444 => 2,
            ColorFormat::Rgb888 => 3,
            ColorFormat::Xrgb8888 | ColorFormat::Argb8888 => 4,
        }
    }
}

/// Output orientation. Rotations are clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
    /// Mirror around the vertical axis.
    FlipX,
    /// Mirror around the horizontal axis.
    FlipY,
}

impl Rotation {
    /// 90° and 270° swap width and height of the drawn area.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Axis-aligned region on a surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Extent {
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.w)
    }

    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// One image operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Surface width in pixels; the line stride is `full_w * bytes_per_pixel`.
    pub full_w: u32,
    pub full_h: u32,
    pub format: ColorFormat,
    pub bytes_per_pixel: u32,
    pub addr: u64,
}

impl Rect {
    pub fn stride(&self) -> u64 {
        u64::from(self.full_w) * u64::from(self.bytes_per_pixel)
    }

    /// Bytes from `addr` to the end of the surface.
    pub fn surface_size(&self) -> u64 {
        self.stride() * u64::from(self.full_h)
    }

    pub fn extent(&self) -> Extent {
        Extent {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }

    /// Area written on this (destination) surface once `rotation` is applied.
    ///
    /// Destination `w`/`h` are given in source orientation, so 90°/270° swap them.
    pub fn drawn_extent(&self, rotation: Rotation) -> Extent {
        if rotation.swaps_axes() {
            Extent {
                x: self.x,
                y: self.y,
                w: self.h,
                h: self.w,
            }
        } else {
            self.extent()
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {} / {}, {} / {:?}, {}, {:#x}",
            self.x,
            self.y,
            self.w,
            self.h,
            self.full_w,
            self.full_h,
            self.format,
            self.bytes_per_pixel,
            self.addr
        )
    }
}

/// Clip window on the destination surface. `b` and `r` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clip {
    pub t: u32,
    pub b: u32,
    pub l: u32,
    pub r: u32,
}

impl Clip {
    /// Clip covering exactly `extent`.
    pub fn from_extent(extent: Extent) -> Self {
        Self {
            t: extent.y,
            b: extent.y.saturating_add(extent.h),
            l: extent.x,
            r: extent.x.saturating_add(extent.w),
        }
    }

    /// `None` if the window is inverted.
    pub fn extent(&self) -> Option<Extent> {
        Some(Extent {
            x: self.l,
            y: self.t,
            w: self.r.checked_sub(self.l)?,
            h: self.b.checked_sub(self.t)?,
        })
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}, {}", self.t, self.b, self.l, self.r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlueScreenMode {
    #[default]
    Opaque,
    /// Pixels matching the color key are not written.
    Transparent,
    /// Pixels matching the color key are replaced with the color-switch value.
    BlueScreen,
}

/// Third operand of the ternary raster operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThirdOperand {
    /// Pattern image read from the source rectangle.
    Pattern,
    #[default]
    ForegroundColor,
    BackgroundColor,
}

/// Porter-Duff compositing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Disabled,
    Clear,
    Src,
    Dst,
    SrcOver,
    DstOver,
    SrcIn,
    DstIn,
    SrcOut,
    DstOut,
    SrcAtop,
    DstAtop,
    Xor,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderMode: u32 {
        /// The driver, not the caller, keeps CPU caches coherent with the transfer.
        const CACHE_OP = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryType {
    /// Addresses are physical and owned by the kernel.
    #[default]
    Kernel,
    /// Addresses are virtual addresses of the calling process.
    User,
}

pub const ALPHA_OPAQUE: u8 = 0xFF;
pub const ROP_SRC_COPY: u8 = 0xCC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitFlags {
    pub rotation: Rotation,
    /// Global alpha; [`ALPHA_OPAQUE`] disables blending.
    pub alpha: u8,
    pub blue_screen: BlueScreenMode,
    pub color_key: u32,
    pub color_switch: u32,
    pub src_color: u32,
    pub third_operand: ThirdOperand,
    /// ROP3 code.
    pub rop: u8,
    pub mask: bool,
    pub render_mode: RenderMode,
    pub blend: BlendMode,
    pub memory_type: MemoryType,
}

impl Default for BlitFlags {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            alpha: ALPHA_OPAQUE,
            blue_screen: BlueScreenMode::Opaque,
            color_key: 0,
            color_switch: 0,
            src_color: 0,
            third_operand: ThirdOperand::ForegroundColor,
            rop: ROP_SRC_COPY,
            mask: false,
            render_mode: RenderMode::empty(),
            blend: BlendMode::Disabled,
            memory_type: MemoryType::Kernel,
        }
    }
}

impl fmt::Display for BlitFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}, {}, {:?}, {:#x} / {:#x}, {:#x}, {:?}, {:#04x} / {}, {:#x}, {:?}, {:?}",
            self.rotation,
            self.alpha,
            self.blue_screen,
            self.color_key,
            self.color_switch,
            self.src_color,
            self.third_operand,
            self.rop,
            self.mask,
            self.render_mode.bits(),
            self.blend,
            self.memory_type
        )
    }
}

/// A complete blit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlitParams {
    pub src: Rect,
    pub dst: Rect,
    /// `None` draws the whole destination extent.
    pub clip: Option<Clip>,
    pub flags: BlitFlags,
}

impl BlitParams {
    /// Destination drawn extent after rotation.
    pub fn drawn_extent(&self) -> Extent {
        self.dst.drawn_extent(self.flags.rotation)
    }

    /// Clip window actually programmed: the request's clip, or the drawn extent.
    pub fn effective_clip(&self) -> Clip {
        self.clip
            .unwrap_or_else(|| Clip::from_extent(self.drawn_extent()))
    }

    pub fn wants_cache_op(&self) -> bool {
        self.flags.render_mode.contains(RenderMode::CACHE_OP)
    }
}

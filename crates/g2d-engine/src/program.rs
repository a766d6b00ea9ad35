//! Translation of a request into register writes.
//!
//! Stages run in a fixed order and each returns the command bits it needs; the command word is
//! written once all stages are done. The start trigger is not written here, see [`start`].

use crate::error::ValidationError;
use crate::params::{
    BlendMode, BlitFlags, BlitParams, BlueScreenMode, Clip, Rect, Rotation, ThirdOperand,
    ALPHA_OPAQUE,
};
use crate::regs::{self, EngineRegs};
use crate::validate::check_params;

/// Addresses written to the engine are 32-bit bus addresses.
fn bus_addr(addr: u64) -> u32 {
    addr as u32
}

fn set_src<R: EngineRegs + ?Sized>(regs: &mut R, src: &Rect) -> u32 {
    regs.write(regs::SRC_SELECT, regs::SELECT_NORMAL);
    regs.write(regs::SRC_BASE_ADDR, bus_addr(src.addr));
    regs.write(regs::SRC_STRIDE, src.stride() as u32);
    regs.write(regs::SRC_COLOR_MODE, regs::color_mode(src.format));
    regs.write(regs::SRC_LEFT_TOP, regs::xy(src.x, src.y));
    regs.write(
        regs::SRC_RIGHT_BOTTOM,
        regs::xy(src.x + src.w, src.y + src.h),
    );
    0
}

fn set_dst<R: EngineRegs + ?Sized>(regs: &mut R, dst: &Rect, rotation: Rotation) -> u32 {
    let drawn = dst.drawn_extent(rotation);
    regs.write(regs::DST_SELECT, regs::SELECT_NORMAL);
    regs.write(regs::DST_BASE_ADDR, bus_addr(dst.addr));
    regs.write(regs::DST_STRIDE, dst.stride() as u32);
    regs.write(regs::DST_COLOR_MODE, regs::color_mode(dst.format));
    regs.write(regs::DST_LEFT_TOP, regs::xy(drawn.x, drawn.y));
    regs.write(
        regs::DST_RIGHT_BOTTOM,
        regs::xy(drawn.x + drawn.w, drawn.y + drawn.h),
    );
    0
}

fn set_rotation<R: EngineRegs + ?Sized>(regs: &mut R, rotation: Rotation) -> u32 {
    let (rotate, direct) = match rotation {
        Rotation::Deg0 => (0, 0),
        Rotation::Deg90 => (regs::ROTATE_90, 0),
        Rotation::Deg180 => (0, regs::DIR_X_NEGATIVE | regs::DIR_Y_NEGATIVE),
        Rotation::Deg270 => (
            regs::ROTATE_90,
            regs::DIR_X_NEGATIVE | regs::DIR_Y_NEGATIVE,
        ),
        Rotation::FlipX => (0, regs::DIR_X_NEGATIVE),
        Rotation::FlipY => (0, regs::DIR_Y_NEGATIVE),
    };
    regs.write(regs::ROTATE, rotate);
    regs.write(regs::SRC_MSK_DIRECT, direct);
    0
}

fn set_clip_win<R: EngineRegs + ?Sized>(regs: &mut R, clip: Clip) -> u32 {
    regs.write(regs::CW_LEFT_TOP, regs::xy(clip.l, clip.t));
    regs.write(regs::CW_RIGHT_BOTTOM, regs::xy(clip.r, clip.b));
    regs::CMD_CW_EN
}

fn set_color_key<R: EngineRegs + ?Sized>(regs: &mut R, flags: &BlitFlags) -> u32 {
    match flags.blue_screen {
        BlueScreenMode::Opaque => 0,
        BlueScreenMode::Transparent => {
            regs.write(regs::BS_COLOR, flags.color_key);
            regs::CMD_TRANSPARENT
        }
        BlueScreenMode::BlueScreen => {
            regs.write(regs::BS_COLOR, flags.color_key);
            regs.write(regs::BG_COLOR, flags.color_switch);
            regs::CMD_BLUESCREEN
        }
    }
}

fn set_pattern<R: EngineRegs + ?Sized>(regs: &mut R, src: &Rect, flags: &BlitFlags) -> u32 {
    let third = match flags.third_operand {
        ThirdOperand::Pattern => {
            regs.write(regs::PAT_BASE_ADDR, bus_addr(src.addr));
            regs.write(regs::PAT_SIZE, regs::xy(src.w, src.h));
            regs.write(regs::PAT_COLOR_MODE, regs::color_mode(src.format));
            regs.write(regs::PAT_OFFSET, regs::xy(src.x, src.y));
            regs.write(regs::PAT_STRIDE, src.stride() as u32);
            regs::THIRD_PATTERN
        }
        ThirdOperand::ForegroundColor => {
            regs.write(regs::FG_COLOR, flags.src_color);
            regs::THIRD_FG_COLOR
        }
        ThirdOperand::BackgroundColor => {
            regs.write(regs::BG_COLOR, flags.src_color);
            regs::THIRD_BG_COLOR
        }
    };
    // Same operand for masked and unmasked pixels.
    regs.write(regs::THIRD_OPERAND, third | (third << 4));
    regs.write(
        regs::ROP4,
        u32::from(flags.rop) | (u32::from(flags.rop) << 8),
    );
    0
}

fn blend_code(mode: BlendMode) -> u32 {
    match mode {
        BlendMode::Disabled => 0,
        BlendMode::Clear => 1,
        BlendMode::Src => 2,
        BlendMode::Dst => 3,
        BlendMode::SrcOver => 4,
        BlendMode::DstOver => 5,
        BlendMode::SrcIn => 6,
        BlendMode::DstIn => 7,
        BlendMode::SrcOut => 8,
        BlendMode::DstOut => 9,
        BlendMode::SrcAtop => 10,
        BlendMode::DstAtop => 11,
        BlendMode::Xor => 12,
    }
}

fn set_alpha<R: EngineRegs + ?Sized>(regs: &mut R, flags: &BlitFlags) -> u32 {
    if flags.alpha == ALPHA_OPAQUE && flags.blend == BlendMode::Disabled {
        return 0;
    }
    regs.write(regs::ALPHA, u32::from(flags.alpha));
    regs::CMD_ALPHA_EN | (blend_code(flags.blend) << regs::CMD_BLEND_SHIFT)
}

/// Program every configuration register and the command word.
///
/// Returns the command word written. Nothing is written if the request fails validation.
pub fn program<R: EngineRegs + ?Sized>(
    regs: &mut R,
    params: &BlitParams,
) -> Result<u32, ValidationError> {
    check_params(params)?;

    let flags = &params.flags;
    let mut cmd = 0;
    cmd |= set_src(regs, &params.src);
    cmd |= set_dst(regs, &params.dst, flags.rotation);
    cmd |= set_rotation(regs, flags.rotation);
    cmd |= set_clip_win(regs, params.effective_clip());
    cmd |= set_color_key(regs, flags);
    cmd |= set_pattern(regs, &params.src, flags);
    cmd |= set_alpha(regs, flags);

    if params.src.w != params.dst.w || params.src.h != params.dst.h {
        cmd |= regs::CMD_STRETCH_EN;
    }
    if flags.mask {
        cmd |= regs::CMD_MASK_EN;
    }
    regs.write(regs::BITBLT_COMMAND, cmd);

    Ok(cmd)
}

/// Unmask the completion interrupt and trigger the transfer.
pub fn start<R: EngineRegs + ?Sized>(regs: &mut R) {
    regs.write(regs::INTC_PEND, regs::INT_DONE);
    regs.write(regs::INTEN, regs::INT_DONE);
    regs.write(regs::BITBLT_START, 1);
}

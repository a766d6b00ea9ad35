//! Request validation. Runs first and unconditionally; never touches hardware or page tables.

use crate::error::{Side, ValidationError};
use crate::params::{BlitParams, Rect};

/// Engine address registers are 32 bits wide.
const DEVICE_ADDR_LIMIT: u64 = 1 << 32;

pub fn check_params(params: &BlitParams) -> Result<(), ValidationError> {
    if params.src.addr == 0 {
        return Err(ValidationError::NullAddress { side: Side::Source });
    }
    if params.dst.addr == 0 {
        return Err(ValidationError::NullAddress {
            side: Side::Destination,
        });
    }

    check_rect(&params.src, Side::Source)?;
    check_rect(&params.dst, Side::Destination)?;

    let drawn = params.drawn_extent();
    if drawn.right() > u64::from(params.dst.full_w) || drawn.bottom() > u64::from(params.dst.full_h)
    {
        return Err(ValidationError::RotatedOutOfBounds {
            x: drawn.x,
            y: drawn.y,
            w: drawn.w,
            h: drawn.h,
            full_w: params.dst.full_w,
            full_h: params.dst.full_h,
        });
    }

    if let Some(clip) = params.clip {
        let Some(window) = clip.extent().filter(|e| !e.is_empty()) else {
            return Err(ValidationError::EmptyClip {
                t: clip.t,
                b: clip.b,
                l: clip.l,
                r: clip.r,
            });
        };
        if window.x < drawn.x
            || window.y < drawn.y
            || window.right() > drawn.right()
            || window.bottom() > drawn.bottom()
        {
            return Err(ValidationError::ClipOutsideDestination {
                t: clip.t,
                b: clip.b,
                l: clip.l,
                r: clip.r,
            });
        }
    }

    Ok(())
}

fn check_rect(rect: &Rect, side: Side) -> Result<(), ValidationError> {
    if rect.w == 0 || rect.h == 0 {
        return Err(ValidationError::EmptyRect {
            side,
            w: rect.w,
            h: rect.h,
        });
    }

    let extent = rect.extent();
    if rect.full_w == 0
        || rect.full_h == 0
        || extent.right() > u64::from(rect.full_w)
        || extent.bottom() > u64::from(rect.full_h)
    {
        return Err(ValidationError::OutOfBounds {
            side,
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            full_w: rect.full_w,
            full_h: rect.full_h,
        });
    }

    let expected = rect.format.bytes_per_pixel();
    if rect.bytes_per_pixel != expected {
        return Err(ValidationError::PixelSizeMismatch {
            side,
            format: rect.format,
            bpp: rect.bytes_per_pixel,
            expected,
        });
    }

    let size = rect.surface_size();
    if rect
        .addr
        .checked_add(size)
        .map_or(true, |end| end > DEVICE_ADDR_LIMIT)
    {
        return Err(ValidationError::AddressOverflow {
            side,
            addr: rect.addr,
            size,
        });
    }

    Ok(())
}

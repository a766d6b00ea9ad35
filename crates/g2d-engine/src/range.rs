//! Address-range resolution.
//!
//! Pure functions from (rectangle, clip, rotation) to the byte ranges the engine will touch in
//! the requester's address space. The page-table check and cache maintenance operate on these
//! ranges, so they must cover every touched byte.

use g2d_mmu::ByteRange;

use crate::params::{BlitParams, Extent, Rect, Rotation};

/// Source and destination ranges of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRanges {
    pub src: ByteRange,
    pub dst: ByteRange,
}

/// Envelope of `region` on `rect`'s surface: from the first touched byte to one past the last.
///
/// `size = (rows - 1) * stride + columns * bpp`. The bytes between rows that lie outside the
/// region are included.
pub fn region_range(rect: &Rect, region: Extent) -> ByteRange {
    let stride = rect.stride();
    let bpp = u64::from(rect.bytes_per_pixel);
    let start = rect.addr + u64::from(region.y) * stride + u64::from(region.x) * bpp;
    if region.is_empty() {
        return ByteRange::new(start, 0);
    }
    let size = u64::from(region.h - 1) * stride + u64::from(region.w) * bpp;
    ByteRange::new(start, size)
}

/// Envelope of the whole rectangle.
pub fn rect_range(rect: &Rect) -> ByteRange {
    region_range(rect, rect.extent())
}

pub fn intersect(a: Extent, b: Extent) -> Option<Extent> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = a.right().min(b.right());
    let y1 = a.bottom().min(b.bottom());
    if u64::from(x0) >= x1 || u64::from(y0) >= y1 {
        return None;
    }
    Some(Extent {
        x: x0,
        y: y0,
        w: (x1 - u64::from(x0)) as u32,
        h: (y1 - u64::from(y0)) as u32,
    })
}

/// Destination pixels actually written: the drawn extent narrowed by the clip window.
pub fn clipped_dst_extent(params: &BlitParams) -> Option<Extent> {
    let drawn = params.drawn_extent();
    match params.clip {
        Some(clip) => intersect(drawn, clip.extent()?),
        None => Some(drawn),
    }
}

/// Source region whose pixels feed the clipped destination region.
///
/// The clipped region is taken relative to the drawn extent, un-rotated into source orientation,
/// then scaled by `src / dst`. Scaled bounds round outward so the result is a superset of the
/// pixels the engine samples.
pub fn clip_for_src(params: &BlitParams) -> Option<Extent> {
    let drawn = params.drawn_extent();
    let visible = clipped_dst_extent(params)?;

    let l = u64::from(visible.x - drawn.x);
    let t = u64::from(visible.y - drawn.y);
    let r = l + u64::from(visible.w);
    let b = t + u64::from(visible.h);

    let w = u64::from(params.dst.w);
    let h = u64::from(params.dst.h);

    // (u0, u1) spans dst columns, (v0, v1) dst rows, both in source orientation.
    let ((u0, u1), (v0, v1)) = match params.flags.rotation {
        Rotation::Deg0 => ((l, r), (t, b)),
        Rotation::Deg90 => ((t, b), (h - r, h - l)),
        Rotation::Deg180 => ((w - r, w - l), (h - b, h - t)),
        Rotation::Deg270 => ((w - b, w - t), (l, r)),
        Rotation::FlipX => ((w - r, w - l), (t, b)),
        Rotation::FlipY => ((l, r), (h - b, h - t)),
    };

    let sw = u64::from(params.src.w);
    let sh = u64::from(params.src.h);
    let su0 = u0 * sw / w;
    let su1 = (u1 * sw).div_ceil(w);
    let sv0 = v0 * sh / h;
    let sv1 = (v1 * sh).div_ceil(h);

    Some(Extent {
        x: params.src.x + su0 as u32,
        y: params.src.y + sv0 as u32,
        w: (su1 - su0) as u32,
        h: (sv1 - sv0) as u32,
    })
}

/// Destination range restricted to the clip window.
pub fn dst_range(params: &BlitParams) -> ByteRange {
    match clipped_dst_extent(params) {
        Some(region) => region_range(&params.dst, region),
        None => ByteRange::new(params.dst.addr, 0),
    }
}

/// Source range feeding the visible destination pixels, padded by `pad` bytes.
pub fn src_range(params: &BlitParams, pad: u64) -> ByteRange {
    match clip_for_src(params) {
        Some(region) => {
            let range = region_range(&params.src, region);
            ByteRange::new(range.start, range.size + pad)
        }
        None => ByteRange::new(params.src.addr, 0),
    }
}

/// Resolve both ranges of a validated request.
pub fn resolve(params: &BlitParams, src_pad: u64) -> ResolvedRanges {
    ResolvedRanges {
        src: src_range(params, src_pad),
        dst: dst_range(params),
    }
}

//! CPU and system cache coherency around a transfer.
//!
//! The engine's DMA does not snoop either cache level. Before submission, dirty lines covering
//! the source and destination must reach memory; after completion, stale lines covering the
//! destination must be dropped so the CPU reads what the engine wrote.

use g2d_mmu::{phys_chunks, ByteRange, MmContext, PhysRange, RangeAttribute};
use tracing::{debug, warn};

use crate::range::ResolvedRanges;

/// Cache maintenance primitives of the platform.
///
/// Inner operations take virtual ranges of the current context; outer operations and
/// page-table cleaning take physical ranges.
pub trait CacheMaintenance {
    /// Clean and invalidate the CPU-local cache over `range`.
    fn inner_flush_range(&mut self, range: ByteRange);
    fn inner_flush_all(&mut self);
    fn outer_clean_range(&mut self, range: PhysRange);
    fn outer_invalidate_range(&mut self, range: PhysRange);
    fn outer_flush_all(&mut self);
    /// Write page-table descriptors back so the system MMU's table walker sees them.
    fn clean_table_entries(&mut self, range: PhysRange);
}

impl<T: CacheMaintenance + ?Sized> CacheMaintenance for Box<T> {
    fn inner_flush_range(&mut self, range: ByteRange) {
        (**self).inner_flush_range(range)
    }

    fn inner_flush_all(&mut self) {
        (**self).inner_flush_all()
    }

    fn outer_clean_range(&mut self, range: PhysRange) {
        (**self).outer_clean_range(range)
    }

    fn outer_invalidate_range(&mut self, range: PhysRange) {
        (**self).outer_invalidate_range(range)
    }

    fn outer_flush_all(&mut self) {
        (**self).outer_flush_all()
    }

    fn clean_table_entries(&mut self, range: PhysRange) {
        (**self).clean_table_entries(range)
    }
}

/// One maintenance call, as recorded by [`RecordingCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    InnerFlush(ByteRange),
    InnerFlushAll,
    OuterClean(PhysRange),
    OuterInvalidate(PhysRange),
    OuterFlushAll,
    CleanTableEntries(PhysRange),
}

/// Platform without software-managed caches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CacheMaintenance for NullCache {
    fn inner_flush_range(&mut self, _range: ByteRange) {}
    fn inner_flush_all(&mut self) {}
    fn outer_clean_range(&mut self, _range: PhysRange) {}
    fn outer_invalidate_range(&mut self, _range: PhysRange) {}
    fn outer_flush_all(&mut self) {}
    fn clean_table_entries(&mut self, _range: PhysRange) {}
}

/// Keeps every call in order. Clones share the log.
#[derive(Debug, Default, Clone)]
pub struct RecordingCache {
    ops: std::sync::Arc<std::sync::Mutex<Vec<CacheOp>>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<CacheOp> {
        self.lock().clone()
    }

    pub fn take(&self) -> Vec<CacheOp> {
        std::mem::take(&mut *self.lock())
    }

    fn push(&self, op: CacheOp) {
        self.lock().push(op);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CacheOp>> {
        // A poisoned log is still a valid log.
        self.ops
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CacheMaintenance for RecordingCache {
    fn inner_flush_range(&mut self, range: ByteRange) {
        self.push(CacheOp::InnerFlush(range));
    }

    fn inner_flush_all(&mut self) {
        self.push(CacheOp::InnerFlushAll);
    }

    fn outer_clean_range(&mut self, range: PhysRange) {
        self.push(CacheOp::OuterClean(range));
    }

    fn outer_invalidate_range(&mut self, range: PhysRange) {
        self.push(CacheOp::OuterInvalidate(range));
    }

    fn outer_flush_all(&mut self) {
        self.push(CacheOp::OuterFlushAll);
    }

    fn clean_table_entries(&mut self, range: PhysRange) {
        self.push(CacheOp::CleanTableEntries(range));
    }
}

/// When the destination's outer-cache lines are invalidated after a successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostInvalidatePolicy {
    /// Whenever the destination is mapped cacheable.
    #[default]
    CacheableDestination,
    /// Only for a cacheable destination sharing a cache line with the source.
    Overlapping,
    Never,
}

impl PostInvalidatePolicy {
    /// Whether the destination can be left alone after the transfer (no invalidate needed).
    pub fn needs_dst_clean(
        self,
        dst_attr: RangeAttribute,
        ranges: &ResolvedRanges,
        line_size: u64,
    ) -> bool {
        match self {
            PostInvalidatePolicy::CacheableDestination => !dst_attr.is_cacheable(),
            PostInvalidatePolicy::Overlapping => {
                !(dst_attr.is_cacheable() && ranges.src.shares_granule(&ranges.dst, line_size))
            }
            PostInvalidatePolicy::Never => true,
        }
    }
}

/// Tunables of [`prepare`], taken from the engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoherencyLimits {
    pub inner_flush_all_threshold: u64,
    pub outer_flush_all_threshold: u64,
    pub line_size: u64,
    pub policy: PostInvalidatePolicy,
}

/// What remains to be done once the transfer completes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoherencyPlan {
    pub needs_dst_clean: bool,
    /// Physical pieces of the destination, filled only when an invalidate is pending.
    pub dst_chunks: Vec<PhysRange>,
}

impl CoherencyPlan {
    /// Plan for requests where the caller keeps caches coherent itself.
    pub fn nothing() -> Self {
        Self {
            needs_dst_clean: true,
            dst_chunks: Vec::new(),
        }
    }

    pub fn invalidates_after(&self) -> bool {
        !self.needs_dst_clean
    }
}

/// Clean the descriptors translating both ranges.
pub fn clean_page_tables<C, M>(cache: &mut M, ctx: &mut C, ranges: &ResolvedRanges)
where
    C: MmContext + ?Sized,
    M: CacheMaintenance + ?Sized,
{
    for range in [ranges.src, ranges.dst] {
        for entries in ctx.descriptor_ranges(range) {
            cache.clean_table_entries(entries);
        }
    }
}

/// Pre-submission maintenance for a request with cache operations enabled.
pub fn prepare<C, M>(
    cache: &mut M,
    ctx: &mut C,
    ranges: &ResolvedRanges,
    dst_attr: RangeAttribute,
    limits: &CoherencyLimits,
) -> CoherencyPlan
where
    C: MmContext + ?Sized,
    M: CacheMaintenance + ?Sized,
{
    let total = ranges.src.size.saturating_add(ranges.dst.size);

    if total >= limits.inner_flush_all_threshold {
        debug!(total, "inner cache: flush all");
        cache.inner_flush_all();
    } else {
        cache.inner_flush_range(ranges.src);
        cache.inner_flush_range(ranges.dst);
    }

    let dst_chunks = phys_chunks(ctx, ranges.dst);
    if total >= limits.outer_flush_all_threshold {
        debug!(total, "outer cache: flush all");
        cache.outer_flush_all();
    } else {
        match (phys_chunks(ctx, ranges.src), dst_chunks.as_ref()) {
            (Some(src), Some(dst)) => {
                for chunk in src.iter().chain(dst) {
                    cache.outer_clean_range(*chunk);
                }
            }
            _ => {
                warn!(src = %ranges.src, dst = %ranges.dst, "range lost its mapping; flushing outer cache");
                cache.outer_flush_all();
            }
        }
    }

    let needs_dst_clean = limits.policy.needs_dst_clean(dst_attr, ranges, limits.line_size);
    CoherencyPlan {
        needs_dst_clean,
        dst_chunks: if needs_dst_clean {
            Vec::new()
        } else {
            dst_chunks.unwrap_or_default()
        },
    }
}

/// Post-completion maintenance; call only after the transfer succeeded.
pub fn finish<M: CacheMaintenance + ?Sized>(cache: &mut M, plan: &CoherencyPlan) {
    if !plan.invalidates_after() {
        return;
    }
    for chunk in &plan.dst_chunks {
        cache.outer_invalidate_range(*chunk);
    }
}

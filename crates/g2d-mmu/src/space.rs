//! Requesting-context view of memory: page directory, single-address translation, and the
//! range helpers built on top of it.

use crate::bus::MemoryBus;
use crate::range::{ByteRange, PhysRange};
use crate::short_desc::{self, Translation, PAGE_SIZE};

/// Classification of a byte range against a context's page tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAttribute {
    /// Some page in the range is unmapped or not present.
    NotValid,
    ValidCacheable,
    /// Every page is mapped and at least one is non-cacheable.
    ValidNonCacheable,
}

impl RangeAttribute {
    pub fn is_valid(self) -> bool {
        self != RangeAttribute::NotValid
    }

    pub fn is_cacheable(self) -> bool {
        self == RangeAttribute::ValidCacheable
    }
}

/// Memory-management context of the process (or kernel) that owns a request's buffers.
pub trait MmContext {
    /// Physical address of the first-level table, as programmed into the system MMU.
    fn page_directory(&self) -> u64;

    /// Short name used in diagnostics (process name, or `"kernel"`).
    fn name(&self) -> &str;

    fn translate(&mut self, vaddr: u64) -> Option<Translation>;

    /// Physical ranges of the descriptors translating `range`; see
    /// [`short_desc::descriptor_ranges`].
    fn descriptor_ranges(&mut self, range: ByteRange) -> Vec<PhysRange>;
}

/// Short-descriptor address space backed by a [`MemoryBus`].
#[derive(Debug)]
pub struct AddressSpace<B> {
    bus: B,
    pgd: u64,
    name: String,
}

impl<B: MemoryBus> AddressSpace<B> {
    pub fn new(bus: B, pgd: u64, name: impl Into<String>) -> Self {
        Self {
            bus,
            pgd,
            name: name.into(),
        }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }
}

impl<B: MemoryBus> MmContext for AddressSpace<B> {
    fn page_directory(&self) -> u64 {
        self.pgd
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn translate(&mut self, vaddr: u64) -> Option<Translation> {
        short_desc::translate(&mut self.bus, self.pgd, vaddr).ok()
    }

    fn descriptor_ranges(&mut self, range: ByteRange) -> Vec<PhysRange> {
        short_desc::descriptor_ranges(&mut self.bus, self.pgd, range)
    }
}

/// Walk every page of `range` and classify it.
///
/// Empty and wrapping ranges are [`RangeAttribute::NotValid`]: a blit always touches at least one
/// byte, so an empty range means the caller computed it wrongly.
pub fn check_range<C: MmContext + ?Sized>(ctx: &mut C, range: ByteRange) -> RangeAttribute {
    let Some(end) = range.end() else {
        return RangeAttribute::NotValid;
    };
    if range.is_empty() {
        return RangeAttribute::NotValid;
    }

    let mut cacheable = true;
    let mut vaddr = range.start;
    while vaddr < end {
        let Some(t) = ctx.translate(vaddr) else {
            return RangeAttribute::NotValid;
        };
        cacheable &= t.cacheable;
        vaddr = t.next_boundary(vaddr);
    }

    if cacheable {
        RangeAttribute::ValidCacheable
    } else {
        RangeAttribute::ValidNonCacheable
    }
}

/// Split `range` into physically contiguous pieces.
///
/// Returns `None` if any page is not mapped. Neighbouring pages that are also physically
/// adjacent are coalesced, so a range backed by a contiguous buffer yields a single piece.
pub fn phys_chunks<C: MmContext + ?Sized>(ctx: &mut C, range: ByteRange) -> Option<Vec<PhysRange>> {
    let end = range.end()?;
    let mut out: Vec<PhysRange> = Vec::new();

    let mut vaddr = range.start;
    while vaddr < end {
        let t = ctx.translate(vaddr)?;
        // Step at most one small page so mixed mappings split at the right place.
        let next = t.next_boundary(vaddr).min((vaddr & !(PAGE_SIZE - 1)) + PAGE_SIZE);
        let len = next.min(end) - vaddr;

        match out.last_mut() {
            Some(prev) if prev.end() == t.paddr => prev.size += len,
            _ => out.push(PhysRange::new(t.paddr, len)),
        }
        vaddr = next;
    }

    Some(out)
}

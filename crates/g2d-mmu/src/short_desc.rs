//! ARMv7 short-descriptor translation table walk.
//!
//! Supports sections (1MiB), supersections (16MiB), large pages (64KiB) and small pages (4KiB).
//! Only the fields the driver consumes are decoded: presence, output address and the C/B memory
//! attribute bits. Access permissions and domains are left to the CPU; the engine's system MMU
//! reports permission problems as asynchronous faults.

use crate::bus::MemoryBus;
use crate::range::{ByteRange, PhysRange};

pub const PAGE_SIZE: u64 = 4096;
pub const LARGE_PAGE_SIZE: u64 = 64 * 1024;
pub const SECTION_SIZE: u64 = 1 << 20;
pub const SUPERSECTION_SIZE: u64 = 16 << 20;

pub const L1_ENTRIES: u64 = 4096;
pub const L2_ENTRIES: u64 = 256;
pub const L2_TABLE_BYTES: u64 = L2_ENTRIES * 4;

const TTBR_ADDR_MASK: u64 = 0xFFFF_C000;

const L1_TYPE_MASK: u32 = 0b11;
const L1_TYPE_TABLE: u32 = 0b01;
const L1_TYPE_SECTION: u32 = 0b10;
const L1_B: u32 = 1 << 2;
const L1_C: u32 = 1 << 3;
const L1_SECTION_AP_RW: u32 = 0b11 << 10;
const L1_SUPERSECTION: u32 = 1 << 18;
const L1_TABLE_ADDR_MASK: u32 = 0xFFFF_FC00;
const SECTION_ADDR_MASK: u32 = 0xFFF0_0000;
const SUPERSECTION_ADDR_MASK: u32 = 0xFF00_0000;

const L2_TYPE_MASK: u32 = 0b11;
const L2_TYPE_LARGE: u32 = 0b01;
const L2_SMALL: u32 = 0b10;
const L2_B: u32 = 1 << 2;
const L2_C: u32 = 1 << 3;
const L2_AP_RW: u32 = 0b11 << 4;
const LARGE_ADDR_MASK: u32 = 0xFFFF_0000;
const SMALL_ADDR_MASK: u32 = 0xFFFF_F000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Section,
    Supersection,
    LargePage,
    SmallPage,
}

impl MappingKind {
    pub fn size(self) -> u64 {
        match self {
            MappingKind::Section => SECTION_SIZE,
            MappingKind::Supersection => SUPERSECTION_SIZE,
            MappingKind::LargePage => LARGE_PAGE_SIZE,
            MappingKind::SmallPage => PAGE_SIZE,
        }
    }
}

/// Result of a successful walk for one virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub paddr: u64,
    pub kind: MappingKind,
    /// C bit: the mapping is write-back or write-through cacheable.
    pub cacheable: bool,
    /// B bit.
    pub bufferable: bool,
}

impl Translation {
    /// First virtual address past the mapping that contains `vaddr`.
    pub fn next_boundary(&self, vaddr: u64) -> u64 {
        let size = self.kind.size();
        (vaddr & !(size - 1)) + size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkFault {
    /// The address does not fit the 32-bit virtual address space.
    OutOfRange { vaddr: u64 },
    /// A fault (or reserved) descriptor was found at `entry_addr`.
    NotMapped { vaddr: u64, level: u8, entry_addr: u64 },
}

pub fn l1_entry_addr(ttbr: u64, vaddr: u32) -> u64 {
    (ttbr & TTBR_ADDR_MASK) + u64::from(vaddr >> 20) * 4
}

pub fn l2_entry_addr(table: u64, vaddr: u32) -> u64 {
    table + u64::from((vaddr >> 12) & 0xFF) * 4
}

/// Walk the tables rooted at `ttbr` for `vaddr`.
pub fn translate<B: MemoryBus + ?Sized>(
    bus: &mut B,
    ttbr: u64,
    vaddr: u64,
) -> Result<Translation, WalkFault> {
    let Ok(va) = u32::try_from(vaddr) else {
        return Err(WalkFault::OutOfRange { vaddr });
    };

    let l1_addr = l1_entry_addr(ttbr, va);
    let l1 = bus.read_u32(l1_addr);

    match l1 & L1_TYPE_MASK {
        L1_TYPE_SECTION if (l1 & L1_SUPERSECTION) != 0 => Ok(Translation {
            paddr: u64::from((l1 & SUPERSECTION_ADDR_MASK) | (va & !SUPERSECTION_ADDR_MASK)),
            kind: MappingKind::Supersection,
            cacheable: (l1 & L1_C) != 0,
            bufferable: (l1 & L1_B) != 0,
        }),
        L1_TYPE_SECTION => Ok(Translation {
            paddr: u64::from((l1 & SECTION_ADDR_MASK) | (va & !SECTION_ADDR_MASK)),
            kind: MappingKind::Section,
            cacheable: (l1 & L1_C) != 0,
            bufferable: (l1 & L1_B) != 0,
        }),
        L1_TYPE_TABLE => {
            let table = u64::from(l1 & L1_TABLE_ADDR_MASK);
            let l2_addr = l2_entry_addr(table, va);
            let l2 = bus.read_u32(l2_addr);

            if (l2 & L2_SMALL) != 0 {
                Ok(Translation {
                    paddr: u64::from((l2 & SMALL_ADDR_MASK) | (va & !SMALL_ADDR_MASK)),
                    kind: MappingKind::SmallPage,
                    cacheable: (l2 & L2_C) != 0,
                    bufferable: (l2 & L2_B) != 0,
                })
            } else if (l2 & L2_TYPE_MASK) == L2_TYPE_LARGE {
                Ok(Translation {
                    paddr: u64::from((l2 & LARGE_ADDR_MASK) | (va & !LARGE_ADDR_MASK)),
                    kind: MappingKind::LargePage,
                    cacheable: (l2 & L2_C) != 0,
                    bufferable: (l2 & L2_B) != 0,
                })
            } else {
                Err(WalkFault::NotMapped {
                    vaddr,
                    level: 2,
                    entry_addr: l2_addr,
                })
            }
        }
        // 0b00 is a fault entry; 0b11 is reserved without LPAE/PXN support.
        _ => Err(WalkFault::NotMapped {
            vaddr,
            level: 1,
            entry_addr: l1_addr,
        }),
    }
}

/// Physical ranges holding the descriptors that translate `range`.
///
/// The system MMU's table walker does not snoop the CPU caches, so these words must be cleaned
/// after the CPU last wrote them. First-level descriptors come first, followed by one range per
/// second-level table reached.
pub fn descriptor_ranges<B: MemoryBus + ?Sized>(
    bus: &mut B,
    ttbr: u64,
    range: ByteRange,
) -> Vec<PhysRange> {
    let mut out = Vec::new();
    let Some(end) = range.end() else {
        return out;
    };
    if range.is_empty() || range.start > u64::from(u32::MAX) {
        return out;
    }
    let last = (end - 1).min(u64::from(u32::MAX));

    let first_mb = range.start >> 20;
    let last_mb = last >> 20;
    let l1_base = ttbr & TTBR_ADDR_MASK;
    out.push(PhysRange::new(
        l1_base + first_mb * 4,
        (last_mb - first_mb + 1) * 4,
    ));

    for mb in first_mb..=last_mb {
        let l1 = bus.read_u32(l1_base + mb * 4);
        if (l1 & L1_TYPE_MASK) != L1_TYPE_TABLE {
            continue;
        }
        let table = u64::from(l1 & L1_TABLE_ADDR_MASK);
        let lo = range.start.max(mb << 20);
        let hi = last.min((mb << 20) | (SECTION_SIZE - 1));
        let first_pg = (lo >> 12) & 0xFF;
        let last_pg = (hi >> 12) & 0xFF;
        out.push(PhysRange::new(
            table + first_pg * 4,
            (last_pg - first_pg + 1) * 4,
        ));
    }

    out
}

/// Writes short-descriptor tables into a [`MemoryBus`].
///
/// Second-level tables are carved upward from `table_pool`, 1KiB each. Used by host tooling and
/// tests to build process address spaces for the walker.
#[derive(Debug, Clone)]
pub struct PageTableBuilder {
    ttbr: u64,
    next_table: u64,
}

impl PageTableBuilder {
    /// `ttbr` is rounded down to the 16KiB table alignment; `table_pool` up to 1KiB.
    pub fn new(ttbr: u64, table_pool: u64) -> Self {
        Self {
            ttbr: ttbr & TTBR_ADDR_MASK,
            next_table: table_pool.next_multiple_of(L2_TABLE_BYTES),
        }
    }

    pub fn ttbr(&self) -> u64 {
        self.ttbr
    }

    /// Map the 1MiB section containing `vaddr`.
    pub fn map_section<B: MemoryBus + ?Sized>(
        &mut self,
        bus: &mut B,
        vaddr: u32,
        paddr: u32,
        cacheable: bool,
    ) {
        let mut entry = (paddr & SECTION_ADDR_MASK) | L1_TYPE_SECTION | L1_SECTION_AP_RW;
        if cacheable {
            entry |= L1_C | L1_B;
        }
        bus.write_u32(l1_entry_addr(self.ttbr, vaddr), entry);
    }

    /// Map the 4KiB page containing `vaddr`, allocating a second-level table when needed.
    pub fn map_page<B: MemoryBus + ?Sized>(
        &mut self,
        bus: &mut B,
        vaddr: u32,
        paddr: u32,
        cacheable: bool,
    ) {
        let table = self.table_for(bus, vaddr);
        let mut entry = (paddr & SMALL_ADDR_MASK) | L2_SMALL | L2_AP_RW;
        if cacheable {
            entry |= L2_C | L2_B;
        }
        bus.write_u32(l2_entry_addr(table, vaddr), entry);
    }

    /// Map `size` bytes page by page starting at `vaddr` -> `paddr`.
    pub fn map_pages<B: MemoryBus + ?Sized>(
        &mut self,
        bus: &mut B,
        vaddr: u32,
        paddr: u32,
        size: u32,
        cacheable: bool,
    ) {
        let pages = size.div_ceil(PAGE_SIZE as u32);
        for i in 0..pages {
            let off = i * PAGE_SIZE as u32;
            self.map_page(bus, vaddr.wrapping_add(off), paddr.wrapping_add(off), cacheable);
        }
    }

    /// Replace the small-page descriptor for `vaddr` with a fault entry.
    pub fn unmap_page<B: MemoryBus + ?Sized>(&mut self, bus: &mut B, vaddr: u32) {
        let l1 = bus.read_u32(l1_entry_addr(self.ttbr, vaddr));
        if (l1 & L1_TYPE_MASK) == L1_TYPE_TABLE {
            let table = u64::from(l1 & L1_TABLE_ADDR_MASK);
            bus.write_u32(l2_entry_addr(table, vaddr), 0);
        }
    }

    fn table_for<B: MemoryBus + ?Sized>(&mut self, bus: &mut B, vaddr: u32) -> u64 {
        let l1_addr = l1_entry_addr(self.ttbr, vaddr);
        let l1 = bus.read_u32(l1_addr);
        if (l1 & L1_TYPE_MASK) == L1_TYPE_TABLE {
            return u64::from(l1 & L1_TABLE_ADDR_MASK);
        }

        let table = self.next_table;
        self.next_table += L2_TABLE_BYTES;
        bus.write_physical(table, &[0u8; L2_TABLE_BYTES as usize]);
        bus.write_u32(l1_addr, (table as u32 & L1_TABLE_ADDR_MASK) | L1_TYPE_TABLE);
        table
    }
}

use std::collections::BTreeMap;

/// Abstraction for physical memory access.
///
/// The page-table walker reads descriptors through this trait. Descriptor words live in RAM on
/// every supported platform, but reads are still `&mut self` so implementations can count or
/// trace accesses.
pub trait MemoryBus {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]);
    fn write_physical(&mut self, paddr: u64, buf: &[u8]);

    fn read_u32(&mut self, paddr: u64) -> u32 {
        let mut buf = [0u8; 4];
        self.read_physical(paddr, &mut buf);
        u32::from_le_bytes(buf)
    }

    fn write_u32(&mut self, paddr: u64, val: u32) {
        self.write_physical(paddr, &val.to_le_bytes());
    }
}

impl<B: MemoryBus + ?Sized> MemoryBus for &mut B {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) {
        (**self).read_physical(paddr, buf);
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) {
        (**self).write_physical(paddr, buf);
    }
}

/// Sparse physical memory keyed by 4KiB page.
///
/// Unallocated pages read back as zeroes, which the walker sees as fault descriptors. Addresses
/// that would wrap the `u64` space read as `0xFF` and drop writes.
#[derive(Debug, Default)]
pub struct SparseMemory {
    pages: BTreeMap<u64, Box<[u8; Self::PAGE_SIZE]>>,
}

impl SparseMemory {
    const PAGE_SIZE: usize = 4096;

    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages that have been written at least once.
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    fn page_index(addr: u64) -> u64 {
        addr / Self::PAGE_SIZE as u64
    }

    fn page_offset(addr: u64) -> usize {
        (addr % Self::PAGE_SIZE as u64) as usize
    }

    fn ensure_page(&mut self, page: u64) -> &mut [u8; Self::PAGE_SIZE] {
        self.pages
            .entry(page)
            .or_insert_with(|| Box::new([0u8; Self::PAGE_SIZE]))
    }
}

impl MemoryBus for SparseMemory {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            let Some(addr) = paddr.checked_add(i as u64) else {
                *slot = 0xFF;
                continue;
            };
            let page = Self::page_index(addr);
            let off = Self::page_offset(addr);
            *slot = self.pages.get(&page).map(|p| p[off]).unwrap_or(0u8);
        }
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) {
        for (i, byte) in buf.iter().enumerate() {
            let Some(addr) = paddr.checked_add(i as u64) else {
                continue;
            };
            let page = Self::page_index(addr);
            let off = Self::page_offset(addr);
            self.ensure_page(page)[off] = *byte;
        }
    }
}

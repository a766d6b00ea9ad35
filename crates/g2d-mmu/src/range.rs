use core::fmt;

/// Half-open byte range `[start, start + size)` in a requester's virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub start: u64,
    pub size: u64,
}

impl ByteRange {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// One past the last byte, or `None` if the range wraps the address space.
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether the two ranges touch a common `granule`-aligned block (e.g. a cache line).
    pub fn shares_granule(&self, other: &ByteRange, granule: u64) -> bool {
        if self.is_empty() || other.is_empty() || granule == 0 {
            return false;
        }
        let (Some(a_end), Some(b_end)) = (self.end(), other.end()) else {
            return false;
        };
        let a_first = self.start / granule;
        let a_last = (a_end - 1) / granule;
        let b_first = other.start / granule;
        let b_last = (b_end - 1) / granule;
        a_first <= b_last && b_first <= a_last
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{:#x}", self.start, self.size)
    }
}

/// Half-open physical range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysRange {
    pub start: u64,
    pub size: u64,
}

impl PhysRange {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }
}

impl fmt::Display for PhysRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.start, self.end())
    }
}

//! Reserved memory region for the engine, chosen once at device construction.

use tracing::debug;

use crate::error::RegionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReservedRegion {
    pub base: u64,
    pub size: u64,
}

impl ReservedRegion {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

pub trait RegionAllocator {
    fn allocate_region(&mut self, device: &str) -> Result<ReservedRegion, RegionError>;
}

/// Contiguous allocator pool. The engine takes the whole pool.
#[derive(Debug, Clone)]
pub struct ContiguousPool {
    name: String,
    base: u64,
    total: u64,
    free: u64,
}

impl ContiguousPool {
    pub fn new(name: impl Into<String>, base: u64, total: u64) -> Self {
        Self {
            name: name.into(),
            base,
            total,
            free: total,
        }
    }
}

impl RegionAllocator for ContiguousPool {
    fn allocate_region(&mut self, device: &str) -> Result<ReservedRegion, RegionError> {
        debug!(
            pool = %self.name,
            base = format_args!("{:#x}", self.base),
            total = format_args!("{:#x}", self.total),
            free = format_args!("{:#x}", self.free),
            device,
            "contiguous pool"
        );
        if self.total == 0 || self.free < self.total {
            return Err(RegionError::PoolExhausted {
                name: self.name.clone(),
                free: self.free,
                total: self.total,
            });
        }
        self.free -= self.total;
        Ok(ReservedRegion {
            base: self.base,
            size: self.total,
        })
    }
}

/// Bank carved out by the platform at boot.
#[derive(Debug, Clone, Copy)]
pub struct StaticBank {
    pub base: u64,
    pub size: u64,
}

impl RegionAllocator for StaticBank {
    fn allocate_region(&mut self, device: &str) -> Result<ReservedRegion, RegionError> {
        if self.base == 0 {
            return Err(RegionError::EmptyBank {
                device: device.to_owned(),
            });
        }
        Ok(ReservedRegion {
            base: self.base,
            size: self.size,
        })
    }
}

/// The engine works on caller buffers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReservation;

impl RegionAllocator for NoReservation {
    fn allocate_region(&mut self, _device: &str) -> Result<ReservedRegion, RegionError> {
        Ok(ReservedRegion::default())
    }
}

/// Configuration-level choice of allocator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegionStrategy {
    Contiguous {
        name: String,
        base: u64,
        size: u64,
    },
    StaticBank {
        base: u64,
        size: u64,
    },
    #[default]
    None,
}

impl RegionStrategy {
    pub fn allocator(&self) -> Box<dyn RegionAllocator> {
        match self {
            RegionStrategy::Contiguous { name, base, size } => {
                Box::new(ContiguousPool::new(name.clone(), *base, *size))
            }
            RegionStrategy::StaticBank { base, size } => Box::new(StaticBank {
                base: *base,
                size: *size,
            }),
            RegionStrategy::None => Box::new(NoReservation),
        }
    }
}

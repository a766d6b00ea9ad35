use std::time::Duration;

use crate::cache::{CoherencyLimits, PostInvalidatePolicy};
use crate::region::RegionStrategy;

/// Device configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a submission may run before the engine is reset.
    pub timeout: Duration,
    /// Extra bytes past the source envelope covered by checks and maintenance.
    pub src_pad_bytes: u64,
    /// Combined src+dst size at which the inner cache is flushed whole.
    pub inner_flush_all_threshold: u64,
    pub outer_flush_all_threshold: u64,
    pub post_invalidate: PostInvalidatePolicy,
    pub region: RegionStrategy,
    /// Physical address of the kernel page directory, bound for kernel-memory requests.
    pub kernel_pgd: u64,
    /// Added to a physical address to get its kernel linear-map address.
    pub kernel_virt_offset: u64,
    pub cache_line_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            src_pad_bytes: 8,
            inner_flush_all_threshold: 32 * 1024,
            outer_flush_all_threshold: 1024 * 1024,
            post_invalidate: PostInvalidatePolicy::default(),
            region: RegionStrategy::default(),
            kernel_pgd: 0,
            kernel_virt_offset: 0,
            cache_line_size: 32,
        }
    }
}

impl EngineConfig {
    pub fn coherency_limits(&self) -> CoherencyLimits {
        CoherencyLimits {
            inner_flush_all_threshold: self.inner_flush_all_threshold,
            outer_flush_all_threshold: self.outer_flush_all_threshold,
            line_size: self.cache_line_size,
            policy: self.post_invalidate,
        }
    }
}

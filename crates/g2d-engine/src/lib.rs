//! Submission core of the FIMG2D 2D blit engine.
//!
//! A request flows through:
//!
//! 1. [`validate`]: geometry and format checks, before any side effect.
//! 2. [`range`]: byte ranges touched in the requester's address space (user memory only).
//! 3. [`g2d_mmu::check_range`]: every page of those ranges must be resident.
//! 4. [`cache`]: page-table cleaning and, on request, CPU/system cache maintenance.
//! 5. [`iommu`]: bind the requester's page directory to the engine's system MMU.
//! 6. [`program`]: register programming and the start trigger.
//! 7. [`wait`]: completion wait with timeout and fault recovery.
//!
//! [`G2dDevice`] strings these together. Hardware is reached only through the traits
//! [`EngineRegs`], [`ClockSource`], [`SysMmu`], [`CacheMaintenance`] and [`RegionAllocator`];
//! [`SimulatedEngine`] stands in for the engine on the host.

pub mod cache;
pub mod clock;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod iommu;
pub mod params;
pub mod program;
pub mod range;
pub mod region;
pub mod regs;
pub mod report;
pub mod sim;
pub mod validate;
pub mod wait;

pub use cache::{
    CacheMaintenance, CacheOp, CoherencyPlan, NullCache, PostInvalidatePolicy, RecordingCache,
};
pub use clock::{ClockGate, ClockSource, ClockStatus, CountingClock};
pub use config::EngineConfig;
pub use device::{G2dDevice, G2dHardware};
pub use engine::{EngineIrq, EngineState, LastChecked, WaitOutcome};
pub use error::{BlitError, ClockError, ProbeError, RegionError, Side, ValidationError};
pub use iommu::{IommuBinding, RecordingSysMmu, SysMmu, SysMmuCall};
pub use params::{
    BlendMode, BlitFlags, BlitParams, BlueScreenMode, Clip, ColorFormat, Extent, MemoryType,
    Rect, RenderMode, Rotation, ThirdOperand,
};
pub use range::ResolvedRanges;
pub use region::{
    ContiguousPool, NoReservation, RegionAllocator, RegionStrategy, ReservedRegion, StaticBank,
};
pub use regs::{EngineRegs, ShadowRegisters};
pub use sim::{SimBehavior, SimulatedEngine};
pub use validate::check_params;

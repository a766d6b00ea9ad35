//! Page-table helpers for the G2D engine's system MMU.
//!
//! The engine reaches memory through a system MMU that walks the *requesting process's* page
//! tables. Before a user-memory blit is submitted the driver walks the same tables on the CPU to
//! prove every touched page is resident, and to find the physical pages whose outer-cache lines
//! need maintenance.
//!
//! - [`bus`]: physical memory access used by the walker.
//! - [`short_desc`]: ARMv7 short-descriptor walk and a table builder.
//! - [`space`]: address-space contexts, range attribute checks and virtual to physical chunking.

pub mod bus;
pub mod range;
pub mod short_desc;
pub mod space;

pub use bus::{MemoryBus, SparseMemory};
pub use range::{ByteRange, PhysRange};
pub use short_desc::{MappingKind, PageTableBuilder, Translation, WalkFault, PAGE_SIZE};
pub use space::{check_range, phys_chunks, AddressSpace, MmContext, RangeAttribute};

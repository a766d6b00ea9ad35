//! FIMG2D blit engine core.
//!
//! Re-exports the submission core ([`engine`]) and the page-table helpers it walks with
//! ([`mmu`]).

pub use g2d_engine as engine;
pub use g2d_mmu as mmu;

pub use g2d_engine::{BlitError, BlitFlags, BlitParams, EngineConfig, G2dDevice, G2dHardware};
pub use g2d_mmu::{AddressSpace, MmContext};

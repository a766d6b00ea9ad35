//! The submission path.

use std::sync::Arc;

use g2d_mmu::{check_range, MmContext, RangeAttribute};
use tracing::debug;

use crate::cache::{self, CacheMaintenance, CoherencyPlan};
use crate::clock::{ClockGate, ClockSource};
use crate::config::EngineConfig;
use crate::engine::{EngineIrq, EngineState, LastChecked};
use crate::error::{BlitError, ProbeError, Side, ValidationError};
use crate::iommu::{IommuBinding, SysMmu};
use crate::params::{BlitParams, MemoryType, Rect};
use crate::program;
use crate::range::{self, ResolvedRanges};
use crate::region::ReservedRegion;
use crate::regs::EngineRegs;
use crate::report::report_failure;
use crate::validate::check_params;
use crate::wait::wait_for_finish;

const DEVICE_NAME: &str = "fimg2d";

/// Platform services the device drives.
pub struct G2dHardware {
    pub regs: Box<dyn EngineRegs>,
    pub clock: Box<dyn ClockSource>,
    pub mmu: Box<dyn SysMmu>,
    pub cache: Box<dyn CacheMaintenance>,
}

/// One engine instance.
///
/// Submissions take `&mut self`, so at most one is in flight. Interrupts reach the device through
/// [`EngineIrq`] handles obtained from [`G2dDevice::irq`].
pub struct G2dDevice {
    config: EngineConfig,
    state: Arc<EngineState>,
    regs: Box<dyn EngineRegs>,
    clock: ClockGate<Box<dyn ClockSource>>,
    iommu: IommuBinding<Box<dyn SysMmu>>,
    cache: Box<dyn CacheMaintenance>,
    region: ReservedRegion,
}

impl G2dDevice {
    pub fn new(
        config: EngineConfig,
        state: Arc<EngineState>,
        hw: G2dHardware,
    ) -> Result<Self, ProbeError> {
        let region = config.region.allocator().allocate_region(DEVICE_NAME)?;
        debug!(
            base = format_args!("{:#x}", region.base),
            size = format_args!("{:#x}", region.size),
            "reserved region"
        );

        Ok(Self {
            clock: ClockGate::new(hw.clock, Arc::clone(&state)),
            iommu: IommuBinding::new(hw.mmu),
            regs: hw.regs,
            cache: hw.cache,
            config,
            state,
            region,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn irq(&self) -> EngineIrq {
        self.state.irq()
    }

    pub fn region(&self) -> ReservedRegion {
        self.region
    }

    pub fn clock(&mut self) -> &mut ClockGate<Box<dyn ClockSource>> {
        &mut self.clock
    }

    pub fn iommu(&mut self) -> &mut IommuBinding<Box<dyn SysMmu>> {
        &mut self.iommu
    }

    /// Run one blit to completion.
    ///
    /// `ctx` is the requesting context; it is only consulted for user-memory requests. Every
    /// failure is logged with the full request.
    pub fn do_blit(
        &mut self,
        params: &BlitParams,
        ctx: &mut dyn MmContext,
    ) -> Result<(), BlitError> {
        let result = self.submit(params, ctx);
        if let Err(err) = &result {
            report_failure(err, params);
        }
        result
    }

    fn submit(&mut self, params: &BlitParams, ctx: &mut dyn MmContext) -> Result<(), BlitError> {
        check_params(params)?;

        let (device_params, pgd, plan) = match params.flags.memory_type {
            MemoryType::Kernel => {
                let device_params = BlitParams {
                    src: self.to_kernel_virt(&params.src, Side::Source)?,
                    dst: self.to_kernel_virt(&params.dst, Side::Destination)?,
                    ..*params
                };
                (device_params, self.config.kernel_pgd, CoherencyPlan::nothing())
            }
            MemoryType::User => {
                let plan = self.prepare_user(params, ctx)?;
                (*params, ctx.page_directory(), plan)
            }
        };

        self.clock.enable();
        program::program(&mut *self.regs, &device_params)?;
        self.iommu.bind(pgd);

        debug!(pgd = format_args!("{pgd:#x}"), "start bitblt");
        self.state.mark_submitted();
        program::start(&mut *self.regs);

        wait_for_finish(&self.state, &mut *self.regs, self.config.timeout)?;
        cache::finish(&mut *self.cache, &plan);
        Ok(())
    }

    /// Page-table checks and cache maintenance for user memory.
    fn prepare_user(
        &mut self,
        params: &BlitParams,
        ctx: &mut dyn MmContext,
    ) -> Result<CoherencyPlan, BlitError> {
        let ranges = range::resolve(params, self.config.src_pad_bytes);
        debug!(src = %ranges.src, dst = %ranges.dst, context = ctx.name(), "resolved ranges");

        let src_attr = check_range(&mut *ctx, ranges.src);
        let dst_attr = if src_attr.is_valid() {
            Some(check_range(&mut *ctx, ranges.dst))
        } else {
            None
        };
        self.state.set_last_checked(LastChecked {
            src: Some(src_attr),
            dst: dst_attr,
        });

        if !src_attr.is_valid() {
            return Err(invalid_mapping(Side::Source, &ranges, ctx));
        }
        let dst_attr = dst_attr.unwrap_or(RangeAttribute::NotValid);
        if !dst_attr.is_valid() {
            return Err(invalid_mapping(Side::Destination, &ranges, ctx));
        }

        cache::clean_page_tables(&mut *self.cache, &mut *ctx, &ranges);

        if !params.wants_cache_op() {
            return Ok(CoherencyPlan::nothing());
        }
        Ok(cache::prepare(
            &mut *self.cache,
            ctx,
            &ranges,
            dst_attr,
            &self.config.coherency_limits(),
        ))
    }

    fn to_kernel_virt(&self, rect: &Rect, side: Side) -> Result<Rect, ValidationError> {
        let size = rect.surface_size();
        let addr = rect
            .addr
            .checked_add(self.config.kernel_virt_offset)
            .filter(|addr| addr.checked_add(size).is_some_and(|end| end <= 1 << 32))
            .ok_or(ValidationError::AddressOverflow {
                side,
                addr: rect.addr,
                size,
            })?;
        Ok(Rect { addr, ..*rect })
    }
}

fn invalid_mapping(side: Side, ranges: &ResolvedRanges, ctx: &dyn MmContext) -> BlitError {
    let range = match side {
        Side::Source => ranges.src,
        Side::Destination => ranges.dst,
    };
    BlitError::InvalidMapping {
        side,
        start: range.start,
        size: range.size,
        context: ctx.name().to_owned(),
    }
}

use std::thread;
use std::time::Duration;

use g2d_engine::regs::{self, SRC_BASE_ADDR};
use g2d_engine::{
    BlitError, BlitFlags, BlitParams, CacheOp, ClockError, ClockStatus, Clip, ColorFormat,
    CountingClock, EngineConfig, EngineState, G2dDevice, G2dHardware, MemoryType, ProbeError,
    Rect, RecordingCache, RecordingSysMmu, RegionError, RegionStrategy, RenderMode, Side,
    SimBehavior, SimulatedEngine, SysMmuCall, ValidationError,
};
use g2d_mmu::{AddressSpace, PageTableBuilder, RangeAttribute, SparseMemory};
use pretty_assertions::assert_eq;

const TTBR: u64 = 0x4000_0000;
const TABLE_POOL: u64 = 0x4010_0000;
const SRC_VA: u32 = 0x0100_0000;
const SRC_PA: u32 = 0x5000_0000;
const DST_VA: u32 = 0x0200_0000;
const DST_PA: u32 = 0x6000_0000;
/// 64x64 ARGB8888.
const SURFACE_BYTES: u32 = 64 * 64 * 4;

const KERNEL_PGD: u64 = 0x4800_0000;
const KERNEL_OFFSET: u64 = 0x1000_0000;

struct Rig {
    dev: G2dDevice,
    sim: SimulatedEngine,
    cache: RecordingCache,
    mmu: RecordingSysMmu,
    space: AddressSpace<SparseMemory>,
    pt: PageTableBuilder,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rig_with(config: EngineConfig, behavior: SimBehavior) -> Rig {
    init_tracing();

    let state = EngineState::new();
    let sim = SimulatedEngine::new(state.irq()).with_behavior(behavior);
    let cache = RecordingCache::new();
    let mmu = RecordingSysMmu::default();
    let dev = G2dDevice::new(
        config,
        state,
        G2dHardware {
            regs: Box::new(sim.clone()),
            clock: Box::new(CountingClock::default()),
            mmu: Box::new(mmu.clone()),
            cache: Box::new(cache.clone()),
        },
    )
    .unwrap();

    let mut space = AddressSpace::new(SparseMemory::new(), TTBR, "compositor");
    let mut pt = PageTableBuilder::new(TTBR, TABLE_POOL);
    // One spare page after the source for the read padding.
    pt.map_pages(space.bus_mut(), SRC_VA, SRC_PA, SURFACE_BYTES + 0x1000, true);
    pt.map_pages(space.bus_mut(), DST_VA, DST_PA, SURFACE_BYTES, true);

    Rig {
        dev,
        sim,
        cache,
        mmu,
        space,
        pt,
    }
}

fn rig(behavior: SimBehavior) -> Rig {
    rig_with(
        EngineConfig {
            kernel_pgd: KERNEL_PGD,
            kernel_virt_offset: KERNEL_OFFSET,
            ..Default::default()
        },
        behavior,
    )
}

fn surface(addr: u64) -> Rect {
    Rect {
        x: 0,
        y: 0,
        w: 64,
        h: 64,
        full_w: 64,
        full_h: 64,
        format: ColorFormat::Argb8888,
        bytes_per_pixel: 4,
        addr,
    }
}

fn user_params() -> BlitParams {
    BlitParams {
        src: surface(u64::from(SRC_VA)),
        dst: surface(u64::from(DST_VA)),
        clip: Some(Clip {
            t: 8,
            b: 24,
            l: 16,
            r: 48,
        }),
        flags: BlitFlags {
            memory_type: MemoryType::User,
            ..Default::default()
        },
    }
}

fn kernel_params() -> BlitParams {
    let mut src = surface(0x5000_0000);
    src.w = 1;
    src.h = 1;
    let mut dst = surface(0x5100_0000);
    dst.w = 1;
    dst.h = 1;
    BlitParams {
        src,
        dst,
        clip: None,
        flags: BlitFlags::default(),
    }
}

#[test]
fn invalid_geometry_has_no_side_effects() {
    let mut rig = rig(SimBehavior::Complete);
    for mutate in [
        (|p: &mut BlitParams| p.src.w = 0) as fn(&mut BlitParams),
        |p| p.dst.h = 0,
        |p| p.src.x = 1,
        |p| p.dst.y = 60,
    ] {
        let mut params = user_params();
        mutate(&mut params);
        let err = rig.dev.do_blit(&params, &mut rig.space).unwrap_err();
        assert!(matches!(err, BlitError::Validation(_)), "{err}");
    }

    assert!(rig.sim.registers().writes().is_empty());
    assert!(rig.cache.ops().is_empty());
    assert!(rig.mmu.calls().is_empty());
    assert!(!rig.dev.clock().is_enabled());
}

#[test]
fn resident_user_request_is_submitted() {
    let mut rig = rig(SimBehavior::Complete);
    rig.dev.do_blit(&user_params(), &mut rig.space).unwrap();

    assert_eq!(rig.sim.submissions(), 1);
    assert_eq!(rig.mmu.calls(), vec![SysMmuCall::Enable(TTBR)]);
    let checked = rig.dev.state().last_checked();
    assert_eq!(checked.src, Some(RangeAttribute::ValidCacheable));
    assert_eq!(checked.dst, Some(RangeAttribute::ValidCacheable));
    assert!(!rig.dev.state().is_in_use());
    assert!(rig.dev.clock().is_enabled());

    // No CACHE_OP: only the page-table descriptors are cleaned.
    let ops = rig.cache.ops();
    assert!(!ops.is_empty());
    assert!(ops
        .iter()
        .all(|op| matches!(op, CacheOp::CleanTableEntries(_))));

    // Trigger is the last register write.
    assert_eq!(
        rig.sim.registers().writes().last(),
        Some(&(regs::BITBLT_START, 1))
    );
}

#[test]
fn unmapped_destination_byte_aborts_before_registers() {
    let mut rig = rig(SimBehavior::Complete);
    // Clip rows 8..24 of a 256-byte stride live in the dst's second page.
    rig.pt.unmap_page(rig.space.bus_mut(), DST_VA + 0x1000);

    let err = rig.dev.do_blit(&user_params(), &mut rig.space).unwrap_err();
    assert!(
        matches!(
            err,
            BlitError::InvalidMapping {
                side: Side::Destination,
                ref context,
                ..
            } if context == "compositor"
        ),
        "{err}"
    );
    assert!(rig.sim.registers().writes().is_empty());
    assert!(rig.mmu.calls().is_empty());
    assert_eq!(
        rig.dev.state().last_checked().dst,
        Some(RangeAttribute::NotValid)
    );
}

#[test]
fn unmapped_source_is_reported_as_source() {
    let mut rig = rig(SimBehavior::Complete);
    rig.pt.unmap_page(rig.space.bus_mut(), SRC_VA);

    let err = rig.dev.do_blit(&user_params(), &mut rig.space).unwrap_err();
    assert!(matches!(
        err,
        BlitError::InvalidMapping {
            side: Side::Source,
            ..
        }
    ));
    assert_eq!(rig.dev.state().last_checked().dst, None);
    assert_eq!(rig.sim.submissions(), 0);
}

#[test]
fn early_fault_fails_without_blocking() {
    let mut rig = rig_with(
        EngineConfig {
            timeout: Duration::from_secs(60),
            ..Default::default()
        },
        SimBehavior::Fault { addr: 0x0200_4000 },
    );

    assert_eq!(
        rig.dev.do_blit(&user_params(), &mut rig.space),
        Err(BlitError::MmuFault { addr: 0x0200_4000 })
    );
    let state = rig.dev.state();
    assert!(!state.fault_pending());
    assert!(!state.is_in_use());
    assert_eq!(rig.sim.resets(), 0);
}

#[test]
fn hung_engine_is_reset_once_and_times_out() {
    let mut rig = rig_with(
        EngineConfig {
            timeout: Duration::from_millis(20),
            ..Default::default()
        },
        SimBehavior::Hang,
    );

    assert_eq!(
        rig.dev.do_blit(&user_params(), &mut rig.space),
        Err(BlitError::Timeout { timeout_ms: 20 })
    );
    assert_eq!(rig.sim.resets(), 1);
    assert!(!rig.dev.state().is_in_use());

    // The engine is usable again afterwards.
    rig.sim.set_behavior(SimBehavior::Complete);
    rig.dev.do_blit(&user_params(), &mut rig.space).unwrap();
    assert_eq!(rig.sim.resets(), 1);
}

#[test]
fn fault_on_busy_engine_is_reported_at_timeout_without_reset() {
    let mut rig = rig_with(
        EngineConfig {
            timeout: Duration::from_millis(100),
            ..Default::default()
        },
        SimBehavior::FaultAfter {
            addr: 0x0200_1000,
            delay: Duration::from_millis(20),
        },
    );

    assert_eq!(
        rig.dev.do_blit(&user_params(), &mut rig.space),
        Err(BlitError::MmuFault { addr: 0x0200_1000 })
    );
    assert_eq!(rig.sim.resets(), 0);
    assert!(!rig.dev.state().is_in_use());
}

#[test]
fn fault_then_completion_is_recovered_and_leaves_nothing_stale() {
    let mut rig = rig_with(
        EngineConfig {
            timeout: Duration::from_millis(500),
            ..Default::default()
        },
        SimBehavior::FaultThenComplete {
            addr: 0x0200_2000,
            delay: Duration::from_millis(20),
        },
    );

    assert_eq!(
        rig.dev.do_blit(&user_params(), &mut rig.space),
        Err(BlitError::FaultRecovered { addr: 0x0200_2000 })
    );
    assert_eq!(rig.sim.resets(), 0);
    assert!(!rig.dev.state().is_in_use());
    assert!(!rig.dev.state().fault_pending());

    // The first transfer's completion was consumed by its own wait.
    rig.sim.set_behavior(SimBehavior::Hang);
    assert_eq!(
        rig.dev.do_blit(&user_params(), &mut rig.space),
        Err(BlitError::Timeout { timeout_ms: 500 })
    );
    assert_eq!(rig.sim.resets(), 1);
}

#[test]
fn cancelled_wait_resets_and_reports_interrupted() {
    let mut rig = rig_with(
        EngineConfig {
            timeout: Duration::from_secs(60),
            ..Default::default()
        },
        SimBehavior::Hang,
    );
    let irq = rig.dev.irq();
    let state = std::sync::Arc::clone(rig.dev.state());
    let canceller = thread::spawn(move || {
        while !state.is_in_use() {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(10));
        irq.cancel_wait();
    });

    assert_eq!(
        rig.dev.do_blit(&user_params(), &mut rig.space),
        Err(BlitError::Interrupted)
    );
    canceller.join().unwrap();
    assert_eq!(rig.sim.resets(), 1);
    assert!(!rig.dev.state().is_in_use());
}

#[test]
fn delayed_completion_succeeds() {
    let mut rig = rig(SimBehavior::CompleteAfter(Duration::from_millis(20)));
    rig.dev.do_blit(&user_params(), &mut rig.space).unwrap();
    assert!(!rig.dev.state().is_in_use());
}

#[test]
fn trivial_kernel_request_succeeds_without_cache_maintenance() {
    let mut rig = rig(SimBehavior::Complete);
    let params = kernel_params();
    rig.dev.do_blit(&params, &mut rig.space).unwrap();

    assert!(!rig.dev.state().is_in_use());
    assert!(rig.cache.ops().is_empty());
    assert_eq!(rig.mmu.calls(), vec![SysMmuCall::Enable(KERNEL_PGD)]);
    assert_eq!(
        rig.sim.registers().value(SRC_BASE_ADDR),
        Some((0x5000_0000 + KERNEL_OFFSET) as u32)
    );
    assert_eq!(rig.dev.state().last_checked().src, None);
}

#[test]
fn kernel_address_past_device_space_after_offset_is_rejected() {
    let mut rig = rig(SimBehavior::Complete);
    let mut params = kernel_params();
    params.dst.addr = 0xF000_0000;

    assert!(matches!(
        rig.dev.do_blit(&params, &mut rig.space),
        Err(BlitError::Validation(ValidationError::AddressOverflow {
            side: Side::Destination,
            ..
        }))
    ));
    assert!(rig.sim.registers().writes().is_empty());
    assert!(!rig.dev.clock().is_enabled());
}

#[test]
fn cache_op_cleans_before_and_invalidates_after() {
    let mut rig = rig(SimBehavior::Complete);
    let mut params = user_params();
    params.flags.render_mode = RenderMode::CACHE_OP;
    rig.dev.do_blit(&params, &mut rig.space).unwrap();

    let ops: Vec<_> = rig
        .cache
        .ops()
        .into_iter()
        .filter(|op| !matches!(op, CacheOp::CleanTableEntries(_)))
        .collect();
    assert!(matches!(ops.first(), Some(CacheOp::InnerFlush(_))));
    assert!(ops.iter().any(|op| matches!(op, CacheOp::OuterClean(_))));
    // Cacheable destination: invalidated once the engine is done.
    assert!(matches!(ops.last(), Some(CacheOp::OuterInvalidate(r)) if r.start >= u64::from(DST_PA)));
}

#[test]
fn failed_transfer_skips_post_invalidate() {
    let mut rig = rig_with(
        EngineConfig {
            timeout: Duration::from_millis(10),
            ..Default::default()
        },
        SimBehavior::Hang,
    );
    let mut params = user_params();
    params.flags.render_mode = RenderMode::CACHE_OP;

    assert!(rig.dev.do_blit(&params, &mut rig.space).is_err());
    assert!(!rig
        .cache
        .ops()
        .iter()
        .any(|op| matches!(op, CacheOp::OuterInvalidate(_))));
}

#[test]
fn clock_disable_refused_while_in_use() {
    let mut rig = rig(SimBehavior::Complete);
    rig.dev.do_blit(&kernel_params(), &mut rig.space).unwrap();

    let state = std::sync::Arc::clone(rig.dev.state());
    state.mark_submitted();
    assert_eq!(rig.dev.clock().disable(), Err(ClockError::InUse));

    rig.dev.irq().complete();
    assert_eq!(rig.dev.clock().disable(), Ok(ClockStatus::Disabled));
}

#[test]
fn probe_fails_on_empty_static_bank() {
    let state = EngineState::new();
    let result = G2dDevice::new(
        EngineConfig {
            region: RegionStrategy::StaticBank { base: 0, size: 0 },
            ..Default::default()
        },
        state.clone(),
        G2dHardware {
            regs: Box::new(SimulatedEngine::new(state.irq())),
            clock: Box::new(CountingClock::default()),
            mmu: Box::new(RecordingSysMmu::default()),
            cache: Box::new(RecordingCache::new()),
        },
    );
    assert!(matches!(
        result,
        Err(ProbeError::Region(RegionError::EmptyBank { .. }))
    ));
}

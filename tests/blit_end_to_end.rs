use std::time::Duration;

use g2d::engine::regs::{self, xy};
use g2d::engine::{
    CacheOp, Clip, ColorFormat, CountingClock, EngineState, MemoryType, PostInvalidatePolicy,
    Rect, RecordingCache, RecordingSysMmu, RenderMode, Rotation, SimBehavior, SimulatedEngine,
    SysMmuCall,
};
use g2d::mmu::{PageTableBuilder, SparseMemory};
use g2d::{AddressSpace, BlitError, BlitFlags, BlitParams, EngineConfig, G2dDevice, G2dHardware};
use pretty_assertions::assert_eq;

struct Process {
    space: AddressSpace<SparseMemory>,
    pt: PageTableBuilder,
}

impl Process {
    fn new(name: &str, ttbr: u64) -> Self {
        Self {
            space: AddressSpace::new(SparseMemory::new(), ttbr, name),
            pt: PageTableBuilder::new(ttbr, ttbr + 0x4000),
        }
    }

    fn map(&mut self, vaddr: u32, paddr: u32, size: u32, cacheable: bool) {
        self.pt
            .map_pages(self.space.bus_mut(), vaddr, paddr, size, cacheable);
    }
}

fn rgb565(addr: u64, w: u32, h: u32, full_w: u32, full_h: u32) -> Rect {
    Rect {
        x: 0,
        y: 0,
        w,
        h,
        full_w,
        full_h,
        format: ColorFormat::Rgb565,
        bytes_per_pixel: 2,
        addr,
    }
}

fn device(config: EngineConfig) -> (G2dDevice, SimulatedEngine, RecordingCache, RecordingSysMmu) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let state = EngineState::new();
    let sim = SimulatedEngine::new(state.irq());
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
    (dev, sim, cache, mmu)
}

#[test]
fn two_processes_share_the_engine() {
    let (mut dev, sim, _cache, mmu) = device(EngineConfig::default());

    let mut launcher = Process::new("launcher", 0x4000_0000);
    launcher.map(0x1000_0000, 0x5000_0000, 0x2_0000, true);
    let mut camera = Process::new("camera", 0x4400_0000);
    camera.map(0x1000_0000, 0x5800_0000, 0x2_0000, false);

    let params = BlitParams {
        src: rgb565(0x1000_0000, 32, 32, 128, 64),
        dst: rgb565(0x1001_0000, 32, 32, 128, 64),
        clip: None,
        flags: BlitFlags {
            memory_type: MemoryType::User,
            ..Default::default()
        },
    };

    dev.do_blit(&params, &mut launcher.space).unwrap();
    dev.do_blit(&params, &mut camera.space).unwrap();
    dev.do_blit(&params, &mut launcher.space).unwrap();

    assert_eq!(
        mmu.calls(),
        vec![
            SysMmuCall::Enable(0x4000_0000),
            SysMmuCall::SetPageDirectory(0x4400_0000),
            SysMmuCall::SetPageDirectory(0x4000_0000),
        ]
    );
    assert_eq!(sim.submissions(), 3);
    assert_eq!(sim.resets(), 0);
}

#[test]
fn rotated_clipped_blit_programs_drawn_extent() {
    let (mut dev, sim, cache, _mmu) = device(EngineConfig {
        post_invalidate: PostInvalidatePolicy::CacheableDestination,
        ..Default::default()
    });
    let mut proc = Process::new("gallery", 0x4000_0000);
    proc.map(0x2000_0000, 0x6000_0000, 0x1_0000, true);
    proc.map(0x2010_0000, 0x6800_0000, 0x1_0000, true);

    // 64x32 source turned into a 32x64 column at (8, 0) on an 80x80 surface.
    let mut dst = rgb565(0x2010_0000, 64, 32, 80, 80);
    dst.x = 8;
    let params = BlitParams {
        src: rgb565(0x2000_0000, 64, 32, 64, 32),
        dst,
        clip: Some(Clip {
            t: 0,
            b: 16,
            l: 8,
            r: 40,
        }),
        flags: BlitFlags {
            rotation: Rotation::Deg90,
            memory_type: MemoryType::User,
            render_mode: RenderMode::CACHE_OP,
            ..Default::default()
        },
    };

    dev.do_blit(&params, &mut proc.space).unwrap();

    let shadow = sim.registers();
    assert_eq!(shadow.value(regs::DST_LEFT_TOP), Some(xy(8, 0)));
    assert_eq!(shadow.value(regs::DST_RIGHT_BOTTOM), Some(xy(40, 64)));
    assert_eq!(shadow.value(regs::CW_LEFT_TOP), Some(xy(8, 0)));
    assert_eq!(shadow.value(regs::CW_RIGHT_BOTTOM), Some(xy(40, 16)));
    assert_eq!(shadow.value(regs::ROTATE), Some(regs::ROTATE_90));

    let ops = cache.ops();
    assert!(ops.iter().any(|op| matches!(op, CacheOp::InnerFlush(_))));
    assert!(matches!(ops.last(), Some(CacheOp::OuterInvalidate(_))));
}

#[test]
fn failures_leave_the_engine_ready() {
    let (mut dev, sim, _cache, _mmu) = device(EngineConfig {
        timeout: Duration::from_millis(10),
        ..Default::default()
    });
    let mut proc = Process::new("video", 0x4000_0000);
    proc.map(0x3000_0000, 0x7000_0000, 0x8000, true);

    let params = BlitParams {
        src: rgb565(0x3000_0000, 16, 16, 64, 64),
        dst: rgb565(0x3000_4000, 16, 16, 64, 64),
        clip: None,
        flags: BlitFlags {
            memory_type: MemoryType::User,
            ..Default::default()
        },
    };

    sim.set_behavior(SimBehavior::Hang);
    assert_eq!(
        dev.do_blit(&params, &mut proc.space),
        Err(BlitError::Timeout { timeout_ms: 10 })
    );

    sim.set_behavior(SimBehavior::Fault { addr: 0x3000_4000 });
    assert_eq!(
        dev.do_blit(&params, &mut proc.space),
        Err(BlitError::MmuFault { addr: 0x3000_4000 })
    );

    sim.set_behavior(SimBehavior::Complete);
    dev.do_blit(&params, &mut proc.space).unwrap();

    assert_eq!(sim.resets(), 1);
    assert!(!dev.state().is_in_use());
    assert!(!dev.state().fault_pending());
}

//! In-process stand-in for the engine.
//!
//! Stores register writes like [`ShadowRegisters`] and raises the interrupt side when the start
//! register is written. No pixels are moved.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::engine::EngineIrq;
use crate::regs::{self, EngineRegs, ShadowRegisters};

/// What the simulated engine does when triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimBehavior {
    /// Raise completion before the trigger write returns.
    #[default]
    Complete,
    /// Raise completion from another thread after a delay.
    CompleteAfter(Duration),
    /// Raise a system MMU fault before the trigger write returns.
    Fault { addr: u64 },
    FaultAfter { addr: u64, delay: Duration },
    /// Raise a fault after `delay`, then complete after `delay` more.
    FaultThenComplete { addr: u64, delay: Duration },
    /// Never complete.
    Hang,
}

/// Clones share registers and behavior.
#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    regs: ShadowRegisters,
    irq: EngineIrq,
    behavior: Arc<Mutex<SimBehavior>>,
}

impl SimulatedEngine {
    pub fn new(irq: EngineIrq) -> Self {
        Self {
            regs: ShadowRegisters::new(),
            irq,
            behavior: Arc::default(),
        }
    }

    pub fn with_behavior(self, behavior: SimBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    pub fn set_behavior(&self, behavior: SimBehavior) {
        *self
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    pub fn registers(&self) -> &ShadowRegisters {
        &self.regs
    }

    /// Number of start triggers seen.
    pub fn submissions(&self) -> usize {
        self.regs.write_count(regs::BITBLT_START)
    }

    pub fn resets(&self) -> usize {
        self.regs.write_count(regs::SOFT_RESET)
    }

    fn trigger(&self) {
        let behavior = *self
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(?behavior, "simulated engine triggered");

        match behavior {
            SimBehavior::Complete => self.irq.complete(),
            SimBehavior::Fault { addr } => self.irq.report_fault(addr),
            SimBehavior::CompleteAfter(delay) => {
                let irq = self.irq.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    irq.complete();
                });
            }
            SimBehavior::FaultAfter { addr, delay } => {
                let irq = self.irq.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    irq.report_fault(addr);
                });
            }
            SimBehavior::FaultThenComplete { addr, delay } => {
                let irq = self.irq.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    irq.report_fault(addr);
                    thread::sleep(delay);
                    irq.complete();
                });
            }
            SimBehavior::Hang => {}
        }
    }
}

impl EngineRegs for SimulatedEngine {
    fn write(&mut self, offset: u32, value: u32) {
        self.regs.write(offset, value);
        if offset == regs::BITBLT_START && value & 1 != 0 {
            self.trigger();
        }
    }

    fn read(&mut self, offset: u32) -> u32 {
        self.regs.read(offset)
    }
}

//! System MMU binding for the engine's bus master.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Platform control of the engine's system MMU.
pub trait SysMmu {
    /// Program the page-table base and turn translation on.
    fn enable(&mut self, pgd: u64);
    fn disable(&mut self);
    /// Reprogram the page-table base while translation stays on.
    fn set_page_directory(&mut self, pgd: u64);
}

impl<T: SysMmu + ?Sized> SysMmu for Box<T> {
    fn enable(&mut self, pgd: u64) {
        (**self).enable(pgd)
    }

    fn disable(&mut self) {
        (**self).disable()
    }

    fn set_page_directory(&mut self, pgd: u64) {
        (**self).set_page_directory(pgd)
    }
}

/// Tracks whether translation is on and which directory is bound.
#[derive(Debug)]
pub struct IommuBinding<M> {
    mmu: M,
    bound: Option<u64>,
}

impl<M: SysMmu> IommuBinding<M> {
    pub fn new(mmu: M) -> Self {
        Self { mmu, bound: None }
    }

    pub fn enable(&mut self, pgd: u64) {
        debug!(pgd = format_args!("{pgd:#x}"), "sysmmu on");
        self.mmu.enable(pgd);
        self.bound = Some(pgd);
    }

    pub fn disable(&mut self) {
        debug!("sysmmu off");
        self.mmu.disable();
        self.bound = None;
    }

    /// Bind `pgd` for the next submission.
    pub fn bind(&mut self, pgd: u64) {
        match self.bound {
            None => self.enable(pgd),
            Some(_) => {
                self.mmu.set_page_directory(pgd);
                self.bound = Some(pgd);
            }
        }
    }

    pub fn bound(&self) -> Option<u64> {
        self.bound
    }

    pub fn mmu(&self) -> &M {
        &self.mmu
    }
}

/// Calls seen by [`RecordingSysMmu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysMmuCall {
    Enable(u64),
    Disable,
    SetPageDirectory(u64),
}

/// Clones share the call log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSysMmu {
    calls: Arc<Mutex<Vec<SysMmuCall>>>,
}

impl RecordingSysMmu {
    pub fn calls(&self) -> Vec<SysMmuCall> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SysMmuCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SysMmu for RecordingSysMmu {
    fn enable(&mut self, pgd: u64) {
        self.lock().push(SysMmuCall::Enable(pgd));
    }

    fn disable(&mut self) {
        self.lock().push(SysMmuCall::Disable);
    }

    fn set_page_directory(&mut self, pgd: u64) {
        self.lock().push(SysMmuCall::SetPageDirectory(pgd));
    }
}

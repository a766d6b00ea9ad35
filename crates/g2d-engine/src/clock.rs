//! Engine clock gating.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::EngineState;
use crate::error::ClockError;

/// Platform clock of the engine.
pub trait ClockSource {
    fn enable(&mut self);
    fn disable(&mut self);
}

impl<T: ClockSource + ?Sized> ClockSource for Box<T> {
    fn enable(&mut self) {
        (**self).enable()
    }

    fn disable(&mut self) {
        (**self).disable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStatus {
    Enabled,
    AlreadyEnabled,
    Disabled,
    AlreadyDisabled,
}

/// Idempotent wrapper around a [`ClockSource`]. Refuses to stop the clock mid-transfer.
#[derive(Debug)]
pub struct ClockGate<C> {
    source: C,
    enabled: bool,
    state: Arc<EngineState>,
}

impl<C: ClockSource> ClockGate<C> {
    /// The clock is assumed off at construction.
    pub fn new(source: C, state: Arc<EngineState>) -> Self {
        Self {
            source,
            enabled: false,
            state,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) -> ClockStatus {
        if self.enabled {
            return ClockStatus::AlreadyEnabled;
        }
        self.source.enable();
        self.enabled = true;
        debug!("clock enabled");
        ClockStatus::Enabled
    }

    pub fn disable(&mut self) -> Result<ClockStatus, ClockError> {
        if self.state.is_in_use() {
            warn!("clock disable refused: engine in use");
            return Err(ClockError::InUse);
        }
        if !self.enabled {
            return Ok(ClockStatus::AlreadyDisabled);
        }
        self.source.disable();
        self.enabled = false;
        debug!("clock disabled");
        Ok(ClockStatus::Disabled)
    }

    pub fn source(&self) -> &C {
        &self.source
    }
}

/// Counts transitions; used by tests and host tooling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingClock {
    pub enables: u32,
    pub disables: u32,
}

impl ClockSource for CountingClock {
    fn enable(&mut self) {
        self.enables += 1;
    }

    fn disable(&mut self) {
        self.disables += 1;
    }
}

//! State shared between the submission path and the interrupt side.
//!
//! All flags are atomics. The mutex protects nothing but the sleep/notify handshake: notifiers
//! take it before notifying so a wake-up between the waiter's predicate check and its sleep is
//! not lost.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use g2d_mmu::RangeAttribute;

/// Attributes found by the last user-memory page-table check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LastChecked {
    pub src: Option<RangeAttribute>,
    pub dst: Option<RangeAttribute>,
}

/// Why [`EngineState::wait_idle`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// In-use was cleared by the completion interrupt.
    Idle,
    /// Still busy; the wait was cancelled.
    Cancelled,
    TimedOut,
}

#[derive(Debug, Default)]
pub struct EngineState {
    in_use: AtomicBool,
    faulted: AtomicBool,
    faulted_addr: AtomicU64,
    cancel: AtomicBool,
    handshake: Mutex<()>,
    wake: Condvar,
    last_checked: Mutex<LastChecked>,
}

impl EngineState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Interrupt-side handle.
    pub fn irq(self: &Arc<Self>) -> EngineIrq {
        EngineIrq {
            state: Arc::clone(self),
        }
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Called right before the start trigger.
    pub fn mark_submitted(&self) {
        self.cancel.store(false, Ordering::Release);
        self.in_use.store(true, Ordering::Release);
    }

    pub fn clear_in_use(&self) {
        self.in_use.store(false, Ordering::Release);
    }

    pub fn fault_pending(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Clear the fault flag, returning the faulting address if it was set.
    pub fn take_fault(&self) -> Option<u64> {
        if self.faulted.swap(false, Ordering::AcqRel) {
            Some(self.faulted_addr.load(Ordering::Acquire))
        } else {
            None
        }
    }

    pub fn faulted_addr(&self) -> u64 {
        self.faulted_addr.load(Ordering::Acquire)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Sleep until in-use clears, the wait is cancelled, or `timeout` elapses.
    ///
    /// A fault does not end the wait: the engine may still be moving data until it completes or
    /// the timeout expires.
    pub fn wait_idle(&self, timeout: Duration) -> WaitOutcome {
        let guard = self.handshake();
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |_| self.is_in_use() && !self.cancelled())
            .unwrap_or_else(PoisonError::into_inner);
        drop(guard);

        if !self.is_in_use() {
            WaitOutcome::Idle
        } else if self.cancel.swap(false, Ordering::AcqRel) {
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::TimedOut
        }
    }

    pub fn last_checked(&self) -> LastChecked {
        *self.lock_last_checked()
    }

    pub(crate) fn set_last_checked(&self, checked: LastChecked) {
        *self.lock_last_checked() = checked;
    }

    fn handshake(&self) -> MutexGuard<'_, ()> {
        self.handshake.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_last_checked(&self) -> MutexGuard<'_, LastChecked> {
        self.last_checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let _guard = self.handshake();
        self.wake.notify_all();
    }
}

/// Interrupt-context notifier. Only stores flags and wakes the waiter.
#[derive(Debug, Clone)]
pub struct EngineIrq {
    state: Arc<EngineState>,
}

impl EngineIrq {
    /// Transfer-complete interrupt.
    pub fn complete(&self) {
        self.state.clear_in_use();
        self.state.notify();
    }

    /// System MMU translation fault at `addr`.
    pub fn report_fault(&self, addr: u64) {
        self.state.faulted_addr.store(addr, Ordering::Release);
        self.state.faulted.store(true, Ordering::Release);
        self.state.notify();
    }

    /// Abandon the current wait, e.g. because the waiting task got a signal.
    pub fn cancel_wait(&self) {
        self.state.cancel.store(true, Ordering::Release);
        self.state.notify();
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn idle_engine_returns_immediately() {
        let state = EngineState::new();
        assert_eq!(state.wait_idle(Duration::from_secs(10)), WaitOutcome::Idle);
    }

    #[test]
    fn completion_from_another_thread_wakes_waiter() {
        let state = EngineState::new();
        let irq = state.irq();
        state.mark_submitted();

        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            irq.complete();
        });
        assert_eq!(state.wait_idle(Duration::from_secs(10)), WaitOutcome::Idle);
        t.join().unwrap();
    }

    #[test]
    fn fault_keeps_waiting_for_completion() {
        let state = EngineState::new();
        let irq = state.irq();
        state.mark_submitted();

        let start = Instant::now();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            irq.report_fault(0xDEAD_0000);
            thread::sleep(Duration::from_millis(40));
            irq.complete();
        });
        assert_eq!(state.wait_idle(Duration::from_secs(10)), WaitOutcome::Idle);
        assert!(start.elapsed() >= Duration::from_millis(50));
        t.join().unwrap();

        assert_eq!(state.take_fault(), Some(0xDEAD_0000));
        assert_eq!(state.take_fault(), None);
    }

    #[test]
    fn fault_alone_runs_into_the_timeout() {
        let state = EngineState::new();
        state.mark_submitted();
        state.irq().report_fault(0xBEEF_0000);

        assert_eq!(
            state.wait_idle(Duration::from_millis(10)),
            WaitOutcome::TimedOut
        );
        assert!(state.is_in_use());
        assert!(state.fault_pending());
    }

    #[test]
    fn cancel_is_consumed_by_the_wait() {
        let state = EngineState::new();
        state.mark_submitted();
        state.irq().cancel_wait();
        assert_eq!(
            state.wait_idle(Duration::from_secs(10)),
            WaitOutcome::Cancelled
        );
        assert_eq!(
            state.wait_idle(Duration::from_millis(1)),
            WaitOutcome::TimedOut
        );
    }

    #[test]
    fn busy_engine_times_out() {
        let state = EngineState::new();
        state.mark_submitted();
        assert_eq!(
            state.wait_idle(Duration::from_millis(10)),
            WaitOutcome::TimedOut
        );
        assert!(state.is_in_use());
    }
}

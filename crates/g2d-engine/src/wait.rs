//! Completion wait and fault recovery.

use std::time::Duration;

use tracing::{error, warn};

use crate::engine::{EngineState, WaitOutcome};
use crate::error::BlitError;
use crate::regs::{reset_engine, EngineRegs};

/// Block until the submitted transfer finishes.
///
/// A fault raised while the engine runs does not end the wait; it is examined once the engine
/// goes idle or the wait gives up. Every return leaves in-use and the fault flag cleared. The
/// engine is reset only when it is still busy without a fault to explain it.
pub fn wait_for_finish<R: EngineRegs + ?Sized>(
    state: &EngineState,
    regs: &mut R,
    timeout: Duration,
) -> Result<(), BlitError> {
    if let Some(addr) = state.take_fault() {
        state.clear_in_use();
        error!(addr = format_args!("{addr:#x}"), "sysmmu faulted before wait");
        return Err(BlitError::MmuFault { addr });
    }

    let outcome = state.wait_idle(timeout);
    conclude(state, regs, outcome, timeout)
}

fn conclude<R: EngineRegs + ?Sized>(
    state: &EngineState,
    regs: &mut R,
    outcome: WaitOutcome,
    timeout: Duration,
) -> Result<(), BlitError> {
    let fault = state.take_fault();
    let result = match (outcome, fault) {
        (WaitOutcome::Idle, None) => Ok(()),
        (WaitOutcome::Idle, Some(addr)) => {
            warn!(
                addr = format_args!("{addr:#x}"),
                "sysmmu faulted but engine completed"
            );
            Err(BlitError::FaultRecovered { addr })
        }
        (WaitOutcome::Cancelled | WaitOutcome::TimedOut, Some(addr)) => {
            error!(addr = format_args!("{addr:#x}"), "sysmmu faulted");
            Err(BlitError::MmuFault { addr })
        }
        (WaitOutcome::Cancelled, None) => {
            reset_engine(regs);
            error!("wait interrupted; engine reset");
            Err(BlitError::Interrupted)
        }
        (WaitOutcome::TimedOut, None) => {
            reset_engine(regs);
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            error!(timeout_ms, "waiting for interrupt timed out; engine reset");
            Err(BlitError::Timeout { timeout_ms })
        }
    };

    state.clear_in_use();
    result
}

// CLASSIFICATION: COMMUNITY
// Filename: gate.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Boot gate wrapped around kernel-collection UUID validation.
//!
//! The original routine always runs first. The gate then polls the report
//! state a bounded number of times, sleeping between checks, because the
//! boot thread cannot rely on blocking wait primitives this early. No report
//! within the budget means the boot continues; only an explicit `Reboot`
//! report restarts the machine.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use once_cell::sync::OnceCell;

use crate::companion::Companion;
use crate::host::{KcUuid, KernReturn, ValidationRoutine};
use crate::report::ReportState;
use crate::shared::MODULE_SHORT;

/// Status returned when the original routine was never captured.
pub const KERN_FAILURE: KernReturn = 5;

/// Progress of the boot gate, kept for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GatePhase {
    Idle = 0,
    WaitingForReport = 1,
    Continuing = 2,
    Rebooting = 3,
}

impl GatePhase {
    /// Decode a stored phase; unknown values read as `Idle`.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => GatePhase::WaitingForReport,
            2 => GatePhase::Continuing,
            3 => GatePhase::Rebooting,
            _ => GatePhase::Idle,
        }
    }
}

/// Polling budget of the boot gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateConfig {
    pub poll_interval: Duration,
    /// Upper bound on report checks; the gate sleeps between checks only.
    pub max_checks: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            max_checks: 16,
        }
    }
}

/// Wrapper placed in front of the kernel-collection UUID check.
pub struct BootGate {
    companion: Arc<Companion>,
    config: GateConfig,
    original: OnceCell<ValidationRoutine>,
}

impl BootGate {
    /// Gate over `companion` with no original routine recorded yet.
    pub fn new(companion: Arc<Companion>, config: GateConfig) -> Self {
        Self {
            companion,
            config,
            original: OnceCell::new(),
        }
    }

    /// Polling budget in use.
    pub fn config(&self) -> GateConfig {
        self.config
    }

    /// Remember the routine the interception displaced. Only the first
    /// call has an effect.
    pub fn set_original(&self, original: ValidationRoutine) -> bool {
        self.original.set(original).is_ok()
    }

    /// Routine to install in place of the original.
    pub fn replacement(self: &Arc<Self>) -> ValidationRoutine {
        let gate = Arc::clone(self);
        Arc::new(move |uuid: &KcUuid| gate.validate_kc_uuid(uuid))
    }

    /// Entry point reached through the interception.
    pub fn validate_kc_uuid(&self, uuid: &KcUuid) -> KernReturn {
        match self.original.get() {
            Some(original) => {
                let original = Arc::clone(original);
                self.run(|| original(uuid))
            }
            None => {
                warn!(target: MODULE_SHORT, "original validation routine missing for {uuid:?}");
                KERN_FAILURE
            }
        }
    }

    /// Run `original`, then hold the boot until a report arrives or the
    /// check budget runs out. Returns the original result unchanged unless
    /// the machine restarts.
    pub fn run<R>(&self, original: impl FnOnce() -> R) -> R {
        self.companion.set_gate_phase(GatePhase::Idle);
        let ret = original();

        self.companion.set_gate_phase(GatePhase::WaitingForReport);
        match self.await_report() {
            ReportState::Reboot => {
                self.companion.set_gate_phase(GatePhase::Rebooting);
                self.companion
                    .restart("userspace reported the boot should not continue")
            }
            ReportState::Continue => {
                info!(target: MODULE_SHORT, "userspace reported boot can continue");
                self.companion.set_gate_phase(GatePhase::Continuing);
                ret
            }
            ReportState::NotYetReported => {
                warn!(
                    target: MODULE_SHORT,
                    "no report after {} checks; continuing boot", self.config.max_checks
                );
                self.companion.set_gate_phase(GatePhase::Continuing);
                ret
            }
        }
    }

    fn await_report(&self) -> ReportState {
        let sleeper = self.companion.sleeper();
        for check in 1..=self.config.max_checks {
            let state = self.companion.report_state();
            if state.is_terminal() {
                return state;
            }
            if check < self.config.max_checks {
                debug!(
                    target: MODULE_SHORT,
                    "no report yet (check {check}/{}); sleeping {:?}",
                    self.config.max_checks,
                    self.config.poll_interval
                );
                sleeper.sleep(self.config.poll_interval);
            }
        }
        ReportState::NotYetReported
    }
}

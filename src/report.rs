// CLASSIFICATION: COMMUNITY
// Filename: report.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Write-once report state shared by the boot gate and the client channel.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::shared::{NO_REPORT_YET, REPORT_CAN_CONTINUE, REPORT_SHOULD_REBOOT};

/// Decision delivered by userspace, or its absence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportState {
    NotYetReported,
    Continue,
    Reboot,
}

impl ReportState {
    /// Map a raw cell value. Anything that is not a terminal value reads as
    /// `NotYetReported`.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            REPORT_CAN_CONTINUE => ReportState::Continue,
            REPORT_SHOULD_REBOOT => ReportState::Reboot,
            _ => ReportState::NotYetReported,
        }
    }

    /// Raw cell value for this state.
    pub fn as_raw(self) -> u8 {
        match self {
            ReportState::NotYetReported => NO_REPORT_YET,
            ReportState::Continue => REPORT_CAN_CONTINUE,
            ReportState::Reboot => REPORT_SHOULD_REBOOT,
        }
    }

    /// True once a report has been recorded.
    pub fn is_terminal(self) -> bool {
        self != ReportState::NotYetReported
    }
}

/// Terminal value a client may report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportValue {
    Continue,
    Reboot,
}

impl ReportValue {
    /// Decode a method scalar. Returns `None` above the last valid report.
    pub fn from_scalar(value: u64) -> Option<Self> {
        match value {
            v if v == u64::from(REPORT_CAN_CONTINUE) => Some(ReportValue::Continue),
            v if v == u64::from(REPORT_SHOULD_REBOOT) => Some(ReportValue::Reboot),
            _ => None,
        }
    }
}

impl From<ReportValue> for ReportState {
    fn from(value: ReportValue) -> Self {
        match value {
            ReportValue::Continue => ReportState::Continue,
            ReportValue::Reboot => ReportState::Reboot,
        }
    }
}

/// Single-byte cell that leaves `NotYetReported` at most once.
#[derive(Debug)]
pub struct ReportCell {
    raw: AtomicU8,
}

impl Default for ReportCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCell {
    /// Cell holding the no-report sentinel.
    pub const fn new() -> Self {
        Self {
            raw: AtomicU8::new(NO_REPORT_YET),
        }
    }

    /// Current state of the cell.
    pub fn load(&self) -> ReportState {
        ReportState::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Move from the sentinel to `value`. On failure the current terminal
    /// state is returned and the cell is left untouched.
    pub fn report(&self, value: ReportValue) -> Result<(), ReportState> {
        let target = ReportState::from(value).as_raw();
        self.raw
            .compare_exchange(NO_REPORT_YET, target, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ReportState::from_raw)
    }
}

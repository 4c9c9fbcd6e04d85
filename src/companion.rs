// CLASSIFICATION: COMMUNITY
// Filename: companion.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Service object shared by the boot gate and the client channel.
//!
//! One `Companion` exists per module load. It owns the report state and the
//! resolved kernel helpers, and carries the host ports both sides need.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{info, warn};
use once_cell::sync::OnceCell;

use crate::dispatch::Variant;
use crate::gate::GatePhase;
use crate::host::{Platform, PropertySource, Sleeper, ThreadSleeper};
use crate::identity::IdentityPolicy;
use crate::report::{ReportCell, ReportState, ReportValue};
use crate::shared::MODULE_SHORT;
use crate::symbols::{KernelImage, ResolveError, SymbolTable};

/// State shared by the boot gate and every client connection.
pub struct Companion {
    report: ReportCell,
    symbols: OnceCell<Result<SymbolTable, ResolveError>>,
    phase: AtomicU8,
    policy: IdentityPolicy,
    variant: Variant,
    platform: Arc<dyn Platform>,
    properties: Arc<dyn PropertySource>,
    sleeper: Arc<dyn Sleeper>,
}

impl Companion {
    /// Companion with the build's identity policy and method variant, sleeping on
    /// the calling thread.
    pub fn new(platform: Arc<dyn Platform>, properties: Arc<dyn PropertySource>) -> Self {
        Self {
            report: ReportCell::new(),
            symbols: OnceCell::new(),
            phase: AtomicU8::new(GatePhase::Idle as u8),
            policy: IdentityPolicy::for_build(),
            variant: Variant::for_build(),
            platform,
            properties,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Replace the identity policy.
    pub fn with_policy(mut self, policy: IdentityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the method table variant.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Replace the sleeper used between report polls.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Resolve the identity helpers once. Later calls return the cached
    /// outcome without touching `image`.
    pub fn solve_needed_symbols(&self, image: &dyn KernelImage) -> Result<(), ResolveError> {
        self.symbols
            .get_or_init(|| SymbolTable::resolve(image))
            .as_ref()
            .map(|_| ())
            .map_err(Clone::clone)
    }

    /// Resolved helpers, if resolution ran and succeeded.
    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.get().and_then(|r| r.as_ref().ok())
    }

    /// Why the helpers are unavailable, if resolution ran and failed.
    pub fn resolve_error(&self) -> Option<&ResolveError> {
        self.symbols.get().and_then(|r| r.as_ref().err())
    }

    /// Current report, read without blocking.
    pub fn report_state(&self) -> ReportState {
        self.report.load()
    }

    /// Record the client's decision. Only the first report is kept.
    pub fn report(&self, value: ReportValue) -> Result<(), ReportState> {
        match self.report.report(value) {
            Ok(()) => {
                info!(target: MODULE_SHORT, "userspace reported {:?}", value);
                Ok(())
            }
            Err(current) => {
                warn!(
                    target: MODULE_SHORT,
                    "ignoring report {:?}; already reported {:?}", value, current
                );
                Err(current)
            }
        }
    }

    /// Where the boot gate currently is.
    pub fn gate_phase(&self) -> GatePhase {
        GatePhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// Record a gate transition.
    pub(crate) fn set_gate_phase(&self, phase: GatePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Restart the machine through the platform. Does not return.
    pub fn restart(&self, reason: &str) -> ! {
        warn!(target: MODULE_SHORT, "rebooting machine: {reason}");
        self.platform.restart_cpu()
    }

    /// Policy applied to connecting clients.
    pub fn policy(&self) -> &IdentityPolicy {
        &self.policy
    }

    /// Method table served to clients.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Provider property store.
    pub fn properties(&self) -> &dyn PropertySource {
        self.properties.as_ref()
    }

    /// Sleeper used between report polls.
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }
}

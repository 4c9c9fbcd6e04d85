// CLASSIFICATION: COMMUNITY
// Filename: shared.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Constants shared between the kernel companion and its userspace client.
//!
//! Userspace builds its method calls from these values, so they are part of
//! the wire contract and must not be renumbered.

/// Selector of the report method (gate variant).
pub const METHOD_REPORT_ACTION: u32 = 0;
/// Selector of the reboot method (direct-reboot variant).
pub const METHOD_DO_REBOOT: u32 = 0;
/// Number of methods exposed by either variant.
pub const NUMBER_OF_METHODS: u32 = 1;

/// Userspace verified the boot and the gate may continue.
pub const REPORT_CAN_CONTINUE: u8 = 0;
/// Userspace asks the gate to restart the machine.
pub const REPORT_SHOULD_REBOOT: u8 = 1;
/// Count of valid report values; every valid value is below it.
pub const NUMBER_OF_REPORTS: u8 = 2;
/// Sentinel held until a report arrives.
pub const NO_REPORT_YET: u8 = 0xff;

/// Length in bytes of a code directory hash.
pub const CS_CDHASH_LEN: usize = 20;

/// Provider property holding the non-production client identity.
pub const CDHASH_PROPERTY: &str = "RSRRepair CDHash";

/// Short name used as the log target.
pub const MODULE_SHORT: &str = "rsrrc";

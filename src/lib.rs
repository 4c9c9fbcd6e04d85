// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Boot-time companion for RSRRepair.
//!
//! Holds kernel-collection UUID validation until an authenticated userspace
//! client reports whether the boot may continue, and exposes the narrow
//! client channel used to deliver that report.

/// Constants shared with the userspace client.
pub mod shared;

/// Write-once report state.
pub mod report;

/// Ports implemented by the host environment.
pub mod host;

/// Kernel helper resolution.
pub mod symbols;

/// Client code-signing identity.
pub mod identity;

/// Service object shared by gate and channel.
pub mod companion;

/// Bounded-retry boot gate.
pub mod gate;

/// Method table and external method dispatch.
pub mod dispatch;

/// Authenticated user client.
pub mod client;

/// Plugin configuration and start.
pub mod plugin;

/// Host service lifecycle hooks.
pub mod lifecycle;

pub use client::{AuthError, ChannelError, Connection};
pub use companion::Companion;
pub use dispatch::{IoReturn, MethodArguments, Variant};
pub use gate::{BootGate, GateConfig, GatePhase};
pub use identity::{CdHash, IdentityPolicy};
pub use plugin::{BootEnvironment, Plugin, PluginConfig, StartError};
pub use report::{ReportState, ReportValue};

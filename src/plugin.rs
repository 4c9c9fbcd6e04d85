// CLASSIFICATION: COMMUNITY
// Filename: plugin.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Plugin configuration and start.
//!
//! Mirrors the patcher-plugin contract of the host: boot arguments can turn
//! the module off, raise log verbosity or allow untested kernels. Once the
//! patcher is up the identity helpers are resolved and the boot gate is
//! routed in front of the kernel-collection UUID check.

use std::sync::Arc;

use log::{info, warn, LevelFilter};
use thiserror::Error;

use crate::companion::Companion;
use crate::gate::{BootGate, GateConfig};
use crate::host::{InterceptError, InterceptionPort};
use crate::shared::MODULE_SHORT;
use crate::symbols::{KernelImage, ResolveError};

/// Darwin 22 (Ventura).
pub const KERNEL_VENTURA: u32 = 22;

/// Routine the boot gate is placed in front of.
pub const DEFAULT_INTERCEPT_SYMBOL: &str = "_kc_uuid_validate";

/// Errors reading the boot environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
}

/// Why the plugin or one of its services did not start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("disabled by boot argument {0}")]
    Disabled(&'static str),
    #[error("kernel {found} outside supported range {min}..={max}")]
    UnsupportedKernel { found: u32, min: u32, max: u32 },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Intercept(#[from] InterceptError),
    #[error("plugin did not start")]
    PluginNotStarted,
}

/// Static plugin description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginConfig {
    pub product_name: &'static str,
    pub version: &'static str,
    pub bootarg_off: &'static [&'static str],
    pub bootarg_debug: &'static [&'static str],
    pub bootarg_beta: &'static [&'static str],
    pub min_kernel: u32,
    pub max_kernel: u32,
    pub intercept_symbol: String,
    pub gate: GateConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            product_name: "RSRRepairCompanion",
            version: env!("CARGO_PKG_VERSION"),
            bootarg_off: &["-rsrrcoff"],
            bootarg_debug: &["-rsrrcdbg"],
            bootarg_beta: &["-rsrrcbeta"],
            min_kernel: KERNEL_VENTURA,
            max_kernel: KERNEL_VENTURA,
            intercept_symbol: DEFAULT_INTERCEPT_SYMBOL.to_string(),
            gate: GateConfig::default(),
        }
    }
}

/// Switches found on the boot-args line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootArgs {
    pub off: bool,
    pub debug: bool,
    pub beta: bool,
}

impl BootArgs {
    /// Find the configured switches among whitespace-separated words of `line`.
    pub fn parse(line: &str, config: &PluginConfig) -> Self {
        let has = |names: &[&str]| {
            line.split_whitespace()
                .any(|arg| names.iter().any(|name| *name == arg))
        };
        Self {
            off: has(config.bootarg_off),
            debug: has(config.bootarg_debug),
            beta: has(config.bootarg_beta),
        }
    }
}

/// What the running system looks like at load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootEnvironment {
    pub boot_args: String,
    pub kernel_major: u32,
}

impl BootEnvironment {
    /// Read `RSRRC_BOOT_ARGS` and `RSRRC_KERNEL_MAJOR`. Missing variables
    /// mean no boot arguments and a Ventura kernel.
    pub fn from_env() -> Result<Self, ConfigError> {
        let boot_args = std::env::var("RSRRC_BOOT_ARGS").unwrap_or_default();
        let kernel_major = match std::env::var("RSRRC_KERNEL_MAJOR") {
            Ok(v) => v.trim().parse().map_err(|_| ConfigError::InvalidVar {
                var: "RSRRC_KERNEL_MAJOR",
                value: v.clone(),
            })?,
            Err(_) => KERNEL_VENTURA,
        };
        Ok(Self {
            boot_args,
            kernel_major,
        })
    }
}

/// A loaded plugin and the outcome of its start.
pub struct Plugin {
    config: PluginConfig,
    companion: Arc<Companion>,
    gate: Option<Arc<BootGate>>,
    status: Result<(), StartError>,
}

impl Plugin {
    /// Apply boot arguments, resolve helpers and install the gate. The
    /// returned plugin records whether the start succeeded; on failure the
    /// boot routine is left untouched.
    pub fn load(
        config: PluginConfig,
        env: &BootEnvironment,
        companion: Arc<Companion>,
        image: &dyn KernelImage,
        port: &dyn InterceptionPort,
    ) -> Self {
        let mut plugin = Self {
            config,
            companion,
            gate: None,
            status: Ok(()),
        };
        plugin.status = plugin.start(env, image, port);
        match &plugin.status {
            Ok(()) => info!(
                target: MODULE_SHORT,
                "{} {} started", plugin.config.product_name, plugin.config.version
            ),
            Err(e) => warn!(target: MODULE_SHORT, "{} not started: {e}", plugin.config.product_name),
        }
        plugin
    }

    fn start(
        &mut self,
        env: &BootEnvironment,
        image: &dyn KernelImage,
        port: &dyn InterceptionPort,
    ) -> Result<(), StartError> {
        let args = BootArgs::parse(&env.boot_args, &self.config);
        apply_log_level(args.debug);
        if args.off {
            let switch = self.config.bootarg_off.first().copied().unwrap_or_default();
            return Err(StartError::Disabled(switch));
        }
        self.check_kernel(env.kernel_major, args.beta)?;

        self.companion.solve_needed_symbols(image)?;

        let symbol = &self.config.intercept_symbol;
        let gate = Arc::new(BootGate::new(Arc::clone(&self.companion), self.config.gate));
        // The replacement is reachable as soon as it is routed.
        gate.set_original(port.original_entry(symbol)?);
        port.route(symbol, gate.replacement())?;
        info!(target: MODULE_SHORT, "gate installed on {}", self.config.intercept_symbol);
        self.gate = Some(gate);
        Ok(())
    }

    fn check_kernel(&self, found: u32, beta: bool) -> Result<(), StartError> {
        let (min, max) = (self.config.min_kernel, self.config.max_kernel);
        if found < min || (found > max && !beta) {
            return Err(StartError::UnsupportedKernel { found, min, max });
        }
        if found > max {
            warn!(target: MODULE_SHORT, "kernel {found} is untested, allowed by beta switch");
        }
        Ok(())
    }

    /// True when the gate was installed.
    pub fn start_success(&self) -> bool {
        self.status.is_ok()
    }

    /// Outcome of the start sequence.
    pub fn status(&self) -> &Result<(), StartError> {
        &self.status
    }

    /// Configuration the plugin was loaded with.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Companion shared with the client service.
    pub fn companion(&self) -> &Arc<Companion> {
        &self.companion
    }

    /// Installed boot gate, if the start succeeded.
    pub fn gate(&self) -> Option<&Arc<BootGate>> {
        self.gate.as_ref()
    }
}

/// Verbosity follows the debug switch: `Debug` with it, at most `Info`
/// without it. The installed logger's own filter is left alone, so it should
/// be at least as permissive as `Debug`.
pub fn apply_log_level(debug: bool) {
    let current = log::max_level();
    if debug {
        if current < LevelFilter::Debug {
            log::set_max_level(LevelFilter::Debug);
        }
    } else if current > LevelFilter::Info {
        log::set_max_level(LevelFilter::Info);
    }
}

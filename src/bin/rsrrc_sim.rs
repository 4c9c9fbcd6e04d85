// CLASSIFICATION: COMMUNITY
// Filename: rsrrc_sim.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Runs one simulated boot against an in-process host.
//!
//! A boot thread enters the gated kernel-collection check while a
//! "userspace" thread opens the client channel and reports. A restart ends
//! the process with exit status 3.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{error, info};
use rsrrc::host::{
    ClientHost, HostError, InterceptError, InterceptionPort, KcUuid, KernReturn, Platform,
    ProcHandle, PropertySource, SecurityToken, TaskHandle, ValidationRoutine,
};
use rsrrc::lifecycle::{ClientService, CompanionService, Lifecycle};
use rsrrc::shared::{CDHASH_PROPERTY, METHOD_DO_REBOOT, METHOD_REPORT_ACTION};
use rsrrc::symbols::{KernelImage, KernelSymbol, CS_GET_CDHASH, GET_BSDTASK_INFO};
use rsrrc::{
    BootEnvironment, CdHash, Companion, GateConfig, IdentityPolicy, MethodArguments, Plugin,
    PluginConfig, Variant,
};

const RESTART_EXIT: i32 = 3;
const CLIENT_TASK: TaskHandle = TaskHandle(501);
const CLIENT_PROC: ProcHandle = ProcHandle(501);
const ORIGINAL_RET: KernReturn = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Report {
    Continue,
    Reboot,
    None,
}

#[derive(Parser)]
#[command(name = "rsrrc-sim", about = "Simulate a gated boot", version = "0.1")]
struct Cli {
    /// What the userspace client reports.
    #[arg(long, value_enum, default_value = "continue")]
    report: Report,
    /// Delay before the client opens the channel.
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
    /// Poll interval of the boot gate.
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,
    /// Number of report checks before failing open.
    #[arg(long, default_value_t = 16)]
    checks: u32,
    /// Trusted cdhash (hex). Defaults to the embedded value.
    #[arg(long)]
    trusted: Option<CdHash>,
    /// Cdhash presented by the client (hex). Defaults to the trusted one.
    #[arg(long)]
    client: Option<CdHash>,
    /// Publish a development cdhash (hex) and accept it.
    #[arg(long)]
    dev_identity: Option<CdHash>,
    /// Boot-args line; overrides RSRRC_BOOT_ARGS.
    #[arg(long, allow_hyphen_values = true)]
    boot_args: Option<String>,
    /// Kernel major version; overrides RSRRC_KERNEL_MAJOR.
    #[arg(long)]
    kernel: Option<u32>,
    /// Use the direct-reboot method table and call it immediately.
    #[arg(long)]
    reboot_now: bool,
}

struct SimPlatform;

impl Platform for SimPlatform {
    fn restart_cpu(&self) -> ! {
        println!("restart requested");
        std::process::exit(RESTART_EXIT);
    }
}

#[derive(Default)]
struct SimProperties {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl SimProperties {
    fn insert(&self, key: &str, value: &[u8]) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_vec());
        }
    }
}

impl PropertySource for SimProperties {
    fn property_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set_property(&self, key: &str, value: &str) {
        self.insert(key, value.as_bytes());
    }
}

/// One client process whose executable carries `client_hash`.
struct SimKernel {
    client_hash: Option<CdHash>,
}

impl KernelImage for SimKernel {
    fn solve_symbol(&self, name: &str) -> Option<KernelSymbol> {
        match name {
            GET_BSDTASK_INFO => Some(KernelSymbol::BsdTaskInfo(Arc::new(|task: TaskHandle| {
                (task == CLIENT_TASK).then_some(CLIENT_PROC)
            }))),
            CS_GET_CDHASH => {
                let hash = self.client_hash;
                Some(KernelSymbol::CsGetCdHash(Arc::new(move |proc: ProcHandle| {
                    if proc == CLIENT_PROC {
                        hash
                    } else {
                        None
                    }
                })))
            }
            _ => None,
        }
    }
}

#[derive(Default)]
struct SimPort {
    installed: Mutex<Option<ValidationRoutine>>,
}

impl SimPort {
    fn original() -> ValidationRoutine {
        Arc::new(|uuid: &KcUuid| {
            info!("original check accepted {uuid:?}");
            ORIGINAL_RET
        })
    }

    fn entry(&self) -> ValidationRoutine {
        self.installed
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(Self::original)
    }
}

impl InterceptionPort for SimPort {
    fn original_entry(&self, _name: &str) -> Result<ValidationRoutine, InterceptError> {
        Ok(Self::original())
    }

    fn route(&self, name: &str, replacement: ValidationRoutine) -> Result<(), InterceptError> {
        let mut slot = self.installed.lock().map_err(|e| InterceptError::RouteFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        *slot = Some(replacement);
        Ok(())
    }
}

struct SimClientHost;

impl ClientHost for SimClientHost {
    fn init_with_task(
        &self,
        _task: TaskHandle,
        _token: SecurityToken,
        _client_type: u32,
    ) -> Result<(), HostError> {
        Ok(())
    }
}

fn userspace(clients: Arc<ClientService>, cli: &Cli) -> thread::JoinHandle<()> {
    let delay = Duration::from_millis(cli.delay_ms);
    let report = cli.report;
    let reboot_now = cli.reboot_now;
    thread::spawn(move || {
        thread::sleep(delay);
        let conn = match clients.open(Some(CLIENT_TASK), SecurityToken(0), 0) {
            Ok(conn) => conn,
            Err(e) => {
                println!("client open refused: {e}");
                return;
            }
        };
        let result = if reboot_now {
            conn.external_method(METHOD_DO_REBOOT, &MethodArguments::default())
        } else {
            match report {
                Report::Continue => {
                    conn.external_method(METHOD_REPORT_ACTION, &MethodArguments::scalars(&[0]))
                }
                Report::Reboot => {
                    conn.external_method(METHOD_REPORT_ACTION, &MethodArguments::scalars(&[1]))
                }
                Report::None => Ok(()),
            }
        };
        match result {
            Ok(()) => println!("client call ok"),
            Err(e) => println!("client call failed: {e} ({:#x})", e.code()),
        }
    })
}

fn main() -> ExitCode {
    // Verbosity is left to the -rsrrcdbg switch; RUST_LOG still narrows it.
    env_logger::Builder::from_env(Env::default().default_filter_or("debug")).init();
    let cli = Cli::parse();

    let mut env = match BootEnvironment::from_env() {
        Ok(env) => env,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(args) = &cli.boot_args {
        env.boot_args = args.clone();
    }
    if let Some(kernel) = cli.kernel {
        env.kernel_major = kernel;
    }

    let trusted = cli.trusted.or(IdentityPolicy::for_build().primary);
    let policy = match cli.dev_identity {
        Some(_) => IdentityPolicy::development(trusted),
        None => match trusted {
            Some(hash) => IdentityPolicy::production(hash),
            None => IdentityPolicy::development(None),
        },
    };
    let properties = Arc::new(SimProperties::default());
    if let Some(dev) = cli.dev_identity {
        properties.insert(CDHASH_PROPERTY, dev.as_bytes());
    }
    let variant = if cli.reboot_now {
        Variant::DirectReboot
    } else {
        Variant::ReportGate
    };

    let companion = Arc::new(
        Companion::new(Arc::new(SimPlatform), properties.clone())
            .with_policy(policy)
            .with_variant(variant),
    );
    let config = PluginConfig {
        gate: GateConfig {
            poll_interval: Duration::from_millis(cli.interval_ms),
            max_checks: cli.checks,
        },
        ..PluginConfig::default()
    };
    let kernel = SimKernel {
        client_hash: cli.client.or(trusted),
    };
    let port = SimPort::default();
    let plugin = Arc::new(Plugin::load(config, &env, Arc::clone(&companion), &kernel, &port));

    let service = CompanionService::new(Arc::clone(&plugin));
    if service.probe(properties.as_ref()) {
        if let Err(e) = service.start() {
            error!("{e}");
        }
    } else if let Err(e) = plugin.status() {
        println!("plugin inactive: {e}");
    }

    let clients = Arc::new(ClientService::new(
        Arc::clone(&companion),
        Arc::new(SimClientHost),
    ));
    if let Err(e) = clients.start() {
        println!("client service not started: {e}");
    }

    let client = userspace(Arc::clone(&clients), &cli);
    let ret = port.entry()(&KcUuid([0; 16]));
    println!(
        "boot continued: ret={ret} report={:?} phase={:?}",
        companion.report_state(),
        companion.gate_phase()
    );

    if client.join().is_err() {
        error!("client thread panicked");
    }
    clients.stop();
    service.stop();
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_args_accept_switches() {
        let cli = Cli::try_parse_from(["rsrrc-sim", "--boot-args", "-rsrrcoff", "--checks", "3"])
            .unwrap();
        assert_eq!(cli.boot_args.as_deref(), Some("-rsrrcoff"));
        assert_eq!(cli.checks, 3);

        let cli = Cli::try_parse_from(["rsrrc-sim", "--boot-args", "-v -rsrrcdbg"]).unwrap();
        assert_eq!(cli.boot_args.as_deref(), Some("-v -rsrrcdbg"));
    }

    #[test]
    fn cdhash_flags_parse_hex() {
        let hex = "00112233445566778899aabbccddeeff00112233";
        let cli = Cli::try_parse_from(["rsrrc-sim", "--trusted", hex, "--report", "none"]).unwrap();
        assert_eq!(cli.trusted.map(|h| h.to_string()).as_deref(), Some(hex));
        assert_eq!(cli.report, Report::None);
        assert!(Cli::try_parse_from(["rsrrc-sim", "--trusted", "zz"]).is_err());
    }
}

// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! In-process host used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rsrrc::host::{
    ClientHost, HostError, InterceptError, InterceptionPort, KcUuid, KernReturn, Platform,
    ProcHandle, PropertySource, SecurityToken, Sleeper, TaskHandle, ValidationRoutine,
};
use rsrrc::shared::CDHASH_PROPERTY;
use rsrrc::symbols::{KernelImage, KernelSymbol, CS_GET_CDHASH, GET_BSDTASK_INFO};
use rsrrc::{CdHash, Companion, IdentityPolicy, Variant};

pub const TRUSTED: CdHash = CdHash::new([0x11; 20]);
pub const DEV: CdHash = CdHash::new([0x22; 20]);
pub const STRANGER: CdHash = CdHash::new([0x33; 20]);

pub const TRUSTED_TASK: TaskHandle = TaskHandle(1);
pub const DEV_TASK: TaskHandle = TaskHandle(2);
pub const STRANGER_TASK: TaskHandle = TaskHandle(3);
pub const ORPHAN_TASK: TaskHandle = TaskHandle(4);
pub const UNSIGNED_TASK: TaskHandle = TaskHandle(5);

pub const ORIGINAL_RET: KernReturn = 0x2a;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Message carried by the panic that stands in for a restart.
pub const RESTART_PANIC: &str = "restart_cpu";

#[derive(Default)]
pub struct MockPlatform {
    pub restarts: AtomicUsize,
}

impl Platform for MockPlatform {
    fn restart_cpu(&self) -> ! {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        panic!("{}", RESTART_PANIC);
    }
}

#[derive(Default)]
pub struct MockProperties {
    pub values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockProperties {
    pub fn with_dev_identity(hash: &[u8]) -> Self {
        let props = Self::default();
        props
            .values
            .lock()
            .unwrap()
            .insert(CDHASH_PROPERTY.to_string(), hash.to_vec());
        props
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

impl PropertySource for MockProperties {
    fn property_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set_property(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.as_bytes().to_vec());
    }
}

/// Kernel with a fixed task → process → cdhash layout.
pub struct MockKernel {
    pub missing: Vec<&'static str>,
    procs: Arc<HashMap<TaskHandle, ProcHandle>>,
    hashes: Arc<HashMap<ProcHandle, CdHash>>,
}

impl Default for MockKernel {
    fn default() -> Self {
        let procs = HashMap::from([
            (TRUSTED_TASK, ProcHandle(101)),
            (DEV_TASK, ProcHandle(102)),
            (STRANGER_TASK, ProcHandle(103)),
            (UNSIGNED_TASK, ProcHandle(105)),
        ]);
        let hashes = HashMap::from([
            (ProcHandle(101), TRUSTED),
            (ProcHandle(102), DEV),
            (ProcHandle(103), STRANGER),
        ]);
        Self {
            missing: Vec::new(),
            procs: Arc::new(procs),
            hashes: Arc::new(hashes),
        }
    }
}

impl MockKernel {
    pub fn without(symbol: &'static str) -> Self {
        Self {
            missing: vec![symbol],
            ..Self::default()
        }
    }
}

impl KernelImage for MockKernel {
    fn solve_symbol(&self, name: &str) -> Option<KernelSymbol> {
        if self.missing.iter().any(|m| *m == name) {
            return None;
        }
        match name {
            GET_BSDTASK_INFO => {
                let procs = Arc::clone(&self.procs);
                Some(KernelSymbol::BsdTaskInfo(Arc::new(move |task: TaskHandle| {
                    procs.get(&task).copied()
                })))
            }
            CS_GET_CDHASH => {
                let hashes = Arc::clone(&self.hashes);
                Some(KernelSymbol::CsGetCdHash(Arc::new(move |proc: ProcHandle| {
                    hashes.get(&proc).copied()
                })))
            }
            _ => None,
        }
    }
}

type SleepHook = Box<dyn FnOnce() + Send>;

/// Records sleeps instead of blocking; can run a hook at a given sleep.
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
    hook: Mutex<Option<(usize, SleepHook)>>,
}

impl RecordingSleeper {
    /// Run `hook` during sleep number `at` (1-based).
    pub fn on_sleep(&self, at: usize, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock().unwrap() = Some((at, Box::new(hook)));
    }

    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, interval: Duration) {
        let n = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(interval);
            sleeps.len()
        };
        let due = {
            let mut hook = self.hook.lock().unwrap();
            match hook.take() {
                Some((at, f)) if at == n => Some(f),
                other => {
                    *hook = other;
                    None
                }
            }
        };
        if let Some(f) = due {
            f();
        }
    }
}

#[derive(Default)]
pub struct MockClientHost {
    pub fail: bool,
    pub opens: AtomicUsize,
}

impl ClientHost for MockClientHost {
    fn init_with_task(
        &self,
        _task: TaskHandle,
        _token: SecurityToken,
        _client_type: u32,
    ) -> Result<(), HostError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(HostError("out of memory".into()))
        } else {
            Ok(())
        }
    }
}

/// Interception port that keeps the replacement and counts original calls.
#[derive(Default)]
pub struct MockPort {
    pub fail: bool,
    /// Invoke the replacement from inside `route`, as a boot thread racing
    /// the install would.
    pub call_while_routing: bool,
    pub routed_call: Mutex<Option<KernReturn>>,
    pub requests: Mutex<Vec<String>>,
    pub installed: Mutex<Option<ValidationRoutine>>,
    pub original_calls: Arc<AtomicUsize>,
}

impl MockPort {
    /// Invoke whatever currently sits at the routine's entry point.
    pub fn call(&self, uuid: &KcUuid) -> KernReturn {
        let routine = self.installed.lock().unwrap().clone();
        match routine {
            Some(r) => r(uuid),
            None => self.original()(uuid),
        }
    }

    pub fn original(&self) -> ValidationRoutine {
        let calls = Arc::clone(&self.original_calls);
        Arc::new(move |_: &KcUuid| {
            calls.fetch_add(1, Ordering::SeqCst);
            ORIGINAL_RET
        })
    }
}

impl InterceptionPort for MockPort {
    fn original_entry(&self, _name: &str) -> Result<ValidationRoutine, InterceptError> {
        Ok(self.original())
    }

    fn route(&self, name: &str, replacement: ValidationRoutine) -> Result<(), InterceptError> {
        self.requests.lock().unwrap().push(name.to_string());
        if self.fail {
            return Err(InterceptError::RouteFailed {
                name: name.to_string(),
                reason: "entry point not writable".to_string(),
            });
        }
        *self.installed.lock().unwrap() = Some(Arc::clone(&replacement));
        if self.call_while_routing {
            *self.routed_call.lock().unwrap() = Some(replacement(&KcUuid([0; 16])));
        }
        Ok(())
    }
}

/// A companion wired to mocks.
pub struct Rig {
    pub companion: Arc<Companion>,
    pub platform: Arc<MockPlatform>,
    pub properties: Arc<MockProperties>,
    pub sleeper: Arc<RecordingSleeper>,
    pub host: Arc<MockClientHost>,
}

impl Rig {
    pub fn new(policy: IdentityPolicy, variant: Variant, properties: MockProperties) -> Self {
        init_logger();
        let platform = Arc::new(MockPlatform::default());
        let properties = Arc::new(properties);
        let sleeper = Arc::new(RecordingSleeper::default());
        let companion = Companion::new(platform.clone(), properties.clone())
            .with_policy(policy)
            .with_variant(variant)
            .with_sleeper(sleeper.clone());
        Self {
            companion: Arc::new(companion),
            platform,
            properties,
            sleeper,
            host: Arc::new(MockClientHost::default()),
        }
    }

    /// Production policy trusting [`TRUSTED`], report variant, symbols solved.
    pub fn production() -> Self {
        let rig = Self::new(
            IdentityPolicy::production(TRUSTED),
            Variant::ReportGate,
            MockProperties::with_dev_identity(DEV.as_bytes()),
        );
        rig.companion
            .solve_needed_symbols(&MockKernel::default())
            .unwrap();
        rig
    }

    pub fn restarts(&self) -> usize {
        self.platform.restarts.load(Ordering::SeqCst)
    }
}

/// True when `result` is the unwind produced by [`MockPlatform::restart_cpu`].
pub fn is_restart<T>(result: &std::thread::Result<T>) -> bool {
    match result {
        Ok(_) => false,
        Err(payload) => payload
            .downcast_ref::<String>()
            .map(|s| s == RESTART_PANIC)
            .unwrap_or(false),
    }
}

// CLASSIFICATION: COMMUNITY
// Filename: host.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Ports implemented by the hosting kernel environment.
//!
//! The companion never touches kernel internals directly. Everything it
//! needs from its host (restart, properties, the base client open, routine
//! interception) goes through the traits below.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Opaque task reference handed over by the IPC layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u64);

/// Opaque BSD process record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcHandle(pub u64);

/// Security token supplied with a client open request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecurityToken(pub u64);

/// UUID of the booted kernel collection.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KcUuid(pub [u8; 16]);

impl fmt::Debug for KcUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KcUuid({})", hex::encode(self.0))
    }
}

/// Kernel status code returned by the intercepted routine.
pub type KernReturn = i32;

/// Kernel-collection UUID validation routine, original or replacement.
pub type ValidationRoutine = Arc<dyn Fn(&KcUuid) -> KernReturn + Send + Sync>;

/// Platform restart facility.
pub trait Platform: Send + Sync {
    /// Restart the CPU. Control does not come back.
    fn restart_cpu(&self) -> !;
}

/// Provider property store.
pub trait PropertySource: Send + Sync {
    fn property_bytes(&self, key: &str) -> Option<Vec<u8>>;
    fn set_property(&self, key: &str, value: &str);
}

/// Sleep used between report polls.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, interval: Duration);
}

/// Blocks the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Failure reported by the host's base client open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("base client open failed: {0}")]
pub struct HostError(pub String);

/// Base behaviour of a user client, finished after identity checks pass.
pub trait ClientHost: Send + Sync {
    fn init_with_task(
        &self,
        task: TaskHandle,
        token: SecurityToken,
        client_type: u32,
    ) -> Result<(), HostError>;
}

/// Errors from installing a routine replacement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterceptError {
    #[error("symbol {0} not found")]
    SymbolNotFound(String),
    #[error("failed to route {name}: {reason}")]
    RouteFailed { name: String, reason: String },
}

/// Redirects a privileged routine to a replacement.
///
/// Lookup and routing are separate steps so a caller can record the original
/// entry point before any thread can reach the replacement.
pub trait InterceptionPort {
    /// Callable entry point of the unmodified routine `name`.
    fn original_entry(&self, name: &str) -> Result<ValidationRoutine, InterceptError>;

    /// Send every later call of `name` to `replacement`.
    fn route(&self, name: &str, replacement: ValidationRoutine) -> Result<(), InterceptError>;

    /// Route `name` to `replacement` and hand back the original entry point.
    fn intercept(
        &self,
        name: &str,
        replacement: ValidationRoutine,
    ) -> Result<ValidationRoutine, InterceptError> {
        let original = self.original_entry(name)?;
        self.route(name, replacement)?;
        Ok(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Table {
        routed: Mutex<Option<ValidationRoutine>>,
    }

    impl InterceptionPort for Table {
        fn original_entry(&self, name: &str) -> Result<ValidationRoutine, InterceptError> {
            match name {
                "_kc_uuid_validate" => Ok(Arc::new(|_: &KcUuid| 0)),
                other => Err(InterceptError::SymbolNotFound(other.to_string())),
            }
        }

        fn route(&self, _name: &str, replacement: ValidationRoutine) -> Result<(), InterceptError> {
            *self.routed.lock().unwrap() = Some(replacement);
            Ok(())
        }
    }

    #[test]
    fn intercept_returns_original_and_routes() {
        let table = Table::default();
        let original = table
            .intercept("_kc_uuid_validate", Arc::new(|_: &KcUuid| 9))
            .unwrap();
        assert_eq!(original(&KcUuid([0; 16])), 0);
        let routed = table.routed.lock().unwrap().clone().unwrap();
        assert_eq!(routed(&KcUuid([0; 16])), 9);
    }

    #[test]
    fn unknown_symbol_is_never_routed() {
        let table = Table::default();
        let err = table
            .intercept("_missing", Arc::new(|_: &KcUuid| 9))
            .err();
        assert_eq!(err, Some(InterceptError::SymbolNotFound("_missing".into())));
        assert!(table.routed.lock().unwrap().is_none());
    }
}

// CLASSIFICATION: COMMUNITY
// Filename: symbols.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Resolution of the kernel helpers used to identify client processes.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::host::{ProcHandle, TaskHandle};
use crate::identity::CdHash;
use crate::shared::MODULE_SHORT;

/// Maps a task to its BSD process record.
pub const GET_BSDTASK_INFO: &str = "_get_bsdtask_info";
/// Reads the code directory hash of a process.
pub const CS_GET_CDHASH: &str = "_cs_get_cdhash";

/// Task to BSD process lookup.
pub type BsdTaskInfoFn = Arc<dyn Fn(TaskHandle) -> Option<ProcHandle> + Send + Sync>;
/// Process to cdhash lookup.
pub type CsGetCdHashFn = Arc<dyn Fn(ProcHandle) -> Option<CdHash> + Send + Sync>;

/// A routine found in the kernel image.
pub enum KernelSymbol {
    BsdTaskInfo(BsdTaskInfoFn),
    CsGetCdHash(CsGetCdHashFn),
}

/// Symbol lookup against the running kernel.
pub trait KernelImage {
    fn solve_symbol(&self, name: &str) -> Option<KernelSymbol>;
}

/// Failure to resolve the identity helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("could not solve required symbols: {}", .0.join(" "))]
    Missing(Vec<&'static str>),
}

/// Helpers resolved once at patcher load.
#[derive(Clone)]
pub struct SymbolTable {
    get_bsdtask_info: BsdTaskInfoFn,
    cs_get_cdhash: CsGetCdHashFn,
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable").finish_non_exhaustive()
    }
}

impl SymbolTable {
    /// Look up both helpers. Either one missing fails the whole resolution.
    pub fn resolve(image: &dyn KernelImage) -> Result<Self, ResolveError> {
        let task_info = match image.solve_symbol(GET_BSDTASK_INFO) {
            Some(KernelSymbol::BsdTaskInfo(f)) => Some(f),
            _ => None,
        };
        let cdhash = match image.solve_symbol(CS_GET_CDHASH) {
            Some(KernelSymbol::CsGetCdHash(f)) => Some(f),
            _ => None,
        };
        match (task_info, cdhash) {
            (Some(get_bsdtask_info), Some(cs_get_cdhash)) => {
                debug!(target: MODULE_SHORT, "solved {GET_BSDTASK_INFO} and {CS_GET_CDHASH}");
                Ok(Self {
                    get_bsdtask_info,
                    cs_get_cdhash,
                })
            }
            (task_info, cdhash) => {
                let mut missing = Vec::new();
                if task_info.is_none() {
                    missing.push(GET_BSDTASK_INFO);
                }
                if cdhash.is_none() {
                    missing.push(CS_GET_CDHASH);
                }
                let err = ResolveError::Missing(missing);
                warn!(target: MODULE_SHORT, "{err}");
                Err(err)
            }
        }
    }

    /// BSD process backing `task`.
    pub fn bsdtask_info(&self, task: TaskHandle) -> Option<ProcHandle> {
        (self.get_bsdtask_info)(task)
    }

    /// Cdhash of the main executable of `proc`.
    pub fn cdhash(&self, proc: ProcHandle) -> Option<CdHash> {
        (self.cs_get_cdhash)(proc)
    }
}

// CLASSIFICATION: COMMUNITY
// Filename: client.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Identity-checked user client.
//!
//! A [`Connection`] only exists once the opening task has been traced to a
//! process whose cdhash the [`IdentityPolicy`](crate::identity::IdentityPolicy)
//! accepts. Every failure before the host's base open leaves nothing behind.

use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::companion::Companion;
use crate::dispatch::{self, IoReturn, MethodArguments};
use crate::host::{ClientHost, HostError, SecurityToken, TaskHandle};
use crate::shared::MODULE_SHORT;

/// Why a task was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no owning task")]
    NoOwner,
    #[error("task has no BSD process")]
    NoProcess,
    #[error("process has no cdhash")]
    NoCdHash,
    #[error("cdhash not trusted")]
    Untrusted,
}

/// Why a connection could not be opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("client service not started")]
    NotStarted,
    #[error("client unavailable: kernel helpers not resolved")]
    SymbolsUnavailable,
    #[error("not authorized: {0}")]
    NotAuthorized(#[from] AuthError),
    #[error(transparent)]
    BaseOpen(#[from] HostError),
}

/// An opened, authenticated channel.
pub struct Connection {
    owning_task: TaskHandle,
    provider: Arc<Companion>,
    security_token: SecurityToken,
    client_type: u32,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("owning_task", &self.owning_task)
            .field("security_token", &self.security_token)
            .field("client_type", &self.client_type)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Authenticate `owner` and, only if it is trusted, finish the open
    /// through the host.
    pub fn open(
        provider: &Arc<Companion>,
        host: &dyn ClientHost,
        owner: Option<TaskHandle>,
        security_token: SecurityToken,
        client_type: u32,
    ) -> Result<Self, ChannelError> {
        let owning_task = authenticate(provider, owner).map_err(|e| {
            if let ChannelError::NotAuthorized(reason) = &e {
                warn!(target: MODULE_SHORT, "refusing client {owner:?}: {reason}");
            }
            e
        })?;

        host.init_with_task(owning_task, security_token, client_type)
            .map_err(|e| {
                warn!(target: MODULE_SHORT, "client {owning_task:?} authorized but {e}");
                ChannelError::BaseOpen(e)
            })?;

        info!(target: MODULE_SHORT, "client opened by {owning_task:?}");
        Ok(Self {
            owning_task,
            provider: Arc::clone(provider),
            security_token,
            client_type,
        })
    }

    /// Task that opened this connection.
    pub fn owning_task(&self) -> TaskHandle {
        self.owning_task
    }

    /// Token supplied with the open request.
    pub fn security_token(&self) -> SecurityToken {
        self.security_token
    }

    /// Client type requested at open.
    pub fn client_type(&self) -> u32 {
        self.client_type
    }

    /// Run a method from the provider's table. Actions are bound to the
    /// provider, not to this connection.
    pub fn external_method(
        &self,
        selector: u32,
        args: &MethodArguments<'_>,
    ) -> Result<(), IoReturn> {
        let methods = self.provider.variant().methods();
        dispatch::dispatch(&self.provider, methods, selector, args)
    }

    /// Close the connection. Dropping it has the same effect.
    pub fn close(self) {}
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!(target: MODULE_SHORT, "client {:?} closed", self.owning_task);
    }
}

fn authenticate(provider: &Companion, owner: Option<TaskHandle>) -> Result<TaskHandle, ChannelError> {
    let symbols = provider.symbols().ok_or(ChannelError::SymbolsUnavailable)?;
    let task = owner.ok_or(AuthError::NoOwner)?;
    let proc = symbols.bsdtask_info(task).ok_or(AuthError::NoProcess)?;
    let cdhash = symbols.cdhash(proc).ok_or(AuthError::NoCdHash)?;
    if !provider.policy().authorizes(&cdhash, provider.properties()) {
        debug!(target: MODULE_SHORT, "untrusted cdhash {cdhash} for {task:?}");
        return Err(AuthError::Untrusted.into());
    }
    Ok(task)
}

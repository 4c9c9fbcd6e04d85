// CLASSIFICATION: COMMUNITY
// Filename: lifecycle.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Attach/detach hooks called by the host service tree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::client::{ChannelError, Connection};
use crate::companion::Companion;
use crate::host::{ClientHost, PropertySource, SecurityToken, TaskHandle};
use crate::plugin::{Plugin, StartError};
use crate::shared::MODULE_SHORT;

/// Hooks a host service calls while matching, starting and stopping.
pub trait Lifecycle {
    /// Return whether this service should attach to `provider`.
    fn probe(&self, provider: &dyn PropertySource) -> bool;
    fn start(&self) -> Result<(), StartError>;
    fn stop(&self);
}

/// The companion service published in the host tree.
pub struct CompanionService {
    plugin: Arc<Plugin>,
    registered: AtomicBool,
}

impl CompanionService {
    /// Unregistered service for `plugin`.
    pub fn new(plugin: Arc<Plugin>) -> Self {
        Self {
            plugin,
            registered: AtomicBool::new(false),
        }
    }

    /// True between a successful `start` and `stop`.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Companion created for the plugin.
    pub fn companion(&self) -> &Arc<Companion> {
        self.plugin.companion()
    }
}

impl Lifecycle for CompanionService {
    fn probe(&self, provider: &dyn PropertySource) -> bool {
        provider.set_property("VersionInfo", self.plugin.config().version);
        self.plugin.start_success()
    }

    fn start(&self) -> Result<(), StartError> {
        if !self.plugin.start_success() {
            warn!(target: MODULE_SHORT, "refusing to register: plugin did not start");
            return Err(StartError::PluginNotStarted);
        }
        self.registered.store(true, Ordering::Release);
        info!(target: MODULE_SHORT, "{} registered", self.plugin.config().product_name);
        Ok(())
    }

    fn stop(&self) {
        self.registered.store(false, Ordering::Release);
        info!(target: MODULE_SHORT, "{} stopped", self.plugin.config().product_name);
    }
}

/// Factory side of the user client. Opens connections only while started.
pub struct ClientService {
    companion: Arc<Companion>,
    host: Arc<dyn ClientHost>,
    started: AtomicBool,
}

impl ClientService {
    /// Stopped client service opening connections through `host`.
    pub fn new(companion: Arc<Companion>, host: Arc<dyn ClientHost>) -> Self {
        Self {
            companion,
            host,
            started: AtomicBool::new(false),
        }
    }

    /// Open an authenticated connection for `owner`.
    pub fn open(
        &self,
        owner: Option<TaskHandle>,
        security_token: SecurityToken,
        client_type: u32,
    ) -> Result<Connection, ChannelError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(ChannelError::NotStarted);
        }
        Connection::open(
            &self.companion,
            self.host.as_ref(),
            owner,
            security_token,
            client_type,
        )
    }
}

impl Lifecycle for ClientService {
    fn probe(&self, _provider: &dyn PropertySource) -> bool {
        true
    }

    fn start(&self) -> Result<(), StartError> {
        if self.companion.symbols().is_none() {
            let err = self
                .companion
                .resolve_error()
                .cloned()
                .map(StartError::Resolve)
                .unwrap_or(StartError::PluginNotStarted);
            warn!(target: MODULE_SHORT, "cannot start client without required symbols: {err}");
            return Err(err);
        }
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) {
        self.started.store(false, Ordering::Release);
    }
}

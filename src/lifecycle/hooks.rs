//! Daemon lifecycle entry points.
//!
//! # Responsibilities
//! - Expose init/start/stop/destroy outward
//! - Delegate to an optional application-supplied hook of the same name,
//!   hook before action: init hooks before start, stop hooks before the
//!   actual stop, destroy hooks before the actual destroy
//!
//! # Design Decisions
//! - Hooks are a trait with default no-op methods; embedders implement only
//!   what they need

use std::sync::Arc;

use crate::http::server::{HostServer, ServerError};

/// Application-supplied lifecycle hooks. Every method defaults to a no-op
/// and receives the server instance.
pub trait LifecycleHooks: Send + Sync {
    fn init(&self, _server: &HostServer) {}
    fn start(&self, _server: &HostServer) {}
    fn stop(&self, _server: &HostServer) {}
    fn destroy(&self, _server: &HostServer) {}
}

/// Outward daemon facade over a server and its optional hooks.
pub struct Daemon {
    server: Arc<HostServer>,
    hooks: Option<Arc<dyn LifecycleHooks>>,
}

impl Daemon {
    pub fn new(server: Arc<HostServer>, hooks: Option<Arc<dyn LifecycleHooks>>) -> Self {
        Self { server, hooks }
    }

    /// The wrapped server.
    pub fn server(&self) -> &Arc<HostServer> {
        &self.server
    }

    /// Run init hooks. The server itself is already bound at construction.
    pub fn init(&self) {
        if let Some(hooks) = &self.hooks {
            hooks.init(&self.server);
        }
    }

    /// Run start hooks, then start the server.
    pub async fn start(&self) -> Result<(), ServerError> {
        if let Some(hooks) = &self.hooks {
            hooks.start(&self.server);
        }
        self.server.start().await
    }

    /// Run stop hooks, then stop the server.
    pub async fn stop(&self) {
        if let Some(hooks) = &self.hooks {
            hooks.stop(&self.server);
        }
        self.server.stop().await;
    }

    /// Run destroy hooks, then release the server's resources.
    pub async fn destroy(&self) {
        if let Some(hooks) = &self.hooks {
            hooks.destroy(&self.server);
        }
        self.server.destroy().await;
    }
}

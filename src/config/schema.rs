//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for one server instance.
///
/// Immutable snapshot: loaded and validated once at startup, then shared
/// read-only for the lifetime of the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener sockets to open (at least one).
    pub listeners: Vec<ListenerConfig>,

    /// Server-wide defaults for session/cookie handling.
    pub sessions: SessionConfig,

    /// Application mounts resolved against the named-application registry.
    pub apps: Vec<AppMountConfig>,

    /// Static directory mounts.
    pub statics: Vec<StaticMountConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

impl ServerConfig {
    /// Listeners to open, falling back to the default when none configured.
    pub fn effective_listeners(&self) -> Vec<ListenerConfig> {
        if self.listeners.is_empty() {
            vec![ListenerConfig::default()]
        } else {
            self.listeners.clone()
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g. "0.0.0.0").
    pub host: String,

    /// Port to bind. 0 asks the OS for an ephemeral port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Server-wide session and cookie policy defaults.
///
/// Individual contexts may override any of these at registration time.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether contexts get sessions unless they opt out.
    pub enabled: bool,

    /// Session cookie name.
    pub cookie_name: String,

    /// Cookie Domain attribute, omitted when absent.
    pub cookie_domain: Option<String>,

    /// Cookie Path attribute.
    pub cookie_path: String,

    /// Set the HttpOnly cookie attribute.
    pub http_only_cookies: bool,

    /// Set the Secure cookie attribute.
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: "sessionid".to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            http_only_cookies: false,
            secure_cookies: false,
        }
    }
}

/// Mounts a named application at a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppMountConfig {
    /// Path prefix the application is mounted under.
    #[serde(default = "default_mountpoint")]
    pub mountpoint: String,

    /// Virtual hosts the mount is restricted to (empty = all hosts).
    #[serde(default)]
    pub virtual_hosts: Vec<String>,

    /// Application name, resolved through the embedder's registry.
    pub app: String,
}

/// Mounts a static file tree at a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticMountConfig {
    /// Path prefix the tree is mounted under.
    #[serde(default = "default_mountpoint")]
    pub mountpoint: String,

    /// Virtual hosts the mount is restricted to (empty = all hosts).
    #[serde(default)]
    pub virtual_hosts: Vec<String>,

    /// Directory to serve files from.
    pub dir: String,
}

fn default_mountpoint() -> String {
    "/".to_string()
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds to wait for in-flight connections on stop before aborting.
    pub stop_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { stop_secs: 5 }
    }
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use hostmux::config::{ListenerConfig, ServerConfig};
use hostmux::http::HostServer;

/// A config with one loopback listener on an ephemeral port.
pub fn loopback_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listeners.push(ListenerConfig {
        host: "127.0.0.1".into(),
        port: 0,
    });
    // Keep stop() snappy when a test leaves a client connected.
    config.timeouts.stop_secs = 1;
    config
}

/// Bind a server on loopback and return it with its actual address.
pub fn bind_loopback() -> (Arc<HostServer>, SocketAddr) {
    let server = HostServer::bind(loopback_config()).expect("bind failed");
    let addr = server.local_addrs()[0];
    (server, addr)
}

/// An HTTP client that never reuses pooled connections, so stopped
/// listeners are observed immediately.
#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

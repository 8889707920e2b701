//! Listener connectors with two-phase open.
//!
//! # Responsibilities
//! - Bind configured address(es) synchronously at server construction
//! - Hand bound sockets to the accept loop when the server starts
//! - Re-bind on restart after a stop
//!
//! # Design Decisions
//! - Binding is split from accepting so that privileged-port binds can run
//!   under elevated privilege before `start()` runs under a dropped user
//! - Sockets are switched to nonblocking at bind time, ready for tokio

use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::sync::Mutex;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to resolve or bind an address.
    Bind(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A bound-but-not-yet-accepting listener socket.
///
/// `open()` binds immediately; the socket is parked until `take()` moves it
/// into the accept loop. After a stop, `take()` re-binds the same address so
/// a restarted server accepts again.
#[derive(Debug)]
pub struct Connector {
    addr: SocketAddr,
    socket: Mutex<Option<StdTcpListener>>,
}

impl Connector {
    /// Bind the configured address. This is the privileged phase: it runs
    /// synchronously inside server construction, before `start()`.
    pub fn open(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let mut addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(ListenerError::Bind)?;
        let addr = addrs.next().ok_or_else(|| {
            ListenerError::Bind(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "address resolved to nothing",
            ))
        })?;

        let socket = StdTcpListener::bind(addr).map_err(ListenerError::Bind)?;
        socket.set_nonblocking(true).map_err(ListenerError::Bind)?;
        let local_addr = socket.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Connector bound");

        Ok(Self {
            addr: local_addr,
            socket: Mutex::new(Some(socket)),
        })
    }

    /// Take the bound socket for the accept loop, re-binding if a previous
    /// start consumed it.
    pub fn take(&self) -> Result<StdTcpListener, ListenerError> {
        let mut slot = self.socket.lock().expect("connector lock poisoned");
        if let Some(socket) = slot.take() {
            return Ok(socket);
        }
        let socket = StdTcpListener::bind(self.addr).map_err(ListenerError::Bind)?;
        socket.set_nonblocking(true).map_err(ListenerError::Bind)?;
        tracing::debug!(address = %self.addr, "Connector re-bound");
        Ok(socket)
    }

    /// Drop the parked socket, if any. Used by `destroy()`.
    pub fn release(&self) {
        let mut slot = self.socket.lock().expect("connector lock poisoned");
        if slot.take().is_some() {
            tracing::debug!(address = %self.addr, "Connector released");
        }
    }

    /// The local address this connector is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig listeners
//!     → listener.rs Connector::open (privileged bind, at construction)
//!     → HostServer::start() takes the socket into the tokio accept loop
//!     → Hand off to the HTTP dispatch layer
//! ```
//!
//! # Design Decisions
//! - Two-phase bind/accept so privilege can be dropped between the phases
//! - HTTP parsing, TLS and WebSocket framing live in axum/tungstenite

pub mod listener;

pub use listener::{Connector, ListenerError};

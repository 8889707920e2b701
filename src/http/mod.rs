//! HTTP dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (tokio listener)
//!     → server.rs (Axum setup, catch-all dispatch)
//!     → context registry lookup by host + path
//!     → bound handler (application | static | raw | socket upgrade)
//! ```

pub mod server;

pub use server::{HostServer, ServerError};

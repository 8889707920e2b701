//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Construction: bind connectors (privileged phase)
//! start():     hooks → take sockets → serve → start contexts → running
//! stop():      hooks → trigger shutdown → drain (deadline) → clear registry
//! destroy():   hooks → stop if running → release connectors
//! ```
//!
//! # Design Decisions
//! - start()/stop() are idempotent no-ops when already in the target state
//! - Shutdown has a deadline: serve tasks are aborted after it

pub mod hooks;
pub mod shutdown;

pub use hooks::{Daemon, LifecycleHooks};
pub use shutdown::Shutdown;

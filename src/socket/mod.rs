//! Connection-upgrade subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP upgrade request
//!     → bridge.rs (handshake, connect callback, pump task)
//!     → channel.rs (open/message/close events, send operations)
//! ```
//!
//! # Design Decisions
//! - The channel never errors on liveness: operations against an absent or
//!   closed transport are silent no-ops
//! - "open" fires at most once, always before "message"/"close"; "close"
//!   fires at most once regardless of which side disconnects

pub mod bridge;
pub mod channel;

pub use bridge::ConnectCallback;
pub use channel::{ChannelEvent, ChannelState, EventKind, SocketChannel};

//! Embeddable multi-context HTTP server runtime.
//!
//! Multiplexes virtual-host/path contexts over a shared listener set. Each
//! context carries its own session/cookie policy and is bound to exactly
//! one of: a request-handling application, a static file tree, a raw
//! sub-path handler, or a WebSocket upgrade endpoint whose lifecycle is
//! exposed as an open/message/close event stream.

pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod socket;

pub use config::{load_config, ConfigError, ServerConfig};
pub use context::{app_fn, raw_fn, Context, ContextError, ContextOptions, ContextRegistry};
pub use http::{HostServer, ServerError};
pub use lifecycle::{Daemon, LifecycleHooks, Shutdown};
pub use socket::{ChannelEvent, ChannelState, EventKind, SocketChannel};

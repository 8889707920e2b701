//! Context subsystem: the routable units requests dispatch to.
//!
//! # Data Flow
//! ```text
//! get_or_create(path, virtual_hosts, options)
//!     → registry.rs (atomic insert-if-absent, keyed lookup)
//!     → context.rs (one binding, session/cookie policy, lifecycle)
//!     → binding.rs (application | static | raw | socket upgrade)
//! ```

pub mod binding;
#[allow(clippy::module_inception)]
pub mod context;
pub mod registry;

pub use binding::{app_fn, raw_fn, AppHandler, RawHandler};
pub use context::{Context, ContextError, ContextOptions, ContextState, CookiePolicy};
pub use registry::ContextRegistry;

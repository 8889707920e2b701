//! Observability subsystem.
//!
//! Structured logging only; every subsystem logs through `tracing` with
//! field-structured events.

pub mod logging;

pub use logging::init_logging;

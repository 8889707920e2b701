//! Request matching primitives.
//!
//! # Design Decisions
//! - Matchers are small value types used by the context registry's lookup;
//!   the registry itself owns route selection (longest prefix, host-bound
//!   contexts preferred)

pub mod matcher;

pub use matcher::{host_without_port, HostMatcher, PathPrefixMatcher};

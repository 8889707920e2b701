//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check mountpoints are well-formed paths
//! - Check static directories exist
//! - Detect duplicate mounts for the same (mountpoint, virtual hosts) key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before any listener socket opens

use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A mountpoint does not start with '/'.
    InvalidMountpoint(String),
    /// A configured static directory does not exist.
    MissingStaticDir(String),
    /// Two mounts share the same (mountpoint, virtual hosts) key.
    DuplicateMount(String),
    /// The session cookie name is empty.
    EmptyCookieName,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidMountpoint(m) => {
                write!(f, "mountpoint '{}' must start with '/'", m)
            }
            ValidationError::MissingStaticDir(d) => {
                write!(f, "static directory '{}' does not exist", d)
            }
            ValidationError::DuplicateMount(k) => {
                write!(f, "duplicate mount for key '{}'", k)
            }
            ValidationError::EmptyCookieName => write!(f, "session cookie name is empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen_keys: HashSet<String> = HashSet::new();

    if config.sessions.cookie_name.is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    let mut check_mount = |mountpoint: &str, virtual_hosts: &[String]| {
        if !mountpoint.starts_with('/') {
            errors.push(ValidationError::InvalidMountpoint(mountpoint.to_string()));
        }
        let key = if virtual_hosts.is_empty() {
            mountpoint.to_string()
        } else {
            format!("{}{}", virtual_hosts.join(","), mountpoint)
        };
        if !seen_keys.insert(key.clone()) {
            errors.push(ValidationError::DuplicateMount(key));
        }
    };

    for mount in &config.apps {
        check_mount(&mount.mountpoint, &mount.virtual_hosts);
    }
    for mount in &config.statics {
        check_mount(&mount.mountpoint, &mount.virtual_hosts);
    }

    for mount in &config.statics {
        if !Path::new(&mount.dir).is_dir() {
            errors.push(ValidationError::MissingStaticDir(mount.dir.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Context registry: lazy keyed map from (path, virtual hosts) to contexts.
//!
//! # Responsibilities
//! - Atomic get-or-create keyed by the composite string key
//! - Start newly created contexts when the server is already running
//! - Host-aware longest-prefix lookup for request dispatch
//! - Discard all contexts on server stop
//!
//! # Design Decisions
//! - Insert-if-absent runs through the DashMap entry API as one atomic
//!   operation; concurrent first-access races yield a single context
//! - Repeat registrations return the existing context; their options are
//!   ignored (first registration wins)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::SessionConfig;
use crate::context::context::{Context, ContextOptions};

/// Composite registry key. With virtual hosts present the key is the
/// stringified host list concatenated with the path; otherwise the path
/// alone. An empty host list collapses to the path-only key.
pub(crate) fn context_key(path: &str, virtual_hosts: &[String]) -> String {
    if virtual_hosts.is_empty() {
        path.to_string()
    } else {
        format!("{}{}", virtual_hosts.join(","), path)
    }
}

/// Keyed map of live contexts, owned by the server.
pub struct ContextRegistry {
    contexts: DashMap<String, Arc<Context>>,
    defaults: SessionConfig,
    running: Arc<AtomicBool>,
}

impl ContextRegistry {
    pub(crate) fn new(defaults: SessionConfig, running: Arc<AtomicBool>) -> Self {
        Self {
            contexts: DashMap::new(),
            defaults,
            running,
        }
    }

    /// Return the context for (path, virtual hosts), creating and (if the
    /// server is already accepting) starting it on first lookup.
    pub fn get_or_create(
        &self,
        path: &str,
        virtual_hosts: &[String],
        options: ContextOptions,
    ) -> Arc<Context> {
        let key = context_key(path, virtual_hosts);
        self.contexts
            .entry(key)
            .or_insert_with(|| {
                let context = Arc::new(Context::new(path, virtual_hosts, options, &self.defaults));
                if self.running.load(Ordering::SeqCst) {
                    context.start();
                }
                tracing::debug!(path, virtual_hosts = ?virtual_hosts, "Context created");
                context
            })
            .clone()
    }

    /// Find the context routing (host, path): longest matching prefix,
    /// host-bound contexts preferred over host-less ones.
    pub fn match_request(&self, host: &str, path: &str) -> Option<Arc<Context>> {
        let mut best: Option<Arc<Context>> = None;
        let mut best_score = (false, 0usize);
        for entry in self.contexts.iter() {
            let context = entry.value();
            if context.matches(host, path) {
                let score = context.specificity();
                if best.is_none() || score > best_score {
                    best_score = score;
                    best = Some(context.clone());
                }
            }
        }
        best
    }

    /// Start every registered context. Called on server start.
    pub(crate) fn start_all(&self) {
        for entry in self.contexts.iter() {
            entry.value().start();
        }
    }

    /// Stop every context and clear the registry. A restarted server
    /// rebuilds contexts from scratch on next lookup.
    pub(crate) fn stop_and_clear(&self) {
        for entry in self.contexts.iter() {
            entry.value().stop();
        }
        self.contexts.clear();
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::context::ContextState;

    fn registry(running: bool) -> ContextRegistry {
        ContextRegistry::new(
            SessionConfig::default(),
            Arc::new(AtomicBool::new(running)),
        )
    }

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn registration_is_idempotent() {
        let registry = registry(false);
        let first = registry.get_or_create("/app", &[], ContextOptions::default());
        let second = registry.get_or_create(
            "/app",
            &[],
            ContextOptions {
                sessions: Some(true),
                cookie_name: Some("other".into()),
                ..Default::default()
            },
        );
        assert!(Arc::ptr_eq(&first, &second));
        // Options on the repeat call have no observable effect.
        assert!(!second.sessions_enabled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_hosts_distinct_contexts() {
        let registry = registry(false);
        let a = registry.get_or_create("/a", &hosts(&["host1"]), ContextOptions::default());
        let b = registry.get_or_create("/a", &hosts(&["host2"]), ContextOptions::default());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn absent_and_empty_hosts_collapse() {
        let registry = registry(false);
        let absent = registry.get_or_create("/a", &[], ContextOptions::default());
        let empty = registry.get_or_create("/a", &hosts(&[""]), ContextOptions::default());
        assert!(Arc::ptr_eq(&absent, &empty));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn context_started_when_server_running() {
        let running = registry(true);
        let ctx = running.get_or_create("/a", &[], ContextOptions::default());
        assert_eq!(ctx.state(), ContextState::Started);

        let idle = registry(false);
        let ctx = idle.get_or_create("/a", &[], ContextOptions::default());
        assert_eq!(ctx.state(), ContextState::Created);
    }

    #[test]
    fn longest_prefix_wins() {
        let registry = registry(false);
        let root = registry.get_or_create("/", &[], ContextOptions::default());
        let app = registry.get_or_create("/app", &[], ContextOptions::default());

        let hit = registry.match_request("any.host", "/app/page").unwrap();
        assert!(Arc::ptr_eq(&hit, &app));
        let hit = registry.match_request("any.host", "/other").unwrap();
        assert!(Arc::ptr_eq(&hit, &root));
    }

    #[test]
    fn host_bound_context_preferred() {
        let registry = registry(false);
        let any_host = registry.get_or_create("/app", &[], ContextOptions::default());
        let one_host =
            registry.get_or_create("/app", &hosts(&["example.com"]), ContextOptions::default());

        let hit = registry.match_request("example.com", "/app").unwrap();
        assert!(Arc::ptr_eq(&hit, &one_host));
        let hit = registry.match_request("other.com", "/app").unwrap();
        assert!(Arc::ptr_eq(&hit, &any_host));
    }

    #[test]
    fn no_match_for_unrouted_path() {
        let registry = registry(false);
        registry.get_or_create("/app", &[], ContextOptions::default());
        assert!(registry.match_request("example.com", "/elsewhere").is_none());
    }

    #[test]
    fn stop_and_clear_discards_contexts() {
        let registry = registry(true);
        let ctx = registry.get_or_create("/app", &[], ContextOptions::default());
        registry.stop_and_clear();
        assert_eq!(ctx.state(), ContextState::Stopped);
        assert!(registry.is_empty());

        // Next lookup is a fresh context.
        let fresh = registry.get_or_create("/app", &[], ContextOptions::default());
        assert!(!Arc::ptr_eq(&ctx, &fresh));
    }

    #[test]
    fn concurrent_first_access_yields_one_context() {
        let registry = Arc::new(registry(false));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                registry.get_or_create("/raced", &[], ContextOptions::default())
            }));
        }
        let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for ctx in &contexts[1..] {
            assert!(Arc::ptr_eq(&contexts[0], ctx));
        }
        assert_eq!(registry.len(), 1);
    }
}

//! A routable context: one path prefix (+ optional virtual hosts) bound to
//! exactly one handler, with its own session/cookie policy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use thiserror::Error;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::SessionConfig;
use crate::context::binding::{AppHandler, Binding, RawHandler};
use crate::routing::{HostMatcher, PathPrefixMatcher};
use crate::socket::bridge;
use crate::socket::SocketChannel;

/// Errors from context binding operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The context already has a handler; a context binds exactly once.
    #[error("context '{0}' already has a {1} handler bound")]
    AlreadyBound(String, &'static str),
}

/// Per-context options supplied at registration. Unset fields fall back to
/// the server-wide session defaults. Options on a repeat registration of the
/// same key are ignored; the first registration wins.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Enable sessions; absent means "use the server default".
    pub sessions: Option<bool>,
    /// Enable security handling for this context.
    pub security: bool,
    pub cookie_name: Option<String>,
    pub cookie_domain: Option<String>,
    pub cookie_path: Option<String>,
    pub http_only_cookies: bool,
    pub secure_cookies: bool,
}

/// Resolved cookie attributes for a context's session cookie.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub name: String,
    pub domain: Option<String>,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
}

impl CookiePolicy {
    /// Render a `Set-Cookie` header value for a session id.
    pub fn header_value(&self, session_id: &str) -> String {
        let mut value = format!("{}={}; Path={}", self.name, session_id, self.path);
        if let Some(domain) = &self.domain {
            value.push_str("; Domain=");
            value.push_str(domain);
        }
        if self.http_only {
            value.push_str("; HttpOnly");
        }
        if self.secure {
            value.push_str("; Secure");
        }
        value
    }
}

/// Context lifecycle: created on first lookup, started with the server (or
/// immediately if it is already running), stopped and discarded on server
/// stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Created,
    Started,
    Stopped,
}

/// A routable unit binding a path prefix and optional virtual-host set to
/// one handler.
pub struct Context {
    path: String,
    virtual_hosts: Vec<String>,
    host_matchers: Vec<HostMatcher>,
    path_matcher: PathPrefixMatcher,
    sessions_enabled: bool,
    security_enabled: bool,
    cookie_policy: CookiePolicy,
    binding: OnceLock<Binding>,
    state: Mutex<ContextState>,
}

impl Context {
    pub(crate) fn new(
        path: &str,
        virtual_hosts: &[String],
        options: ContextOptions,
        defaults: &SessionConfig,
    ) -> Self {
        let host_matchers = virtual_hosts
            .iter()
            .filter(|host| !host.is_empty())
            .map(HostMatcher::new)
            .collect();
        let cookie_policy = CookiePolicy {
            name: options.cookie_name.unwrap_or_else(|| defaults.cookie_name.clone()),
            domain: options.cookie_domain.or_else(|| defaults.cookie_domain.clone()),
            path: options.cookie_path.unwrap_or_else(|| defaults.cookie_path.clone()),
            http_only: options.http_only_cookies || defaults.http_only_cookies,
            secure: options.secure_cookies || defaults.secure_cookies,
        };
        Self {
            path: path.to_string(),
            virtual_hosts: virtual_hosts.to_vec(),
            host_matchers,
            path_matcher: PathPrefixMatcher::new(path),
            sessions_enabled: options.sessions.unwrap_or(defaults.enabled),
            security_enabled: options.security,
            cookie_policy,
            binding: OnceLock::new(),
            state: Mutex::new(ContextState::Created),
        }
    }

    /// The path prefix this context is mounted at.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The virtual hosts this context is restricted to (empty = all).
    pub fn virtual_hosts(&self) -> &[String] {
        &self.virtual_hosts
    }

    pub fn sessions_enabled(&self) -> bool {
        self.sessions_enabled
    }

    pub fn security_enabled(&self) -> bool {
        self.security_enabled
    }

    pub fn cookie_policy(&self) -> &CookiePolicy {
        &self.cookie_policy
    }

    /// Bind a request-handling application as the catch-all for every path
    /// under this context's prefix.
    pub fn serve_application(&self, handler: AppHandler) -> Result<(), ContextError> {
        self.bind(Binding::Application(handler))
    }

    /// Bind a static file root; paths under the prefix resolve to files
    /// under `dir`.
    pub fn serve_static(&self, dir: impl AsRef<Path>) -> Result<(), ContextError> {
        self.bind(Binding::Static(ServeDir::new(dir)))
    }

    /// Bind a raw handler at a sub-path beneath the prefix. The init
    /// parameters are passed through to the handler unmodified.
    pub fn add_handler(
        &self,
        sub_path: &str,
        handler: RawHandler,
        init_params: HashMap<String, String>,
    ) -> Result<(), ContextError> {
        self.bind(Binding::Raw {
            sub_path: sub_path.to_string(),
            handler,
            init_params: Arc::new(init_params),
        })
    }

    /// Install an upgrade handler at a sub-path beneath the prefix. For
    /// each handshake the callback runs synchronously, before the handshake
    /// completes, with a fresh channel; it should register its event
    /// listeners before returning.
    pub fn add_socket_upgrade(
        &self,
        sub_path: &str,
        on_connect: impl Fn(Arc<SocketChannel>, &Parts, Option<&str>) + Send + Sync + 'static,
    ) -> Result<(), ContextError> {
        self.bind(Binding::SocketUpgrade {
            sub_path: sub_path.to_string(),
            on_connect: Arc::new(on_connect),
        })
    }

    /// Whether a binding operation has run.
    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    fn bind(&self, binding: Binding) -> Result<(), ContextError> {
        let kind = binding.kind();
        self.binding.set(binding).map_err(|_| {
            let bound = self.binding.get().map(Binding::kind).unwrap_or(kind);
            ContextError::AlreadyBound(self.path.clone(), bound)
        })?;
        tracing::debug!(path = %self.path, kind, "Context handler bound");
        Ok(())
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock().expect("context state lock poisoned")
    }

    pub(crate) fn start(&self) {
        let mut state = self.state.lock().expect("context state lock poisoned");
        if *state == ContextState::Created {
            *state = ContextState::Started;
            tracing::debug!(path = %self.path, "Context started");
        }
    }

    pub(crate) fn stop(&self) {
        let mut state = self.state.lock().expect("context state lock poisoned");
        if *state == ContextState::Started {
            *state = ContextState::Stopped;
            tracing::debug!(path = %self.path, "Context stopped");
        }
    }

    /// Whether this context routes a request for (host, path).
    pub(crate) fn matches(&self, host: &str, path: &str) -> bool {
        if !self.path_matcher.matches(path) {
            return false;
        }
        self.host_matchers.is_empty() || self.host_matchers.iter().any(|m| m.matches(host))
    }

    /// Host-bound contexts beat host-less ones; longer prefixes beat
    /// shorter ones.
    pub(crate) fn specificity(&self) -> (bool, usize) {
        (!self.host_matchers.is_empty(), self.path_matcher.len())
    }

    /// Dispatch one request to the bound handler.
    pub(crate) async fn handle(&self, request: Request<Body>) -> Response {
        match self.binding.get() {
            None => (StatusCode::NOT_FOUND, "No handler bound for context").into_response(),
            Some(Binding::Application(handler)) => handler(request).await,
            Some(Binding::Static(serve_dir)) => {
                let request = strip_prefix(request, &self.path);
                match serve_dir.clone().oneshot(request).await {
                    Ok(response) => response.map(Body::new),
                    Err(infallible) => match infallible {},
                }
            }
            Some(Binding::Raw {
                sub_path,
                handler,
                init_params,
            }) => {
                if self.sub_path_matches(sub_path, request.uri().path()) {
                    handler(request, init_params.clone()).await
                } else {
                    (StatusCode::NOT_FOUND, "No handler at this path").into_response()
                }
            }
            Some(Binding::SocketUpgrade { sub_path, on_connect }) => {
                if self.sub_path_matches(sub_path, request.uri().path()) {
                    bridge::handle_upgrade(on_connect.clone(), request).await
                } else {
                    (StatusCode::NOT_FOUND, "No upgrade endpoint at this path").into_response()
                }
            }
        }
    }

    fn sub_path_matches(&self, sub_path: &str, full_path: &str) -> bool {
        let relative = relative_path(&self.path, full_path);
        if sub_path.is_empty() || sub_path == "/" {
            return true;
        }
        PathPrefixMatcher::new(sub_path).matches(relative)
    }
}

/// The request path with the context prefix removed, at least "/".
fn relative_path<'a>(prefix: &str, full_path: &'a str) -> &'a str {
    if prefix == "/" {
        return full_path;
    }
    match full_path.strip_prefix(prefix) {
        Some("") | None => "/",
        Some(rest) => rest,
    }
}

/// Rewrite the request URI with the context prefix removed, preserving any
/// query string. Static trees resolve paths relative to their mount.
fn strip_prefix(request: Request<Body>, prefix: &str) -> Request<Body> {
    if prefix == "/" {
        return request;
    }
    let (mut parts, body) = request.into_parts();
    let rest = relative_path(prefix, parts.uri.path()).to_string();
    let rewritten = match parts.uri.query() {
        Some(query) => format!("{}?{}", rest, query),
        None => rest,
    };
    if let Ok(uri) = rewritten.parse::<Uri>() {
        parts.uri = uri;
    }
    Request::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::binding::app_fn;

    fn context(path: &str, hosts: &[&str]) -> Context {
        let hosts: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
        Context::new(path, &hosts, ContextOptions::default(), &SessionConfig::default())
    }

    fn noop_app() -> AppHandler {
        app_fn(|_req| async { StatusCode::OK.into_response() })
    }

    #[test]
    fn second_bind_is_rejected() {
        let ctx = context("/app", &[]);
        ctx.serve_application(noop_app()).unwrap();
        let err = ctx.serve_static("/tmp").unwrap_err();
        assert!(matches!(err, ContextError::AlreadyBound(_, "application")));
        assert!(ctx.is_bound());
    }

    #[test]
    fn lifecycle_transitions_are_one_way() {
        let ctx = context("/app", &[]);
        assert_eq!(ctx.state(), ContextState::Created);
        ctx.start();
        ctx.start();
        assert_eq!(ctx.state(), ContextState::Started);
        ctx.stop();
        assert_eq!(ctx.state(), ContextState::Stopped);
        // A stopped context is never restarted.
        ctx.start();
        assert_eq!(ctx.state(), ContextState::Stopped);
    }

    #[test]
    fn matches_host_and_path() {
        let ctx = context("/app", &["example.com", "*.example.com"]);
        assert!(ctx.matches("example.com", "/app/page"));
        assert!(ctx.matches("api.example.com", "/app"));
        assert!(!ctx.matches("other.com", "/app"));
        assert!(!ctx.matches("example.com", "/other"));
    }

    #[test]
    fn hostless_context_matches_any_host() {
        let ctx = context("/app", &[]);
        assert!(ctx.matches("anything.example", "/app"));
        assert_eq!(ctx.specificity(), (false, 4));
    }

    #[test]
    fn cookie_policy_header_rendering() {
        let options = ContextOptions {
            cookie_name: Some("sid".into()),
            cookie_domain: Some("example.com".into()),
            http_only_cookies: true,
            secure_cookies: true,
            ..Default::default()
        };
        let ctx = Context::new("/", &[], options, &SessionConfig::default());
        let header = ctx.cookie_policy().header_value("abc123");
        assert_eq!(header, "sid=abc123; Path=/; Domain=example.com; HttpOnly; Secure");
    }

    #[test]
    fn session_flag_falls_back_to_server_default() {
        let mut defaults = SessionConfig::default();
        defaults.enabled = true;
        let inherit = Context::new("/", &[], ContextOptions::default(), &defaults);
        assert!(inherit.sessions_enabled());

        let opt_out = Context::new(
            "/",
            &[],
            ContextOptions {
                sessions: Some(false),
                ..Default::default()
            },
            &defaults,
        );
        assert!(!opt_out.sessions_enabled());
    }

    #[test]
    fn relative_path_strips_mount() {
        assert_eq!(relative_path("/app", "/app/page"), "/page");
        assert_eq!(relative_path("/app", "/app"), "/");
        assert_eq!(relative_path("/", "/page"), "/page");
    }

    #[tokio::test]
    async fn unbound_context_returns_not_found() {
        let ctx = context("/app", &[]);
        let request = Request::builder()
            .uri("/app")
            .body(Body::empty())
            .unwrap();
        let response = ctx.handle(request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn raw_handler_receives_init_params() {
        let ctx = context("/api", &[]);
        let mut params = HashMap::new();
        params.insert("greeting".to_string(), "hello".to_string());
        ctx.add_handler(
            "/v1",
            crate::context::binding::raw_fn(|_req, params: Arc<HashMap<String, String>>| async move {
                params.get("greeting").cloned().unwrap_or_default().into_response()
            }),
            params,
        )
        .unwrap();

        let request = Request::builder()
            .uri("/api/v1/thing")
            .body(Body::empty())
            .unwrap();
        let response = ctx.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let miss = Request::builder()
            .uri("/api/other")
            .body(Body::empty())
            .unwrap();
        let response = ctx.handle(miss).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

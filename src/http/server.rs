//! Server lifecycle and request dispatch.
//!
//! # Responsibilities
//! - Two-phase lifecycle: bind connectors at construction, accept on start
//! - Build the catch-all Axum router and dispatch requests to contexts
//! - Apply configured application/static mounts at start
//! - Append session cookies per context policy
//! - Graceful stop with a drain deadline; destroy releases everything
//!
//! # Data Flow
//! ```text
//! inbound request → dispatch handler → registry lookup (host + path)
//!     → context.handle (application | static | raw | upgrade)
//!     → session cookie appended when the context policy asks for one
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use dashmap::DashMap;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::validation::validate_config;
use crate::config::ServerConfig;
use crate::context::{AppHandler, Context, ContextOptions, ContextRegistry};
use crate::lifecycle::Shutdown;
use crate::net::{Connector, ListenerError};
use crate::routing::host_without_port;

/// Errors surfaced by server construction and lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Semantic configuration problems, all of them.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A listener could not bind or re-bind.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// A configured mount names an application nobody registered.
    #[error("unknown application '{0}'")]
    UnknownApplication(String),

    /// The server was destroyed; no further transitions are legal.
    #[error("server has been destroyed")]
    Destroyed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The embeddable server: a shared listener set multiplexing contexts.
///
/// Construction (`bind`) eagerly opens the configured listener sockets so
/// privileged-port binding can happen under elevated privilege before a
/// later `start()` runs under a dropped-privilege user.
pub struct HostServer {
    config: ServerConfig,
    registry: Arc<ContextRegistry>,
    connectors: Vec<Connector>,
    running: Arc<AtomicBool>,
    destroyed: AtomicBool,
    shutdown: Shutdown,
    serve_tasks: Mutex<Vec<JoinHandle<()>>>,
    apps: DashMap<String, AppHandler>,
}

impl std::fmt::Debug for HostServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServer")
            .field("config", &self.config)
            .field("running", &self.running)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl HostServer {
    /// Validate the configuration and bind every configured listener.
    /// Fatal on any problem; no partial server is left running.
    pub fn bind(config: ServerConfig) -> Result<Arc<Self>, ServerError> {
        validate_config(&config).map_err(|errors| {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            tracing::error!(errors = %joined, "Configuration rejected");
            ServerError::Validation(joined)
        })?;

        let connectors = config
            .effective_listeners()
            .iter()
            .map(Connector::open)
            .collect::<Result<Vec<_>, _>>()?;

        let running = Arc::new(AtomicBool::new(false));
        let registry = Arc::new(ContextRegistry::new(config.sessions.clone(), running.clone()));

        Ok(Arc::new(Self {
            config,
            registry,
            connectors,
            running,
            destroyed: AtomicBool::new(false),
            shutdown: Shutdown::new(),
            serve_tasks: Mutex::new(Vec::new()),
            apps: DashMap::new(),
        }))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Addresses the connectors are bound to. With a port of 0 this is
    /// where the OS-assigned port shows up.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.connectors.iter().map(Connector::local_addr).collect()
    }

    /// Register a named application for config-driven mounts. Must happen
    /// before `start()` for mounts that reference the name.
    pub fn register_application(&self, name: impl Into<String>, handler: AppHandler) {
        self.apps.insert(name.into(), handler);
    }

    /// Get or create the context for (path, virtual hosts). Contexts
    /// created while the server is running start immediately.
    pub fn get_context(
        &self,
        path: &str,
        virtual_hosts: &[String],
        options: ContextOptions,
    ) -> Arc<Context> {
        self.registry.get_or_create(path, virtual_hosts, options)
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin accepting connections. Idempotent: a second call while running
    /// is a no-op. Fails after `destroy()`.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mut tasks = self.serve_tasks.lock().await;
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(ServerError::Destroyed);
        }
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.apply_mounts()?;

        let state = DispatchState {
            registry: self.registry.clone(),
        };
        let router = Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        for connector in &self.connectors {
            let listener = match connector
                .take()
                .map_err(ServerError::from)
                .and_then(|socket| TcpListener::from_std(socket).map_err(ServerError::from))
            {
                Ok(listener) => listener,
                Err(e) => {
                    // A failed start leaves no partial server running:
                    // listeners that already came up are closed before the
                    // error surfaces.
                    self.shutdown.trigger();
                    self.drain_tasks(&mut tasks).await;
                    tracing::error!(
                        address = %connector.local_addr(),
                        error = %e,
                        "Start failed, closed partial listener set"
                    );
                    return Err(e);
                }
            };
            let addr = connector.local_addr();
            let service = router.clone().into_make_service();
            let mut shutdown_rx = self.shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                tracing::info!(address = %addr, "Listener accepting");
                let result = axum::serve(listener, service)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(address = %addr, error = %e, "Serve loop failed");
                }
            }));
        }

        self.running.store(true, Ordering::SeqCst);
        self.registry.start_all();
        tracing::info!(listeners = self.connectors.len(), "Server started");
        Ok(())
    }

    /// Stop accepting, drain in-flight connections up to the configured
    /// deadline, then discard all contexts. Idempotent.
    pub async fn stop(&self) {
        let mut tasks = self.serve_tasks.lock().await;
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        tracing::debug!(tasks = self.shutdown.receiver_count(), "Signalling serve tasks");
        self.shutdown.trigger();
        self.drain_tasks(&mut tasks).await;

        self.registry.stop_and_clear();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Server stopped");
    }

    /// Release the listener sockets permanently. No further `start()` is
    /// legal. Idempotent.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop().await;
        for connector in &self.connectors {
            connector.release();
        }
        tracing::info!("Server destroyed");
    }

    /// Wait for every serve task up to the stop deadline, aborting stragglers.
    async fn drain_tasks(&self, tasks: &mut Vec<JoinHandle<()>>) {
        let deadline = Duration::from_secs(self.config.timeouts.stop_secs);
        for task in tasks.drain(..) {
            let mut task = task;
            if tokio::time::timeout(deadline, &mut task).await.is_err() {
                task.abort();
                tracing::warn!("Serve task aborted after stop deadline");
            }
        }
    }

    /// Create and bind contexts for the configured mounts. Runs on every
    /// start; the registry is empty after a stop, so a restarted server
    /// rebuilds them here.
    fn apply_mounts(&self) -> Result<(), ServerError> {
        for mount in &self.config.apps {
            let handler = self
                .apps
                .get(&mount.app)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| ServerError::UnknownApplication(mount.app.clone()))?;
            let context =
                self.registry
                    .get_or_create(&mount.mountpoint, &mount.virtual_hosts, ContextOptions::default());
            if !context.is_bound() {
                if let Err(e) = context.serve_application(handler) {
                    tracing::warn!(mountpoint = %mount.mountpoint, error = %e, "App mount skipped");
                }
            }
        }
        for mount in &self.config.statics {
            let context =
                self.registry
                    .get_or_create(&mount.mountpoint, &mount.virtual_hosts, ContextOptions::default());
            if !context.is_bound() {
                if let Err(e) = context.serve_static(&mount.dir) {
                    tracing::warn!(mountpoint = %mount.mountpoint, error = %e, "Static mount skipped");
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
struct DispatchState {
    registry: Arc<ContextRegistry>,
}

/// Catch-all handler: look up the context for (host, path) and dispatch.
async fn dispatch(State(state): State<DispatchState>, request: Request<Body>) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(host_without_port)
        .unwrap_or("")
        .to_string();
    let path = request.uri().path().to_string();

    let Some(context) = state.registry.match_request(&host, &path) else {
        tracing::debug!(host = %host, path = %path, "No context matched");
        return (StatusCode::NOT_FOUND, "No context matched").into_response();
    };

    let wants_session = context.sessions_enabled()
        && !has_cookie(request.headers(), &context.cookie_policy().name);

    let mut response = context.handle(request).await;

    // Upgrade responses carry no cookies; the handshake already left.
    if wants_session && response.status() != StatusCode::SWITCHING_PROTOCOLS {
        let session_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&context.cookie_policy().header_value(&session_id)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// True if any Cookie header carries a cookie with the given name.
fn has_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .any(|pair| pair.trim().split('=').next() == Some(name))
}

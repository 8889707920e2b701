//! Handler bindings for contexts.
//!
//! Exactly one binding per context; the four kinds mirror what a context
//! can route to: an application, a static tree, a raw sub-path handler, or
//! a socket-upgrade endpoint.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower_http::services::ServeDir;

use crate::socket::ConnectCallback;

/// A request-handling application: one request value in, one response out.
pub type AppHandler = Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

/// A raw handler bound beneath a context prefix; receives its init
/// parameters unmodified on every call.
pub type RawHandler =
    Arc<dyn Fn(Request<Body>, Arc<HashMap<String, String>>) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wrap an async closure as an [`AppHandler`].
pub fn app_fn<F, Fut>(f: F) -> AppHandler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

/// Wrap an async closure as a [`RawHandler`].
pub fn raw_fn<F, Fut>(f: F) -> RawHandler
where
    F: Fn(Request<Body>, Arc<HashMap<String, String>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |request, params| Box::pin(f(request, params)))
}

/// The handler a context dispatches to.
pub(crate) enum Binding {
    /// Catch-all application for everything under the context prefix.
    Application(AppHandler),
    /// Static file tree; paths under the prefix resolve to files.
    Static(ServeDir),
    /// Raw handler at a sub-path beneath the prefix.
    Raw {
        sub_path: String,
        handler: RawHandler,
        init_params: Arc<HashMap<String, String>>,
    },
    /// Upgrade endpoint at a sub-path beneath the prefix.
    SocketUpgrade {
        sub_path: String,
        on_connect: ConnectCallback,
    },
}

impl Binding {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Binding::Application(_) => "application",
            Binding::Static(_) => "static",
            Binding::Raw { .. } => "raw",
            Binding::SocketUpgrade { .. } => "socket",
        }
    }
}

//! WebSocket upgrade handling.
//!
//! # Responsibilities
//! - Detect and accept upgrade handshakes via axum's extractor
//! - Construct the channel and run the connect callback before the
//!   handshake response goes out
//! - Pump frames between the live socket and the channel's event surface
//!
//! # Data Flow
//! ```text
//! upgrade request → connect callback (listeners registered here)
//!     → handshake response → attach transport, fire "open"
//!     → select { outbound queue → socket, socket → "message" }
//!     → disconnect (either side) → fire "close" once
//! ```
//!
//! # Design Decisions
//! - Fragment reassembly and ping/pong stay inside tungstenite
//! - Close frames propagate in both directions
//! - A locally requested close leaves through the outbound queue, so the
//!   "close" event still arrives via the normal path

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::socket::channel::{SocketChannel, Transport};

/// Callback invoked synchronously for each upgrade handshake, before the
/// handshake completes. Receives the fresh channel, the request head, and
/// the requested sub-protocol; expected to register its event listeners
/// before returning.
pub type ConnectCallback = Arc<dyn Fn(Arc<SocketChannel>, &Parts, Option<&str>) + Send + Sync>;

/// Accept one upgrade handshake and hand the connection to the pump task.
pub(crate) async fn handle_upgrade(on_connect: ConnectCallback, request: Request<Body>) -> Response {
    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected upgrade handshake");
            return rejection.into_response();
        }
    };

    let protocol = parts
        .headers
        .get("sec-websocket-protocol")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let channel = SocketChannel::new();
    // Listener registration happens here, while the reference is still
    // unset; the "open" event only fires once the transport attaches.
    on_connect(channel.clone(), &parts, protocol.as_deref());

    upgrade.on_upgrade(move |socket| drive(channel, socket))
}

/// Pump one upgraded connection until either side disconnects.
async fn drive(channel: Arc<SocketChannel>, socket: WebSocket) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(Transport::new(outbound_tx));
    channel.attach(transport.clone());
    channel.fire_open();

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    let closing = matches!(frame, Message::Close(_));
                    if sink.send(frame).await.is_err() || closing {
                        break;
                    }
                }
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => channel.fire_message(text.as_str()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Ping/pong are answered by the protocol stack; inbound
                // binary frames are not part of the event surface.
                Some(Ok(_)) => {}
            },
        }
    }

    transport.mark_closed();
    channel.fire_close();
    tracing::debug!("Upgraded connection closed");
}

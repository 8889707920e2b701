//! The upgraded-connection channel.
//!
//! # Responsibilities
//! - Expose open/message/close events over one upgraded connection
//! - Bridge transport callbacks into listeners fired in registration order
//! - Make send/close/is_open safe against a not-yet-open or gone transport
//!
//! # Design Decisions
//! - No inheritance: the channel owns a listener table per event name
//! - Transport reference is a nullable field published once via ArcSwap;
//!   every public operation switches on the derived tri-state instead of
//!   erroring on null
//! - Sends against an unattached or closed transport are silent no-ops, so
//!   callers can broadcast to channel lists of mixed liveness and rely on
//!   the "close" event, not send failures, to drive removal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::mpsc;

/// The three event names a channel emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Open,
    Message,
    Close,
}

/// Payload handed to listeners.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Handshake accepted; the transport reference is now live.
    Open,
    /// One complete inbound text frame (reassembly happens in the
    /// transport layer).
    Message(String),
    /// Transport disconnected, from either peer or a local `close()`.
    Close,
}

/// Derived liveness of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Constructed, "open" not yet fired; transport reference unset.
    Unattached,
    /// Transport attached and live.
    Open,
    /// Transport reported disconnect.
    Closed,
}

type Listener = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Live handle to the underlying connection, valid between "open" and
/// "close". Outbound frames go through an unbounded queue drained by the
/// bridge task, which keeps `send` synchronous and non-blocking.
pub(crate) struct Transport {
    outbound: mpsc::UnboundedSender<Message>,
    open: AtomicBool,
}

impl Transport {
    pub(crate) fn new(outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            outbound,
            open: AtomicBool::new(true),
        }
    }

    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// One upgraded bidirectional connection, exposed as an event emitter with
/// best-effort send operations.
pub struct SocketChannel {
    open_listeners: Mutex<Vec<Listener>>,
    message_listeners: Mutex<Vec<Listener>>,
    close_listeners: Mutex<Vec<Listener>>,
    transport: ArcSwapOption<Transport>,
    open_fired: AtomicBool,
    close_fired: AtomicBool,
}

impl SocketChannel {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            open_listeners: Mutex::new(Vec::new()),
            message_listeners: Mutex::new(Vec::new()),
            close_listeners: Mutex::new(Vec::new()),
            transport: ArcSwapOption::const_empty(),
            open_fired: AtomicBool::new(false),
            close_fired: AtomicBool::new(false),
        })
    }

    /// Register a listener for one event name. Listeners fire in
    /// registration order. Register before the handshake completes (inside
    /// the connect callback) or the "open" event may be missed.
    pub fn add_listener(&self, kind: EventKind, listener: impl Fn(&ChannelEvent) + Send + Sync + 'static) {
        self.table(kind)
            .lock()
            .expect("listener table lock poisoned")
            .push(Arc::new(listener));
    }

    /// Convenience: listen for "open".
    pub fn on_open(&self, f: impl Fn() + Send + Sync + 'static) {
        self.add_listener(EventKind::Open, move |_| f());
    }

    /// Convenience: listen for inbound text messages.
    pub fn on_message(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.add_listener(EventKind::Message, move |event| {
            if let ChannelEvent::Message(text) = event {
                f(text);
            }
        });
    }

    /// Convenience: listen for "close".
    pub fn on_close(&self, f: impl Fn() + Send + Sync + 'static) {
        self.add_listener(EventKind::Close, move |_| f());
    }

    /// Send a text frame. Silent no-op unless the channel is open.
    pub fn send(&self, message: &str) {
        if let Some(transport) = self.live_transport() {
            let _ = transport.outbound.send(Message::Text(message.to_owned().into()));
        }
    }

    /// Send a binary frame from `bytes[offset..offset + length]`.
    ///
    /// `offset` defaults to 0 and `length` to the remaining buffer; both are
    /// clamped to the buffer bounds. Silent no-op unless the channel is open.
    pub fn send_binary(&self, bytes: &[u8], offset: Option<usize>, length: Option<usize>) {
        let Some(transport) = self.live_transport() else {
            return;
        };
        let start = offset.unwrap_or(0).min(bytes.len());
        let remaining = bytes.len() - start;
        let len = length.unwrap_or(remaining).min(remaining);
        let _ = transport
            .outbound
            .send(Message::Binary(Bytes::copy_from_slice(&bytes[start..start + len])));
    }

    /// Request a transport-level disconnect. Fire-and-request: the "close"
    /// event arrives later through the normal callback path, never
    /// synchronously from here. Silent no-op unless the channel is open.
    pub fn close(&self) {
        if let Some(transport) = self.live_transport() {
            let _ = transport.outbound.send(Message::Close(None));
        }
    }

    /// True between "open" and "close", false otherwise (never an error).
    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// The tri-state derived from (reference presence, transport liveness).
    pub fn state(&self) -> ChannelState {
        match self.transport.load_full() {
            None => ChannelState::Unattached,
            Some(t) if t.is_open() => ChannelState::Open,
            Some(_) => ChannelState::Closed,
        }
    }

    /// Publish the transport reference. Single atomic publish; reads from
    /// other threads observe it via `load_full`.
    pub(crate) fn attach(&self, transport: Arc<Transport>) {
        self.transport.store(Some(transport));
    }

    /// Fire "open" exactly once.
    pub(crate) fn fire_open(&self) {
        if !self.open_fired.swap(true, Ordering::SeqCst) {
            self.emit(EventKind::Open, &ChannelEvent::Open);
        }
    }

    /// Fire "message" for one complete inbound text frame.
    pub(crate) fn fire_message(&self, text: &str) {
        self.emit(EventKind::Message, &ChannelEvent::Message(text.to_owned()));
    }

    /// Invalidate the transport and fire "close" exactly once.
    pub(crate) fn fire_close(&self) {
        if !self.close_fired.swap(true, Ordering::SeqCst) {
            if let Some(transport) = self.transport.load_full() {
                transport.mark_closed();
            }
            self.emit(EventKind::Close, &ChannelEvent::Close);
        }
    }

    fn live_transport(&self) -> Option<Arc<Transport>> {
        self.transport.load_full().filter(|t| t.is_open())
    }

    fn table(&self, kind: EventKind) -> &Mutex<Vec<Listener>> {
        match kind {
            EventKind::Open => &self.open_listeners,
            EventKind::Message => &self.message_listeners,
            EventKind::Close => &self.close_listeners,
        }
    }

    fn emit(&self, kind: EventKind, event: &ChannelEvent) {
        // Clone the table out of the lock so a listener may register more
        // listeners without deadlocking.
        let listeners: Vec<Listener> = self
            .table(kind)
            .lock()
            .expect("listener table lock poisoned")
            .clone();
        for listener in listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached_channel() -> (Arc<SocketChannel>, mpsc::UnboundedReceiver<Message>) {
        let channel = SocketChannel::new();
        let (tx, rx) = mpsc::unbounded_channel();
        channel.attach(Arc::new(Transport::new(tx)));
        (channel, rx)
    }

    #[test]
    fn fresh_channel_operations_are_no_ops() {
        let channel = SocketChannel::new();
        assert!(!channel.is_open());
        assert_eq!(channel.state(), ChannelState::Unattached);
        channel.send("dropped");
        channel.send_binary(&[1, 2, 3], None, None);
        channel.close();
        assert!(!channel.is_open());
    }

    #[test]
    fn send_forwards_text_when_open() {
        let (channel, mut rx) = attached_channel();
        assert!(channel.is_open());
        channel.send("hello");
        match rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), "hello"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn send_binary_defaults_to_full_buffer() {
        let (channel, mut rx) = attached_channel();
        channel.send_binary(&[1, 2, 3, 4], None, None);
        match rx.try_recv().unwrap() {
            Message::Binary(bytes) => assert_eq!(&bytes[..], &[1, 2, 3, 4]),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn send_binary_respects_offset_and_clamps_length() {
        let (channel, mut rx) = attached_channel();
        channel.send_binary(&[1, 2, 3, 4], Some(1), Some(2));
        match rx.try_recv().unwrap() {
            Message::Binary(bytes) => assert_eq!(&bytes[..], &[2, 3]),
            other => panic!("unexpected frame: {:?}", other),
        }

        // Absent length falls back to the remaining buffer.
        channel.send_binary(&[1, 2, 3, 4], Some(2), None);
        match rx.try_recv().unwrap() {
            Message::Binary(bytes) => assert_eq!(&bytes[..], &[3, 4]),
            other => panic!("unexpected frame: {:?}", other),
        }

        // Oversized length is clamped, not a panic.
        channel.send_binary(&[1, 2, 3, 4], Some(3), Some(100));
        match rx.try_recv().unwrap() {
            Message::Binary(bytes) => assert_eq!(&bytes[..], &[4]),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn close_requests_disconnect_without_firing_close() {
        let (channel, mut rx) = attached_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();
        channel.on_close(move || flag.store(true, Ordering::SeqCst));

        channel.close();
        assert!(matches!(rx.try_recv().unwrap(), Message::Close(_)));
        // "close" only fires through the callback path.
        assert!(!closed.load(Ordering::SeqCst));

        channel.fire_close();
        assert!(closed.load(Ordering::SeqCst));
        assert!(!channel.is_open());
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[test]
    fn sends_after_close_are_no_ops() {
        let (channel, mut rx) = attached_channel();
        channel.fire_close();
        channel.send("dropped");
        channel.send_binary(&[9], None, None);
        channel.close();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn open_and_close_fire_at_most_once() {
        let (channel, _rx) = attached_channel();
        let opens = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let closes = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let o = opens.clone();
        let c = closes.clone();
        channel.on_open(move || {
            o.fetch_add(1, Ordering::SeqCst);
        });
        channel.on_close(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        channel.fire_open();
        channel.fire_open();
        channel.fire_close();
        channel.fire_close();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let (channel, _rx) = attached_channel();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            channel.on_message(move |_| order.lock().unwrap().push(tag));
        }
        channel.fire_message("ping");
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn broadcast_over_mixed_liveness_list() {
        let (open_channel, mut open_rx) = attached_channel();
        let (closed_channel, mut closed_rx) = attached_channel();
        closed_channel.fire_close();
        let unattached = SocketChannel::new();

        let roster = vec![open_channel.clone(), closed_channel, unattached];
        for member in &roster {
            member.send("announcement");
        }

        match open_rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), "announcement"),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(closed_rx.try_recv().is_err());
    }

    #[test]
    fn listener_may_register_listener_during_emit() {
        let (channel, _rx) = attached_channel();
        let hits = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let ch = channel.clone();
        let h = hits.clone();
        channel.on_message(move |_| {
            let h = h.clone();
            ch.on_message(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        });
        channel.fire_message("a");
        channel.fire_message("b");
        // Listener added during the first emit sees the second message.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

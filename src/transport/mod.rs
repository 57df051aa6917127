//! Transport contract consumed by the session.
//!
//! A transport carries whole STOMP frames as WebSocket text messages. It is
//! driven through three non-blocking calls and reports what happens on the
//! socket as [`TransportEvent`]s pushed into the [`EventSink`] it was built
//! with. Every event is tagged with the [`ConnectionId`] returned by the
//! `open` call whose socket produced it, so late events from a replaced
//! socket can be told apart from the current one.

use bytes::Bytes;
use tokio::sync::mpsc;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::WsTransport;

/// Notifications emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open and ready for the CONNECT frame.
    Opened,
    /// The socket closed, locally or remotely.
    Closed { code: u16, reason: String },
    /// A text message arrived.
    Text(String),
    /// A binary message arrived; it is decoded as UTF-8 text.
    Binary(Bytes),
    /// Connecting or sending failed. The description may be empty.
    Error(String),
}

/// Identifies one `open` of a transport. Ids increase with every `open`.
pub type ConnectionId = u64;

/// Channel a transport pushes its events into, tagged with the connection
/// that produced them.
pub type EventSink = mpsc::UnboundedSender<(ConnectionId, TransportEvent)>;

/// Everything needed to open the underlying socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenRequest {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Extra HTTP headers for the opening handshake.
    pub headers: Vec<(String, String)>,
    /// Cookies for the opening handshake as `(name, value)` pairs.
    pub cookies: Vec<(String, String)>,
}

impl OpenRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP handshake header (builder style).
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Add a cookie (builder style).
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// The `Cookie` header value for all cookies, or `None` without cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        Some(pairs.join("; "))
    }
}

/// A bidirectional message channel to the broker.
///
/// All calls return immediately. Outcomes (socket opened, closed, failed)
/// are reported asynchronously as [`TransportEvent`]s.
pub trait Transport: Send {
    /// Start opening a socket for `request`, replacing any current socket.
    /// Returns the id that tags every event of the new socket.
    fn open(&mut self, request: &OpenRequest) -> ConnectionId;

    /// Start closing the current socket. A no-op when none is open.
    fn close(&mut self);

    /// Queue a text message. Dropped when no socket is open.
    fn send_text(&mut self, text: String);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_joins_pairs() {
        let req = OpenRequest::new("ws://localhost/ws")
            .cookie("JSESSIONID", "abc")
            .cookie("theme", "dark");
        assert_eq!(
            req.cookie_header().as_deref(),
            Some("JSESSIONID=abc; theme=dark")
        );
    }

    #[test]
    fn cookie_header_absent_without_cookies() {
        assert_eq!(OpenRequest::new("ws://localhost/ws").cookie_header(), None);
    }
}

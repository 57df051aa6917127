use serde_json::Value;
use tokio::sync::mpsc;

use crate::frame::Headers;

/// A MESSAGE frame as handed to the observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// Value of the `destination` header, or `""` when absent.
    pub destination: String,
    /// Raw body text.
    pub body: String,
    /// The body parsed as JSON, when it is valid JSON.
    pub json: Option<Value>,
    /// All headers of the frame.
    pub headers: Headers,
}

impl ReceivedMessage {
    /// Get the value of a header by name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Receives session notifications.
///
/// Every method has an empty default so implementors only override what
/// they need. Calls arrive on the client task in wire order; they must not
/// block.
pub trait SessionObserver: Send + Sync {
    /// CONNECTED was received.
    fn on_connected(&self) {}

    /// The transport closed or failed.
    fn on_disconnected(&self) {}

    /// A MESSAGE frame was received.
    fn on_message(&self, _message: &ReceivedMessage) {}

    /// A RECEIPT frame with a `receipt-id` was received.
    fn on_receipt(&self, _receipt_id: &str) {}

    /// The broker sent an ERROR frame, or the transport reported an error.
    ///
    /// For an ERROR frame `detail` is the frame body (`None` without one).
    /// For a transport error `message` is the transport's description and
    /// `detail` is `Some("")`; either string may be empty.
    fn on_error(&self, _message: &str, _detail: Option<&str>) {}

    /// The server sent a heartbeat; a ping was sent back.
    fn on_ping(&self) {}
}

/// Owned form of every observer notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Message(ReceivedMessage),
    Receipt(String),
    Error {
        message: String,
        detail: Option<String>,
    },
    Ping,
}

/// Observer that forwards each notification as a [`SessionEvent`] into an
/// unbounded channel.
///
/// ```ignore
/// let (observer, mut events) = ChannelObserver::new();
/// let observer = Arc::new(observer);
/// client.open(request, Arc::downgrade(&observer), None).await?;
/// while let Some(event) = events.recv().await { /* ... */ }
/// ```
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_connected(&self) {
        self.forward(SessionEvent::Connected);
    }

    fn on_disconnected(&self) {
        self.forward(SessionEvent::Disconnected);
    }

    fn on_message(&self, message: &ReceivedMessage) {
        self.forward(SessionEvent::Message(message.clone()));
    }

    fn on_receipt(&self, receipt_id: &str) {
        self.forward(SessionEvent::Receipt(receipt_id.to_string()));
    }

    fn on_error(&self, message: &str, detail: Option<&str>) {
        self.forward(SessionEvent::Error {
            message: message.to_string(),
            detail: detail.map(str::to_string),
        });
    }

    fn on_ping(&self) {
        self.forward(SessionEvent::Ping);
    }
}

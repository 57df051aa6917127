use std::sync::Weak;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;

use crate::codec::{self, PING};
use crate::dispatch::{Inbound, ObserverSlot, route};
use crate::error::StompError;
use crate::frame::{Frame, Headers};
use crate::observer::SessionObserver;
use crate::subscription::{AckMode, Registry, Subscription};
use crate::transport::{ConnectionId, OpenRequest, Transport, TransportEvent};

/// Protocol versions advertised in every CONNECT frame.
pub const ACCEPT_VERSION: &str = "1.1,1.2";

/// Content type used by [`Session::send_json`].
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Snapshot of the session published to other tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Set from the `session` header of CONNECTED.
    pub session_id: Option<String>,
}

impl SessionStatus {
    /// True while connecting or connected.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected
        )
    }
}

/// STOMP session state machine over a [`Transport`].
///
/// The session turns high-level operations into frames, feeds inbound
/// transport events through the codec and dispatcher, and notifies the
/// registered observer. It is single-threaded by construction: the owner
/// (normally the `Client` task) serializes every call.
///
/// Operations never check the state before sending. A frame built while
/// disconnected is handed to the transport, which drops it when no socket
/// is open; callers check [`Session::is_connected`] first.
pub struct Session<T> {
    transport: T,
    status: watch::Sender<SessionStatus>,
    connection_headers: Headers,
    observer: ObserverSlot,
    registry: Registry,
    /// Connection started by the latest `open`.
    connection: Option<ConnectionId>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            transport,
            status,
            connection_headers: Vec::new(),
            observer: ObserverSlot::default(),
            registry: Registry::new(),
            connection: None,
        }
    }

    /// Subscribe to status changes.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn session_id(&self) -> Option<String> {
        self.status.borrow().session_id.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The observer weak reference currently registered, if any.
    pub fn observer(&self) -> Option<Weak<dyn SessionObserver>> {
        self.observer.weak()
    }

    /// Start a session: register the observer, remember the connection
    /// headers and ask the transport to open. CONNECT follows once the
    /// transport reports [`TransportEvent::Opened`].
    pub fn open(
        &mut self,
        request: &OpenRequest,
        observer: Weak<dyn SessionObserver>,
        connection_headers: Option<Headers>,
    ) {
        self.observer.set(observer);
        self.connection_headers = connection_headers.unwrap_or_default();
        self.set_status(SessionState::Connecting, None);
        tracing::debug!(url = %request.url, "opening session");
        self.connection = Some(self.transport.open(request));
    }

    /// Id of the connection started by the latest `open`, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Send DISCONNECT and ask the transport to close.
    ///
    /// The observer hears about it once the transport reports the close.
    pub fn disconnect(&mut self) {
        let frame = Frame::new("DISCONNECT").header("disconnected", unix_seconds().to_string());
        self.send_frame(&frame);
        if self.state() != SessionState::Disconnected {
            self.set_status(SessionState::Disconnecting, self.session_id());
        }
        tracing::debug!("disconnect requested");
        self.transport.close();
    }

    /// Send a text message to `destination`.
    ///
    /// `content-length` is always set from the body and `destination`
    /// overwrites any caller value; `content-type` defaults to
    /// `text/plain` only when `headers` has none.
    pub fn send_message(
        &mut self,
        message: &str,
        destination: &str,
        headers: Option<Headers>,
        receipt: Option<&str>,
    ) {
        let mut frame = Frame::new("SEND").with_headers(headers.unwrap_or_default());
        if let Some(receipt) = receipt {
            frame = frame.receipt(receipt);
        }
        frame = frame
            .header("destination", destination)
            .header("content-length", message.len().to_string());
        if frame.get_header("content-type").is_none() {
            frame = frame.header("content-type", DEFAULT_CONTENT_TYPE);
        }
        self.send_frame(&frame.set_body(message));
    }

    /// Serialize `value` to JSON and send it to `destination`.
    ///
    /// Nothing is sent when serialization fails.
    pub fn send_json<S: Serialize + ?Sized>(
        &mut self,
        value: &S,
        destination: &str,
    ) -> Result<(), StompError> {
        let body = serde_json::to_string(value)?;
        self.send_message(&body, destination, Some(json_headers()), None);
        Ok(())
    }

    /// Subscribe with `auto` acknowledgement.
    pub fn subscribe(&mut self, destination: &str) {
        self.subscribe_with_ack(destination, AckMode::Auto);
    }

    /// Subscribe using the destination as subscription id.
    pub fn subscribe_with_ack(&mut self, destination: &str, ack: AckMode) {
        let frame = Frame::new("SUBSCRIBE")
            .header("id", destination)
            .header("destination", destination)
            .header("ack", ack.as_str());
        self.track_subscription(Subscription {
            id: destination.to_string(),
            destination: destination.to_string(),
            ack,
        });
        self.send_frame(&frame);
    }

    /// Subscribe with caller-chosen headers; only `destination` is
    /// injected.
    pub fn subscribe_with_headers(&mut self, destination: &str, headers: Headers) {
        let frame = Frame::new("SUBSCRIBE")
            .with_headers(headers)
            .header("destination", destination);
        let ack = frame
            .get_header("ack")
            .and_then(AckMode::from_header)
            .unwrap_or_default();
        self.track_subscription(Subscription {
            id: frame.get_header("id").unwrap_or(destination).to_string(),
            destination: destination.to_string(),
            ack,
        });
        self.send_frame(&frame);
    }

    /// Unsubscribe the subscription whose id is `destination`. Unknown ids
    /// still produce an UNSUBSCRIBE frame.
    pub fn unsubscribe(&mut self, destination: &str) {
        if self.registry.remove_subscription(destination).is_none() {
            tracing::debug!(id = destination, "unsubscribing unknown subscription");
        }
        self.send_frame(&Frame::new("UNSUBSCRIBE").header("id", destination));
    }

    pub fn begin(&mut self, transaction: &str) {
        if !self.registry.begin(transaction) {
            tracing::debug!(transaction, "transaction already open");
        }
        self.send_transaction_frame("BEGIN", transaction);
    }

    pub fn commit(&mut self, transaction: &str) {
        self.finish_transaction("COMMIT", transaction);
    }

    pub fn abort(&mut self, transaction: &str) {
        self.finish_transaction("ABORT", transaction);
    }

    /// Acknowledge a message by its `message-id`.
    pub fn ack(&mut self, message_id: &str) {
        self.send_frame(&Frame::new("ACK").header("id", message_id));
    }

    /// Acknowledge a message delivered on `subscription`.
    pub fn ack_with_subscription(&mut self, message_id: &str, subscription: &str) {
        let frame = Frame::new("ACK")
            .header("id", message_id)
            .header("subscription", subscription);
        self.send_frame(&frame);
    }

    /// Encode `frame` and hand it to the transport without waiting.
    pub fn send_frame(&mut self, frame: &Frame) {
        tracing::trace!(command = %frame.command, "sending frame");
        self.transport.send_text(codec::encode(frame));
    }

    /// Apply a notification tagged with the connection that produced it.
    ///
    /// Events from any connection other than the one started by the latest
    /// `open` are dropped, so a replaced socket closing late cannot reset
    /// the session that superseded it.
    pub fn handle_connection_event(&mut self, connection: ConnectionId, event: TransportEvent) {
        if self.connection != Some(connection) {
            tracing::debug!(
                connection,
                current = ?self.connection,
                ?event,
                "dropping event from replaced connection"
            );
            return;
        }
        self.handle_event(event);
    }

    /// Apply one notification from the current connection.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if self.state() == SessionState::Connecting {
                    self.send_connect();
                } else {
                    tracing::debug!(state = ?self.state(), "socket opened outside of connect, ignoring");
                }
            }
            TransportEvent::Text(text) => self.receive(codec::decode(&text)),
            TransportEvent::Binary(data) => self.receive(codec::decode_bytes(&data)),
            TransportEvent::Closed { code, reason } => {
                tracing::debug!(code, %reason, "transport closed");
                self.transport_lost();
            }
            TransportEvent::Error(description) => {
                tracing::warn!(error = %description, "transport error");
                self.observer.notify(|o| o.on_error(&description, Some("")));
                self.transport_lost();
            }
        }
    }

    /// Forget the observer; later notifications are dropped.
    pub fn clear_observer(&mut self) {
        self.observer.clear();
    }

    fn send_connect(&mut self) {
        let frame = Frame::new("CONNECT")
            .with_headers(self.connection_headers.clone())
            .header("accept-version", ACCEPT_VERSION);
        self.send_frame(&frame);
    }

    fn receive(&mut self, frame: Option<Frame>) {
        let Some(frame) = frame else {
            tracing::trace!("nothing to process in inbound message");
            return;
        };
        match route(frame) {
            Inbound::Connected { session } => {
                tracing::debug!(session = ?session, "session connected");
                self.set_status(SessionState::Connected, session);
                self.observer.notify(|o| o.on_connected());
            }
            Inbound::Message(message) => {
                self.observer.notify(|o| o.on_message(&message));
            }
            Inbound::Receipt(id) => {
                self.observer.notify(|o| o.on_receipt(&id));
            }
            Inbound::Error { message, detail } => {
                tracing::debug!(%message, "broker sent ERROR");
                self.observer
                    .notify(|o| o.on_error(&message, detail.as_deref()));
            }
            Inbound::Heartbeat => {
                self.transport.send_text(PING.to_string());
                self.observer.notify(|o| o.on_ping());
            }
            Inbound::Ignored => tracing::trace!("ignoring inbound frame"),
        }
    }

    /// The socket is gone: reset and tell the observer, once.
    fn transport_lost(&mut self) {
        let was = self.state();
        self.reset();
        if was != SessionState::Disconnected {
            self.observer.notify(|o| o.on_disconnected());
        }
    }

    fn reset(&mut self) {
        self.set_status(SessionState::Disconnected, None);
        self.connection_headers.clear();
        self.registry.clear();
    }

    fn track_subscription(&mut self, subscription: Subscription) {
        if let Some(previous) = self.registry.add_subscription(subscription) {
            tracing::debug!(id = %previous.id, "subscription id already active, replacing");
        }
    }

    fn finish_transaction(&mut self, command: &str, transaction: &str) {
        if !self.registry.finish(transaction) {
            tracing::debug!(transaction, command, "transaction was not begun");
        }
        self.send_transaction_frame(command, transaction);
    }

    fn send_transaction_frame(&mut self, command: &str, transaction: &str) {
        self.send_frame(&Frame::new(command).header("transaction", transaction));
    }

    fn set_status(&self, state: SessionState, session_id: Option<String>) {
        self.status.send_replace(SessionStatus { state, session_id });
    }
}

/// Headers used for JSON bodies.
pub fn json_headers() -> Headers {
    vec![("content-type".to_string(), JSON_CONTENT_TYPE.to_string())]
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{ChannelObserver, SessionEvent};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    /// Records every call made by the session.
    #[derive(Default)]
    struct Recorder {
        opened: Vec<OpenRequest>,
        closes: usize,
        sent: Vec<String>,
    }

    impl Transport for Recorder {
        fn open(&mut self, request: &OpenRequest) -> ConnectionId {
            self.opened.push(request.clone());
            self.opened.len() as ConnectionId
        }

        fn close(&mut self) {
            self.closes += 1;
        }

        fn send_text(&mut self, text: String) {
            self.sent.push(text);
        }
    }

    fn open_session() -> (
        Session<Recorder>,
        Arc<ChannelObserver>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (observer, events) = ChannelObserver::new();
        let observer = Arc::new(observer);
        let mut session = Session::new(Recorder::default());
        session.open(
            &OpenRequest::new("ws://broker/ws"),
            Arc::downgrade(&observer) as Weak<dyn SessionObserver>,
            Some(vec![("login".into(), "guest".into())]),
        );
        (session, observer, events)
    }

    #[test]
    fn connect_frame_sent_when_socket_opens() {
        let (mut session, _obs, _events) = open_session();
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.transport().sent.is_empty());

        session.handle_event(TransportEvent::Opened);
        let connect = codec::decode(&session.transport().sent[0]).unwrap();
        assert_eq!(connect.command, "CONNECT");
        assert_eq!(connect.get_header("login"), Some("guest"));
        assert_eq!(connect.get_header("accept-version"), Some(ACCEPT_VERSION));
    }

    #[test]
    fn accept_version_overrides_caller_value() {
        let (observer, _events) = ChannelObserver::new();
        let observer = Arc::new(observer);
        let mut session = Session::new(Recorder::default());
        session.open(
            &OpenRequest::new("ws://broker/ws"),
            Arc::downgrade(&observer) as Weak<dyn SessionObserver>,
            Some(vec![("accept-version".into(), "1.0".into())]),
        );
        session.handle_event(TransportEvent::Opened);
        let connect = codec::decode(&session.transport().sent[0]).unwrap();
        assert_eq!(connect.get_header("accept-version"), Some("1.1,1.2"));
    }

    #[test]
    fn disconnect_waits_for_transport_close() {
        let (mut session, _obs, mut events) = open_session();
        session.handle_event(TransportEvent::Opened);
        session.handle_event(TransportEvent::Text("CONNECTED\nsession:s1\n\n\0".into()));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Connected);

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnecting);
        assert!(!session.is_connected());
        assert_eq!(session.transport().closes, 1);
        let last = codec::decode(session.transport().sent.last().unwrap()).unwrap();
        assert_eq!(last.command, "DISCONNECT");
        assert!(last.get_header("disconnected").unwrap().parse::<u64>().is_ok());
        assert!(events.try_recv().is_err());

        session.handle_event(TransportEvent::Closed {
            code: 1000,
            reason: String::new(),
        });
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.session_id(), None);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Disconnected);
    }

    #[test]
    fn late_close_from_replaced_socket_keeps_new_session() {
        let (mut session, observer, mut events) = open_session();
        let first = session.connection().unwrap();
        session.open(
            &OpenRequest::new("ws://broker/ws"),
            Arc::downgrade(&observer) as Weak<dyn SessionObserver>,
            None,
        );
        let second = session.connection().unwrap();
        assert_ne!(first, second);

        session.handle_connection_event(
            first,
            TransportEvent::Closed {
                code: 1000,
                reason: "closed before handshake completed".into(),
            },
        );
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(events.try_recv().is_err());

        session.handle_connection_event(second, TransportEvent::Opened);
        let connect = codec::decode(session.transport().sent.last().unwrap()).unwrap();
        assert_eq!(connect.command, "CONNECT");

        session.handle_connection_event(
            second,
            TransportEvent::Closed {
                code: 1006,
                reason: String::new(),
            },
        );
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Disconnected);
    }

    #[test]
    fn transport_error_resets_and_notifies_once() {
        let (mut session, _obs, mut events) = open_session();
        session.handle_event(TransportEvent::Opened);
        session.subscribe("/topic/a");

        session.handle_event(TransportEvent::Error(String::new()));
        session.handle_event(TransportEvent::Closed {
            code: 1006,
            reason: String::new(),
        });

        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Error {
                message: String::new(),
                detail: Some(String::new())
            }
        );
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Disconnected);
        assert!(events.try_recv().is_err());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.registry().is_subscribed("/topic/a"));
    }

    #[test]
    fn heartbeat_answers_with_ping() {
        let (mut session, _obs, mut events) = open_session();
        session.handle_event(TransportEvent::Text("\n".into()));
        assert_eq!(session.transport().sent, vec![PING.to_string()]);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Ping);
    }

    #[test]
    fn binary_messages_are_decoded_as_text() {
        let (mut session, _obs, mut events) = open_session();
        session.handle_event(TransportEvent::Binary(bytes::Bytes::from_static(
            b"RECEIPT\nreceipt-id:r-9\n\n\0",
        )));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Receipt("r-9".into()));
    }

    #[test]
    fn dropped_observer_is_skipped() {
        let (mut session, observer, mut events) = open_session();
        drop(observer);
        session.handle_event(TransportEvent::Text("CONNECTED\n\n\0".into()));
        assert_eq!(session.state(), SessionState::Connected);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn subscribe_with_headers_registers_caller_id() {
        let (mut session, _obs, _events) = open_session();
        session.subscribe_with_headers(
            "/queue/jobs",
            vec![
                ("id".into(), "sub-1".into()),
                ("ack".into(), "client".into()),
                ("destination".into(), "/queue/ignored".into()),
            ],
        );
        let sub = session.registry().subscription("sub-1").unwrap();
        assert_eq!(sub.destination, "/queue/jobs");
        assert_eq!(sub.ack, AckMode::Client);
        let frame = codec::decode(&session.transport().sent[0]).unwrap();
        assert_eq!(frame.get_header("destination"), Some("/queue/jobs"));
    }

    #[test]
    fn transactions_are_tracked_but_always_sent() {
        let (mut session, _obs, _events) = open_session();
        session.commit("never-begun");
        session.begin("tx1");
        assert!(session.registry().is_open("tx1"));
        session.abort("tx1");
        assert!(!session.registry().is_open("tx1"));
        let commands: Vec<String> = session
            .transport()
            .sent
            .iter()
            .map(|w| codec::decode(w).unwrap().command)
            .collect();
        assert_eq!(commands, vec!["COMMIT", "BEGIN", "ABORT"]);
    }
}

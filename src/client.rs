use std::sync::Weak;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use crate::error::StompError;
use crate::frame::{Frame, Headers};
use crate::observer::SessionObserver;
use crate::session::{Session, SessionState, SessionStatus, json_headers};
use crate::subscription::AckMode;
use crate::supervisor::{
    AutoDisconnect, ReconnectSupervisor, auto_disconnect_after, next_auto_disconnect,
    next_reconnect,
};
use crate::transport::{ConnectionId, EventSink, OpenRequest, Transport, TransportEvent};

/// Options for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Capacity of the channel between client handles and the background
    /// task. Callers wait when it is full.
    pub command_capacity: usize,
    /// Handshake timeout for the WebSocket transport built by
    /// [`Client::websocket`].
    pub handshake_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            command_capacity: 32,
            handshake_timeout: None,
        }
    }
}

impl ClientOptions {
    /// Set the command channel capacity (minimum 1).
    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity.max(1);
        self
    }

    /// Fail WebSocket handshakes that take longer than `timeout`.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }
}

/// Requests from client handles to the background task.
enum Command {
    Open {
        request: OpenRequest,
        observer: Weak<dyn SessionObserver>,
        headers: Option<Headers>,
    },
    Send {
        message: String,
        destination: String,
        headers: Option<Headers>,
        receipt: Option<String>,
    },
    Frame(Frame),
    Subscribe {
        destination: String,
        ack: AckMode,
    },
    SubscribeWithHeaders {
        destination: String,
        headers: Headers,
    },
    Unsubscribe(String),
    Begin(String),
    Commit(String),
    Abort(String),
    Ack {
        message_id: String,
        subscription: Option<String>,
    },
    Disconnect,
    AutoDisconnect(Duration),
    CancelAutoDisconnect,
    Reconnect {
        request: OpenRequest,
        observer: Weak<dyn SessionObserver>,
        headers: Headers,
        interval: Duration,
    },
    CancelReconnect,
}

/// High-level handle to a STOMP session running on a background task.
///
/// `Client::spawn` moves a [`Session`] and its transport onto a tokio task
/// which serializes every operation, transport event, timer and observer
/// callback. Handles are cheap to clone; all clones drive the same
/// session. Operations are fire-and-forget: they return once the request
/// is queued and fail only when the task has stopped.
///
/// The task ends on [`Client::close`] or when every handle is dropped. On
/// the way out it disarms both timers and disconnects a live session.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::Sender<Command>,
    shutdown_tx: broadcast::Sender<()>,
    status: watch::Receiver<SessionStatus>,
}

impl Client {
    /// Spawn the session task over the transport built by `make_transport`.
    ///
    /// `make_transport` receives the sink the transport must push its
    /// [`TransportEvent`]s into. Must be called within a tokio runtime.
    pub fn spawn<T, F>(make_transport: F, options: ClientOptions) -> Self
    where
        T: Transport + 'static,
        F: FnOnce(EventSink) -> T,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<(ConnectionId, TransportEvent)>();
        let session = Session::new(make_transport(event_tx));
        let status = session.watch_status();
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(options.command_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        let driver = Driver {
            session,
            commands: cmd_rx,
            events: event_rx,
            reconnect: None,
            auto_disconnect: None,
        };
        tokio::spawn(driver.run(shutdown_rx));

        Client {
            commands: cmd_tx,
            shutdown_tx,
            status,
        }
    }

    /// Spawn a client over [`crate::transport::WsTransport`].
    #[cfg(feature = "websocket")]
    pub fn websocket(options: ClientOptions) -> Self {
        let timeout = options.handshake_timeout;
        Self::spawn(
            move |events| {
                let transport = crate::transport::WsTransport::new(events);
                match timeout {
                    Some(limit) => transport.with_handshake_timeout(limit),
                    None => transport,
                }
            },
            options,
        )
    }

    async fn dispatch(&self, command: Command) -> Result<(), StompError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| StompError::Closed)
    }

    /// Open the socket described by `request` and connect once it is up.
    ///
    /// Parameters
    /// - `request`: URL plus handshake headers and cookies.
    /// - `observer`: receives every session notification. Only a weak
    ///   reference is kept; notifications stop when the owner drops it.
    /// - `headers`: extra CONNECT headers (login, passcode, host...).
    ///   `accept-version` is always `1.1,1.2`.
    pub async fn open(
        &self,
        request: OpenRequest,
        observer: Weak<dyn SessionObserver>,
        headers: Option<Headers>,
    ) -> Result<(), StompError> {
        self.dispatch(Command::Open {
            request,
            observer,
            headers,
        })
        .await
    }

    /// Send a text message to `destination`.
    ///
    /// `content-length` is computed from `message`; `content-type`
    /// defaults to `text/plain` unless `headers` sets one. With `receipt`
    /// the broker confirms processing through `on_receipt`.
    pub async fn send_message(
        &self,
        message: &str,
        destination: &str,
        headers: Option<Headers>,
        receipt: Option<&str>,
    ) -> Result<(), StompError> {
        self.dispatch(Command::Send {
            message: message.to_string(),
            destination: destination.to_string(),
            headers,
            receipt: receipt.map(str::to_string),
        })
        .await
    }

    /// Serialize `value` as JSON and send it with
    /// `content-type: application/json;charset=UTF-8`.
    ///
    /// Returns `StompError::Serialization` without sending anything when
    /// `value` cannot be serialized.
    pub async fn send_json<S: Serialize + ?Sized>(
        &self,
        value: &S,
        destination: &str,
    ) -> Result<(), StompError> {
        let body = serde_json::to_string(value)?;
        self.dispatch(Command::Send {
            message: body,
            destination: destination.to_string(),
            headers: Some(json_headers()),
            receipt: None,
        })
        .await
    }

    /// Send an arbitrary frame as is.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), StompError> {
        self.dispatch(Command::Frame(frame)).await
    }

    /// Subscribe to `destination` with `auto` acknowledgement. The
    /// destination doubles as subscription id.
    pub async fn subscribe(&self, destination: &str) -> Result<(), StompError> {
        self.subscribe_with_ack(destination, AckMode::Auto).await
    }

    pub async fn subscribe_with_ack(
        &self,
        destination: &str,
        ack: AckMode,
    ) -> Result<(), StompError> {
        self.dispatch(Command::Subscribe {
            destination: destination.to_string(),
            ack,
        })
        .await
    }

    /// Subscribe with caller-supplied headers; `destination` is injected.
    pub async fn subscribe_with_headers(
        &self,
        destination: &str,
        headers: Headers,
    ) -> Result<(), StompError> {
        self.dispatch(Command::SubscribeWithHeaders {
            destination: destination.to_string(),
            headers,
        })
        .await
    }

    pub async fn unsubscribe(&self, destination: &str) -> Result<(), StompError> {
        self.dispatch(Command::Unsubscribe(destination.to_string()))
            .await
    }

    pub async fn begin(&self, transaction_id: &str) -> Result<(), StompError> {
        self.dispatch(Command::Begin(transaction_id.to_string()))
            .await
    }

    pub async fn commit(&self, transaction_id: &str) -> Result<(), StompError> {
        self.dispatch(Command::Commit(transaction_id.to_string()))
            .await
    }

    pub async fn abort(&self, transaction_id: &str) -> Result<(), StompError> {
        self.dispatch(Command::Abort(transaction_id.to_string()))
            .await
    }

    /// Acknowledge a message by its `message-id`.
    pub async fn ack(&self, message_id: &str) -> Result<(), StompError> {
        self.dispatch(Command::Ack {
            message_id: message_id.to_string(),
            subscription: None,
        })
        .await
    }

    pub async fn ack_with_subscription(
        &self,
        message_id: &str,
        subscription: &str,
    ) -> Result<(), StompError> {
        self.dispatch(Command::Ack {
            message_id: message_id.to_string(),
            subscription: Some(subscription.to_string()),
        })
        .await
    }

    /// Send DISCONNECT and close the socket. `on_disconnected` fires when
    /// the transport has actually closed.
    pub async fn disconnect(&self) -> Result<(), StompError> {
        self.dispatch(Command::Disconnect).await
    }

    /// Disconnect once `delay` has elapsed. Replaces a pending deadline.
    pub async fn auto_disconnect(&self, delay: Duration) -> Result<(), StompError> {
        self.dispatch(Command::AutoDisconnect(delay)).await
    }

    pub async fn cancel_auto_disconnect(&self) -> Result<(), StompError> {
        self.dispatch(Command::CancelAutoDisconnect).await
    }

    /// Every `interval`, re-open the session with `request` if it is not
    /// connected. `headers` are used as CONNECT headers when non-empty.
    /// Replaces a previously armed reconnect timer.
    pub async fn reconnect(
        &self,
        request: OpenRequest,
        observer: Weak<dyn SessionObserver>,
        headers: Headers,
        interval: Duration,
    ) -> Result<(), StompError> {
        if interval.is_zero() {
            return Err(StompError::InvalidInterval("reconnect interval"));
        }
        self.dispatch(Command::Reconnect {
            request,
            observer,
            headers,
            interval,
        })
        .await
    }

    pub async fn cancel_reconnect(&self) -> Result<(), StompError> {
        self.dispatch(Command::CancelReconnect).await
    }

    /// True while the session is connecting or connected.
    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// The `session` header of the last CONNECTED frame.
    pub fn session_id(&self) -> Option<String> {
        self.status.borrow().session_id.clone()
    }

    /// Wait until the session reaches `state`.
    pub async fn wait_for_state(&self, state: SessionState) -> Result<(), StompError> {
        let mut status = self.status.clone();
        status
            .wait_for(|s| s.state == state)
            .await
            .map(|_| ())
            .map_err(|_| StompError::Closed)
    }

    /// Stop the background task.
    ///
    /// Both timers are disarmed, a live session is disconnected and the
    /// transport closed. No further notifications are delivered.
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// State owned by the background task.
struct Driver<T> {
    session: Session<T>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>,
    reconnect: Option<ReconnectSupervisor>,
    auto_disconnect: Option<AutoDisconnect>,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                Some((connection, event)) = self.events.recv() => {
                    self.session.handle_connection_event(connection, event)
                }
                _ = next_reconnect(&mut self.reconnect) => {
                    if let Some(supervisor) = &self.reconnect {
                        supervisor.check(&mut self.session);
                    }
                }
                _ = next_auto_disconnect(&mut self.auto_disconnect) => {
                    self.auto_disconnect = None;
                    tracing::debug!("auto-disconnect deadline reached");
                    self.session.disconnect();
                }
            }
        }
        self.teardown();
    }

    fn apply(&mut self, command: Command) {
        let session = &mut self.session;
        match command {
            Command::Open {
                request,
                observer,
                headers,
            } => session.open(&request, observer, headers),
            Command::Send {
                message,
                destination,
                headers,
                receipt,
            } => session.send_message(&message, &destination, headers, receipt.as_deref()),
            Command::Frame(frame) => session.send_frame(&frame),
            Command::Subscribe { destination, ack } => {
                session.subscribe_with_ack(&destination, ack)
            }
            Command::SubscribeWithHeaders {
                destination,
                headers,
            } => session.subscribe_with_headers(&destination, headers),
            Command::Unsubscribe(destination) => session.unsubscribe(&destination),
            Command::Begin(tx) => session.begin(&tx),
            Command::Commit(tx) => session.commit(&tx),
            Command::Abort(tx) => session.abort(&tx),
            Command::Ack {
                message_id,
                subscription: Some(subscription),
            } => session.ack_with_subscription(&message_id, &subscription),
            Command::Ack {
                message_id,
                subscription: None,
            } => session.ack(&message_id),
            Command::Disconnect => session.disconnect(),
            Command::AutoDisconnect(delay) => {
                self.auto_disconnect = Some(auto_disconnect_after(delay));
            }
            Command::CancelAutoDisconnect => self.auto_disconnect = None,
            Command::Reconnect {
                request,
                observer,
                headers,
                interval,
            } => {
                match ReconnectSupervisor::new(request, observer, headers, interval) {
                    Ok(supervisor) => {
                        tracing::debug!(?interval, "reconnect supervisor armed");
                        self.reconnect = Some(supervisor);
                    }
                    Err(e) => tracing::warn!(error = %e, "reconnect supervisor not armed"),
                }
            }
            Command::CancelReconnect => self.reconnect = None,
        }
    }

    fn teardown(mut self) {
        self.reconnect = None;
        self.auto_disconnect = None;
        if self.session.is_connected() {
            self.session.disconnect();
        } else {
            self.session.transport_mut().close();
        }
        self.session.clear_observer();
        tracing::debug!("client task stopped");
    }
}

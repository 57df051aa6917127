//! WebSocket transport implementation using `tokio-tungstenite`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::{ConnectionId, EventSink, OpenRequest, Transport, TransportEvent};
use crate::error::TransportError;

/// Close code reported when the socket vanished without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when the peer sent a close frame without a code.
const NO_STATUS: u16 = 1005;
const NORMAL_CLOSURE: u16 = 1000;

/// Handle to the task driving one socket.
struct Socket {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

/// A [`Transport`] over a client WebSocket.
///
/// Every `open` spawns a task that performs the handshake and then pumps
/// messages in both directions until the socket closes or `close` is
/// called. Only the most recently opened socket may report events; a
/// superseded socket is shut down silently.
pub struct WsTransport {
    events: EventSink,
    socket: Option<Socket>,
    epoch: Arc<AtomicU64>,
    handshake_timeout: Option<Duration>,
}

impl WsTransport {
    /// Create a transport reporting into `events`.
    pub fn new(events: EventSink) -> Self {
        Self {
            events,
            socket: None,
            epoch: Arc::new(AtomicU64::new(0)),
            handshake_timeout: None,
        }
    }

    /// Fail the opening handshake after `timeout` (builder style).
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }
}

impl Transport for WsTransport {
    fn open(&mut self, request: &OpenRequest) -> ConnectionId {
        // Retire the old socket before cancelling it so nothing it emits
        // while shutting down gets through.
        let mine = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(old) = self.socket.take() {
            old.cancel.cancel();
        }
        let emitter = Emitter {
            sink: self.events.clone(),
            epoch: self.epoch.clone(),
            mine,
        };

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tracing::debug!(url = %request.url, epoch = mine, "opening websocket");
        tokio::spawn(run_socket(
            request.clone(),
            self.handshake_timeout,
            outbound_rx,
            cancel.clone(),
            emitter,
        ));
        self.socket = Some(Socket { outbound, cancel });
        mine
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.cancel.cancel();
        }
    }

    fn send_text(&mut self, text: String) {
        match &self.socket {
            Some(socket) => {
                if socket.outbound.send(text).is_err() {
                    tracing::debug!("socket task gone, dropping outbound frame");
                }
            }
            None => tracing::debug!("no open socket, dropping outbound frame"),
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Forwards events only while its socket is the current one.
struct Emitter {
    sink: EventSink,
    epoch: Arc<AtomicU64>,
    mine: ConnectionId,
}

impl Emitter {
    fn emit(&self, event: TransportEvent) {
        if self.epoch.load(Ordering::SeqCst) != self.mine {
            return;
        }
        let _ = self.sink.send((self.mine, event));
    }

    fn closed(&self, code: u16, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }
}

/// Build the handshake request: URL, extra headers and a `Cookie` header.
fn build_request(request: &OpenRequest) -> Result<Request, TransportError> {
    let mut req = request.url.as_str().into_client_request()?;
    let headers = req.headers_mut();
    for (k, v) in &request.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("header name '{}': {}", k, e)))?;
        let value = HeaderValue::from_str(v)
            .map_err(|e| TransportError::InvalidRequest(format!("header '{}': {}", k, e)))?;
        headers.append(name, value);
    }
    if let Some(cookie) = request.cookie_header() {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| TransportError::InvalidRequest(format!("cookie: {}", e)))?;
        headers.insert(COOKIE, value);
    }
    Ok(req)
}

async fn handshake(
    request: &OpenRequest,
    timeout: Option<Duration>,
) -> Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    TransportError,
> {
    let req = build_request(request)?;
    let connecting = tokio_tungstenite::connect_async(req);
    let (ws, _response) = match timeout {
        Some(limit) => tokio::time::timeout(limit, connecting)
            .await
            .map_err(|_| TransportError::Timeout)??,
        None => connecting.await?,
    };
    Ok(ws)
}

async fn run_socket(
    request: OpenRequest,
    timeout: Option<Duration>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    emitter: Emitter,
) {
    let ws = tokio::select! {
        _ = cancel.cancelled() => {
            emitter.closed(NORMAL_CLOSURE, "closed before handshake completed");
            return;
        }
        result = handshake(&request, timeout) => match result {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "websocket handshake failed");
                emitter.emit(TransportEvent::Error(e.to_string()));
                return;
            }
        }
    };

    tracing::debug!(url = %request.url, "websocket open");
    emitter.emit(TransportEvent::Opened);
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Frames queued before close (DISCONNECT) still go out.
                while let Ok(text) = outbound.try_recv() {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
                emitter.closed(NORMAL_CLOSURE, "closed by client");
                break;
            }
            out = outbound.recv() => match out {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        tracing::warn!(error = %e, "websocket send failed");
                        emitter.emit(TransportEvent::Error(e.to_string()));
                        emitter.closed(ABNORMAL_CLOSURE, e.to_string());
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    emitter.emit(TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    emitter.emit(TransportEvent::Binary(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                        .unwrap_or((NO_STATUS, String::new()));
                    emitter.closed(code, reason);
                    break;
                }
                Some(Ok(_)) => continue, // ping/pong/raw frames
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket receive failed");
                    emitter.emit(TransportEvent::Error(e.to_string()));
                    emitter.closed(ABNORMAL_CLOSURE, "");
                    break;
                }
                None => {
                    emitter.closed(ABNORMAL_CLOSURE, "");
                    break;
                }
            }
        }
    }
}

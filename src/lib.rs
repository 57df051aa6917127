//! Async STOMP 1.1/1.2 client running over a WebSocket.
//!
//! [`Client`] is the entry point: it owns a [`Session`] on a background
//! task and reports what the broker sends to a [`SessionObserver`].

pub mod client;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod observer;
pub mod session;
pub mod subscription;
pub mod supervisor;
pub mod transport;

pub use client::{Client, ClientOptions};
pub use error::StompError;
#[cfg(feature = "websocket")]
pub use error::TransportError;
pub use frame::{Frame, Headers};
pub use observer::{ChannelObserver, ReceivedMessage, SessionEvent, SessionObserver};
pub use session::{Session, SessionState, SessionStatus};
pub use subscription::AckMode;
#[cfg(feature = "websocket")]
pub use transport::WsTransport;
pub use transport::{ConnectionId, EventSink, OpenRequest, Transport, TransportEvent};

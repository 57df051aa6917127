//! Routing of decoded inbound frames and delivery to the observer.

use std::sync::{Arc, Weak};

use crate::frame::Frame;
use crate::observer::{ReceivedMessage, SessionObserver};

/// What an inbound frame means to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// CONNECTED, with the `session` header if the broker sent one.
    Connected { session: Option<String> },
    Message(ReceivedMessage),
    /// RECEIPT carrying a `receipt-id`.
    Receipt(String),
    /// ERROR carrying a `message` header; the body is the detail.
    Error {
        message: String,
        detail: Option<String>,
    },
    /// Empty frame from the server; must be answered with a ping.
    Heartbeat,
    /// Unknown command, or a RECEIPT/ERROR missing its key header.
    Ignored,
}

/// Classify a decoded frame.
pub fn route(frame: Frame) -> Inbound {
    if frame.is_heartbeat() {
        return Inbound::Heartbeat;
    }
    match frame.command.as_str() {
        "CONNECTED" => Inbound::Connected {
            session: frame.get_header("session").map(str::to_string),
        },
        "MESSAGE" => {
            let destination = frame.get_header("destination").unwrap_or_default().to_string();
            let body = frame.body.unwrap_or_default();
            let json = serde_json::from_str(&body).ok();
            Inbound::Message(ReceivedMessage {
                destination,
                body,
                json,
                headers: frame.headers,
            })
        }
        "RECEIPT" => match frame.get_header("receipt-id") {
            Some(id) => Inbound::Receipt(id.to_string()),
            None => Inbound::Ignored,
        },
        "ERROR" => match frame.get_header("message") {
            Some(message) => Inbound::Error {
                message: message.to_string(),
                detail: frame.body.clone(),
            },
            None => Inbound::Ignored,
        },
        _ => Inbound::Ignored,
    }
}

/// Single observer slot holding a non-owning reference.
///
/// Notifications are dropped when the slot is empty or the observer has
/// been dropped by its owner.
#[derive(Default)]
pub struct ObserverSlot {
    observer: Option<Weak<dyn SessionObserver>>,
}

impl ObserverSlot {
    pub fn set(&mut self, observer: Weak<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn clear(&mut self) {
        self.observer = None;
    }

    /// The registered observer, if it is still alive.
    pub fn get(&self) -> Option<Arc<dyn SessionObserver>> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }

    /// Clone of the stored weak reference, alive or not.
    pub fn weak(&self) -> Option<Weak<dyn SessionObserver>> {
        self.observer.clone()
    }

    /// Run `f` against the live observer, if any.
    pub fn notify(&self, f: impl FnOnce(&dyn SessionObserver)) {
        if let Some(observer) = self.get() {
            f(observer.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use std::sync::Mutex;

    #[test]
    fn message_without_destination_uses_empty_string() {
        let frame = decode("MESSAGE\nmessage-id:1\n\nplain text\0").unwrap();
        match route(frame) {
            Inbound::Message(m) => {
                assert_eq!(m.destination, "");
                assert_eq!(m.body, "plain text");
                assert!(m.json.is_none());
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn receipt_without_id_is_ignored() {
        let frame = decode("RECEIPT\n\n\0").unwrap();
        assert_eq!(route(frame), Inbound::Ignored);
    }

    #[test]
    fn error_without_message_is_ignored() {
        let frame = decode("ERROR\n\nsomething broke\0").unwrap();
        assert_eq!(route(frame), Inbound::Ignored);
    }

    #[test]
    fn unknown_command_is_ignored() {
        let frame = decode("NACK\nid:1\n\n\0").unwrap();
        assert_eq!(route(frame), Inbound::Ignored);
    }

    #[test]
    fn connected_without_session_header() {
        let frame = decode("CONNECTED\nversion:1.2\n\n\0").unwrap();
        assert_eq!(route(frame), Inbound::Connected { session: None });
    }

    #[derive(Default)]
    struct Counter {
        pings: Mutex<u32>,
    }

    impl SessionObserver for Counter {
        fn on_ping(&self) {
            *self.pings.lock().unwrap() += 1;
        }
    }

    #[test]
    fn slot_skips_dropped_observer() {
        let mut slot = ObserverSlot::default();
        slot.notify(|o| o.on_ping());

        let counter = Arc::new(Counter::default());
        slot.set(Arc::downgrade(&counter) as Weak<dyn SessionObserver>);
        slot.notify(|o| o.on_ping());
        assert_eq!(*counter.pings.lock().unwrap(), 1);

        drop(counter);
        assert!(slot.get().is_none());
        slot.notify(|o| o.on_ping());
    }
}

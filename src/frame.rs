use std::fmt;

/// Ordered header list as `(key, value)` pairs.
pub type Headers = Vec<(String, String)>;

/// One STOMP frame as carried in a WebSocket text message.
///
/// Headers behave as an ordered map with last-write-wins semantics: setting
/// a key that is already present replaces its value in place, so every key
/// appears at most once and keeps the position of its first assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command (e.g. CONNECT, SEND, SUBSCRIBE). Empty for a heartbeat.
    pub command: String,
    /// Headers in first-assignment order.
    pub headers: Headers,
    /// Text body, `None` when the frame carries no body
    pub body: Option<String>,
}

impl Frame {
    /// Frame for `command` with no headers and no body.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A heartbeat: empty command, no headers, no body.
    pub fn heartbeat() -> Self {
        Self::default()
    }

    /// Builder form of [`Frame::set_header`].
    ///
    /// ```
    /// use stomp_ws::Frame;
    /// let f = Frame::new("SEND").header("destination", "/a").header("destination", "/b");
    /// assert_eq!(f.headers.len(), 1);
    /// assert_eq!(f.get_header("destination"), Some("/b"));
    /// ```
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set every header from `headers` in iteration order (builder style).
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self.set_header(k, v);
        }
        self
    }

    /// Set a header in place, overwriting an existing value for the key.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((key, value)),
        }
    }

    /// Attach a text body. `content-length` is filled in by the codec.
    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Request a receipt for this frame (builder style).
    ///
    /// Sets the `receipt` header; the broker answers with a RECEIPT frame
    /// whose `receipt-id` equals `id`.
    pub fn receipt(self, id: impl Into<String>) -> Self {
        self.header("receipt", id)
    }

    /// Case-sensitive header lookup.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    /// Returns the body as a string slice, or `""` when there is no body.
    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }

    /// True for the empty frame a server sends as a heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        self.command.is_empty()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        self.headers
            .iter()
            .try_for_each(|(k, v)| writeln!(f, "{}: {}", k, v))?;
        writeln!(f, "Body ({} bytes)", self.body_str().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_overwrites_in_place() {
        let f = Frame::new("SEND")
            .header("a", "1")
            .header("b", "2")
            .header("a", "3");
        assert_eq!(
            f.headers,
            vec![
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn heartbeat_is_empty() {
        let f = Frame::heartbeat();
        assert!(f.is_heartbeat());
        assert!(f.headers.is_empty());
        assert!(f.body.is_none());
    }
}

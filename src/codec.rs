//! Text codec for STOMP frames carried in WebSocket messages.
//!
//! Each WebSocket message holds at most one frame, so the codec works on
//! whole strings instead of a streaming byte buffer.

use crate::frame::Frame;

/// Wire form of a client heartbeat (a single LF).
pub const PING: &str = "\n";

const NUL: char = '\0';

/// Encode a frame into its wire string.
///
/// Layout: `COMMAND\n`, then `key:value\n` for every header, a blank line,
/// the body (if any) and a single NUL terminator. Each header key is
/// written once; when a key was pushed more than once the last value wins
/// and the first position is kept.
///
/// When the frame has a body the `content-length` header is always set to
/// the UTF-8 byte length of that body, overriding any value the frame
/// carried. An empty body (`Some("")`) is written as `content-length:0`
/// and decodes back to `None`.
pub fn encode(frame: &Frame) -> String {
    let content_length = frame.body.as_ref().map(|b| b.len().to_string());

    let mut headers: Vec<(&str, &str)> = Vec::with_capacity(frame.headers.len() + 1);
    for (k, v) in &frame.headers {
        match headers.iter_mut().find(|(key, _)| *key == k.as_str()) {
            Some(slot) => slot.1 = v.as_str(),
            None => headers.push((k.as_str(), v.as_str())),
        }
    }
    if let Some(len) = content_length.as_deref() {
        match headers.iter_mut().find(|(key, _)| *key == "content-length") {
            Some(slot) => slot.1 = len,
            None => headers.push(("content-length", len)),
        }
    }

    let body = frame.body.as_deref().unwrap_or_default();
    let mut out = String::with_capacity(
        frame.command.len()
            + headers.iter().map(|(k, v)| k.len() + v.len() + 2).sum::<usize>()
            + body.len()
            + 3,
    );
    out.push_str(&frame.command);
    out.push('\n');
    for (k, v) in headers {
        out.push_str(k);
        out.push(':');
        out.push_str(v);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(body);
    out.push(NUL);
    out
}

/// Decode a wire string into a frame.
///
/// Returns `None` when there is nothing to process (empty input). A bare
/// `"\n"` decodes to an empty frame, the server heartbeat.
///
/// Lines before the first blank line are headers split on the first `:`;
/// the rest of the line, colons included, is the value. Lines after the
/// blank line are joined without separators to form the body and a single
/// trailing NUL is stripped. An empty body decodes to `None`.
pub fn decode(input: &str) -> Option<Frame> {
    let mut lines = input.split('\n').peekable();
    if lines.peek() == Some(&"") {
        lines.next();
    }
    let command = strip_cr(lines.next()?);

    let mut frame = Frame::new(command);
    let mut in_body = false;
    let mut body = String::new();
    for line in lines {
        if in_body {
            body.push_str(line);
            continue;
        }
        let line = strip_cr(line);
        if line.is_empty() {
            in_body = true;
            continue;
        }
        match line.split_once(':') {
            Some((k, v)) => frame.set_header(k, v),
            None => frame.set_header(line, ""),
        }
    }

    if body.ends_with(NUL) {
        body.pop();
    }
    if !body.is_empty() {
        frame.body = Some(body);
    }
    Some(frame)
}

/// Decode a binary message by treating it as UTF-8 text.
///
/// Invalid UTF-8 yields `None`, like any other unprocessable input.
pub fn decode_bytes(input: &[u8]) -> Option<Frame> {
    std::str::from_utf8(input).ok().and_then(decode)
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

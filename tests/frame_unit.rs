//! Unit tests for the Frame struct.

use stomp_ws::Frame;

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn frame_new_creates_empty() {
    let frame = Frame::new("SEND");
    assert_eq!(frame.command, "SEND");
    assert!(frame.headers.is_empty());
    assert!(frame.body.is_none());
}

#[test]
fn heartbeat_frame_is_empty() {
    let frame = Frame::heartbeat();
    assert!(frame.is_heartbeat());
    assert!(frame.headers.is_empty());
    assert_eq!(frame.body_str(), "");
    assert!(!Frame::new("MESSAGE").is_heartbeat());
}

// =============================================================================
// Header Semantics Tests
// =============================================================================

#[test]
fn header_last_write_wins_in_place() {
    let frame = Frame::new("SEND")
        .header("destination", "/queue/a")
        .header("content-type", "text/plain")
        .header("destination", "/queue/b");
    assert_eq!(frame.headers.len(), 2);
    assert_eq!(
        frame.headers[0],
        ("destination".to_string(), "/queue/b".to_string())
    );
    assert_eq!(frame.get_header("destination"), Some("/queue/b"));
}

#[test]
fn with_headers_applies_in_order() {
    let frame = Frame::new("SUBSCRIBE").with_headers(vec![
        ("id", "1"),
        ("ack", "client"),
        ("id", "2"),
    ]);
    assert_eq!(frame.get_header("id"), Some("2"));
    assert_eq!(frame.get_header("ack"), Some("client"));
    assert_eq!(frame.headers.len(), 2);
}

#[test]
fn get_header_is_case_sensitive() {
    let frame = Frame::new("SEND").header("Destination", "/queue/a");
    assert_eq!(frame.get_header("destination"), None);
    assert_eq!(frame.get_header("Destination"), Some("/queue/a"));
}

#[test]
fn receipt_sets_receipt_header() {
    let frame = Frame::new("SEND").receipt("r-42");
    assert_eq!(frame.get_header("receipt"), Some("r-42"));
}

#[test]
fn set_header_mutates_existing_frame() {
    let mut frame = Frame::new("ACK");
    frame.set_header("id", "m-1");
    frame.set_header("id", "m-2");
    assert_eq!(frame.headers, vec![("id".to_string(), "m-2".to_string())]);
}

// =============================================================================
// Body and Display Tests
// =============================================================================

#[test]
fn body_str_returns_text() {
    let frame = Frame::new("SEND").set_body("héllo");
    assert_eq!(frame.body.as_deref(), Some("héllo"));
    assert_eq!(frame.body_str(), "héllo");
}

#[test]
fn display_reports_body_bytes() {
    let frame = Frame::new("SEND")
        .header("destination", "/queue/a")
        .set_body("héllo");
    let s = frame.to_string();
    assert!(s.contains("Command: SEND"));
    assert!(s.contains("destination: /queue/a"));
    // é is two bytes in UTF-8
    assert!(s.contains("Body (6 bytes)"));
}

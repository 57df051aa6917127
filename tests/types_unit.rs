//! Unit tests for the public value types and errors.

use stomp_ws::session::{ACCEPT_VERSION, JSON_CONTENT_TYPE, json_headers};
use stomp_ws::{AckMode, ClientOptions, OpenRequest, SessionState, SessionStatus, StompError};

// =============================================================================
// AckMode Tests
// =============================================================================

#[test]
fn ack_mode_wire_strings() {
    assert_eq!(AckMode::Auto.as_str(), "auto");
    assert_eq!(AckMode::Client.as_str(), "client");
    assert_eq!(AckMode::ClientIndividual.as_str(), "client-individual");
    assert_eq!(AckMode::default(), AckMode::Auto);
}

#[test]
fn ack_mode_parses_only_known_values() {
    for mode in [AckMode::Auto, AckMode::Client, AckMode::ClientIndividual] {
        assert_eq!(AckMode::from_header(mode.as_str()), Some(mode));
    }
    assert_eq!(AckMode::from_header("Client"), None);
    assert_eq!(AckMode::from_header(""), None);
}

// =============================================================================
// Status Tests
// =============================================================================

#[test]
fn connecting_counts_as_connected() {
    let status = |state| SessionStatus {
        state,
        session_id: None,
    };
    assert!(!status(SessionState::Disconnected).is_connected());
    assert!(status(SessionState::Connecting).is_connected());
    assert!(status(SessionState::Connected).is_connected());
    assert!(!status(SessionState::Disconnecting).is_connected());
    assert_eq!(SessionStatus::default().state, SessionState::Disconnected);
}

#[test]
fn protocol_constants() {
    assert_eq!(ACCEPT_VERSION, "1.1,1.2");
    assert_eq!(
        json_headers(),
        vec![("content-type".to_string(), JSON_CONTENT_TYPE.to_string())]
    );
}

// =============================================================================
// OpenRequest and Options Tests
// =============================================================================

#[test]
fn open_request_builder_keeps_order() {
    let req = OpenRequest::new("wss://broker.example/stomp")
        .header("Authorization", "Bearer x")
        .header("X-Trace", "1")
        .cookie("a", "1");
    assert_eq!(req.url, "wss://broker.example/stomp");
    assert_eq!(req.headers[0].0, "Authorization");
    assert_eq!(req.headers[1].0, "X-Trace");
    assert_eq!(req.cookie_header().as_deref(), Some("a=1"));
}

#[test]
fn client_options_clamp_capacity() {
    assert_eq!(ClientOptions::default().command_capacity, 32);
    assert_eq!(
        ClientOptions::default()
            .with_command_capacity(0)
            .command_capacity,
        1
    );
    assert!(ClientOptions::default().handshake_timeout.is_none());
}

// =============================================================================
// StompError Tests
// =============================================================================

#[test]
fn stomp_error_display() {
    assert!(StompError::Closed.to_string().contains("client closed"));
    let interval = StompError::InvalidInterval("reconnect interval");
    assert_eq!(
        interval.to_string(),
        "invalid interval: reconnect interval must be non-zero"
    );
}

#[test]
fn stomp_error_from_serde() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: StompError = json_err.into();
    assert!(matches!(err, StompError::Serialization(_)));
    assert!(err.to_string().starts_with("serialization error"));
}

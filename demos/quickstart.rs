use std::sync::{Arc, Weak};
use std::time::Duration;
use stomp_ws::{
    Client, ClientOptions, OpenRequest, ReceivedMessage, SessionObserver, SessionState,
};

/// Prints everything the broker sends.
struct Printer;

impl SessionObserver for Printer {
    fn on_connected(&self) {
        println!("connected");
    }

    fn on_disconnected(&self) {
        println!("disconnected");
    }

    fn on_message(&self, message: &ReceivedMessage) {
        match &message.json {
            Some(json) => println!("[{}] json: {}", message.destination, json),
            None => println!("[{}] {}", message.destination, message.body),
        }
    }

    fn on_receipt(&self, receipt_id: &str) {
        println!("receipt {}", receipt_id);
    }

    fn on_error(&self, message: &str, detail: Option<&str>) {
        eprintln!("error: {} {}", message, detail.unwrap_or_default());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a broker with a STOMP-over-WebSocket endpoint, e.g. RabbitMQ
    // with the web_stomp plugin on ws://127.0.0.1:15674/ws.
    let client = Client::websocket(ClientOptions::default());
    let printer = Arc::new(Printer);

    client
        .open(
            OpenRequest::new("ws://127.0.0.1:15674/ws"),
            Arc::downgrade(&printer) as Weak<dyn SessionObserver>,
            Some(vec![
                ("login".into(), "guest".into()),
                ("passcode".into(), "guest".into()),
            ]),
        )
        .await?;
    tokio::time::timeout(
        Duration::from_secs(5),
        client.wait_for_state(SessionState::Connected),
    )
    .await??;
    println!("session id: {:?}", client.session_id());

    client.subscribe("/queue/test").await?;
    client
        .send_message("hello from stomp-ws", "/queue/test", None, Some("r-1"))
        .await?;
    client
        .send_json(&serde_json::json!({ "greeting": "hello", "n": 1 }), "/queue/test")
        .await?;

    tokio::time::sleep(Duration::from_secs(2)).await;

    client.disconnect().await?;
    client.wait_for_state(SessionState::Disconnected).await?;
    client.close().await;
    Ok(())
}

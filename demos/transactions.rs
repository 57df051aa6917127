use std::sync::{Arc, Weak};
use std::time::Duration;
use stomp_ws::{
    ChannelObserver, Client, ClientOptions, OpenRequest, SessionEvent, SessionObserver,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a STOMP-over-WebSocket endpoint on ws://127.0.0.1:15674/ws.
    let client = Client::websocket(
        ClientOptions::default().with_handshake_timeout(Duration::from_secs(5)),
    );
    let (observer, mut events) = ChannelObserver::new();
    let observer = Arc::new(observer);

    client
        .open(
            OpenRequest::new("ws://127.0.0.1:15674/ws"),
            Arc::downgrade(&observer) as Weak<dyn SessionObserver>,
            Some(vec![
                ("login".into(), "guest".into()),
                ("passcode".into(), "guest".into()),
            ]),
        )
        .await?;

    match events.recv().await {
        Some(SessionEvent::Connected) => println!("connected"),
        other => {
            eprintln!("could not connect: {:?}", other);
            return Ok(());
        }
    }

    // Both messages are delivered when the transaction commits.
    let tx_id = "tx-example-1";
    client.begin(tx_id).await?;
    for body in ["message 1 in transaction", "message 2 in transaction"] {
        client
            .send_message(
                body,
                "/queue/test",
                Some(vec![("transaction".into(), tx_id.into())]),
                None,
            )
            .await?;
    }
    client.commit(tx_id).await?;
    println!("transaction {} committed", tx_id);

    // Nothing is delivered for an aborted transaction.
    let tx_id_2 = "tx-example-2";
    client.begin(tx_id_2).await?;
    client
        .send_message(
            "this message will be aborted",
            "/queue/test",
            Some(vec![("transaction".into(), tx_id_2.into())]),
            Some("abort-check"),
        )
        .await?;
    client.abort(tx_id_2).await?;
    println!("transaction {} aborted", tx_id_2);

    // Disconnect automatically after a short grace period.
    client.auto_disconnect(Duration::from_secs(1)).await?;
    while let Some(event) = events.recv().await {
        println!("{:?}", event);
        if event == SessionEvent::Disconnected {
            break;
        }
    }
    client.close().await;
    Ok(())
}

use chrono::Local;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Weak};
use std::time::Duration;
use stomp_ws::{
    AckMode, ChannelObserver, Client, ClientOptions, OpenRequest, SessionEvent, SessionObserver,
};
use tokio::sync::mpsc;

use super::args::Cli;
use super::commands::{CommandResult, execute_command, print_help};
use super::exit_codes;
use super::state::{SharedLog, new_shared_log};

/// Run the interactive prompt until `quit`, end of input, or the session
/// ends for good.
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    println!("Connecting to {}...", cli.url);

    let options =
        ClientOptions::default().with_handshake_timeout(Duration::from_secs(cli.connect_timeout));
    let client = Client::websocket(options);

    let (observer, mut events) = ChannelObserver::new();
    let observer = Arc::new(observer);
    let weak = Arc::downgrade(&observer) as Weak<dyn SessionObserver>;

    let request = open_request(cli);
    let headers = cli.connect_headers();
    client
        .open(request.clone(), weak.clone(), Some(headers.clone()))
        .await
        .map_err(|e| (e.to_string(), exit_codes::NETWORK_ERROR))?;

    wait_connected(&mut events).await?;
    println!("Connected.");

    let log = new_shared_log(cli.url.clone());
    {
        let mut log = log.lock().await;
        for dest in &cli.subscribe {
            log.record_subscription(dest, AckMode::Auto);
        }
    }
    on_connected(&client, &log).await;

    if let Some(secs) = cli.reconnect {
        client
            .reconnect(request, weak, headers, Duration::from_secs(secs))
            .await
            .map_err(|e| (e.to_string(), exit_codes::NETWORK_ERROR))?;
    }
    if let Some(secs) = cli.auto_disconnect {
        client
            .auto_disconnect(Duration::from_secs(secs))
            .await
            .map_err(|e| (e.to_string(), exit_codes::NETWORK_ERROR))?;
    }

    // Signalled when the session is gone and nothing will bring it back.
    let (ended_tx, mut ended_rx) = mpsc::channel::<()>(1);
    tokio::spawn(pump_events(
        events,
        client.clone(),
        log.clone(),
        cli.reconnect.is_some(),
        ended_tx,
    ));

    // Channel to receive user commands from stdin reader
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if line_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!();
    print_help();
    println!();

    loop {
        prompt();
        let line = tokio::select! {
            line = line_rx.recv() => match line {
                Some(l) => l,
                None => break,
            },
            _ = ended_rx.recv() => {
                println!("Session ended.");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        match execute_command(&line, &client, &log).await {
            CommandResult::Ok => {}
            CommandResult::Quit => {
                println!("Disconnecting...");
                break;
            }
            CommandResult::Error(msg) => eprintln!("{}", msg),
        }
    }

    if cli.summary {
        println!("{}", log.lock().await.summary());
    }
    client.close().await;
    Ok(())
}

fn open_request(cli: &Cli) -> OpenRequest {
    let mut request = OpenRequest::new(cli.url.clone());
    for (k, v) in &cli.headers {
        request = request.header(k.clone(), v.clone());
    }
    for (k, v) in &cli.cookies {
        request = request.cookie(k.clone(), v.clone());
    }
    request
}

/// Wait for CONNECTED, turning an early close into an exit code.
async fn wait_connected(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<(), (String, u8)> {
    let mut failure: Option<(String, u8)> = None;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected => return Ok(()),
            SessionEvent::Error { message, detail } => {
                // Transport errors carry an empty detail.
                failure = Some(match detail.filter(|d| !d.is_empty()) {
                    Some(detail) => (
                        format!("Broker rejected session: {} ({})", message, detail),
                        exit_codes::PROTOCOL_ERROR,
                    ),
                    None => (
                        format!("Connection failed: {}", message),
                        exit_codes::NETWORK_ERROR,
                    ),
                });
            }
            SessionEvent::Disconnected => {
                return Err(failure.unwrap_or_else(|| {
                    (
                        "Connection closed before CONNECTED".to_string(),
                        exit_codes::NETWORK_ERROR,
                    )
                }));
            }
            _ => {}
        }
    }
    Err(("Client stopped".to_string(), exit_codes::NETWORK_ERROR))
}

/// Record the new session and subscribe every destination in the log,
/// both `--subscribe` ones and those added at the prompt.
async fn on_connected(client: &Client, log: &SharedLog) {
    let wanted = {
        let mut log = log.lock().await;
        log.connects += 1;
        log.session_id = client.session_id();
        log.resubscriptions()
    };
    for (dest, ack) in wanted {
        match client.subscribe_with_ack(&dest, ack).await {
            Ok(()) => println!("Subscribed to: {}", dest),
            Err(e) => eprintln!("Failed to subscribe to '{}': {}", dest, e),
        }
    }
}

async fn pump_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    client: Client,
    log: SharedLog,
    reconnecting: bool,
    ended: mpsc::Sender<()>,
) {
    while let Some(event) = events.recv().await {
        let now = Local::now().format("%H:%M:%S").to_string();
        match event {
            SessionEvent::Connected => {
                println!("\n{} [connected]", now);
                on_connected(&client, &log).await;
            }
            SessionEvent::Disconnected => {
                println!("\n{} [disconnected]", now);
                if !reconnecting {
                    let _ = ended.send(()).await;
                    break;
                }
            }
            SessionEvent::Message(message) => {
                log.lock()
                    .await
                    .record_message(&message.destination, &message.body);
                println!("\n{} [{}] MESSAGE", now, message.destination);
                if let Some(id) = message.header("message-id") {
                    println!("  message-id: {}", id);
                }
                match &message.json {
                    Some(json) => println!("  {}", json),
                    None => println!("  {}", message.body),
                }
            }
            SessionEvent::Receipt(id) => {
                log.lock().await.receipts += 1;
                println!("\n{} [receipt] {}", now, id);
            }
            SessionEvent::Error { message, detail } => {
                log.lock().await.errors += 1;
                match detail.filter(|d| !d.is_empty()) {
                    Some(detail) => eprintln!("\n{} [ERROR] {}: {}", now, message, detail),
                    None => eprintln!("\n{} [ERROR] {}", now, message),
                }
            }
            SessionEvent::Ping => {
                log.lock().await.pings += 1;
                tracing::debug!("heartbeat from broker");
                continue;
            }
        }
        prompt();
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

use stomp_ws::{AckMode, Client, SessionState};

use super::state::SharedLog;

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send { destination: String, body: String },
    Json { destination: String, body: String },
    Subscribe { destination: String, ack: AckMode },
    Unsubscribe(String),
    Begin(String),
    Commit(String),
    Abort(String),
    Ack(String),
    Disconnect,
    Status,
    Summary,
    History,
    Help,
    Quit,
    Empty,
}

/// Result of executing a command
pub enum CommandResult {
    Ok,
    Quit,
    Error(String),
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.trim().splitn(3, ' ').collect();
    let arg = |i: usize, usage: &str| -> Result<String, String> {
        parts
            .get(i)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| format!("Usage: {}", usage))
    };

    match parts[0] {
        "" => Ok(Command::Empty),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        "send" => Ok(Command::Send {
            destination: arg(1, "send <destination> <message>")?,
            body: arg(2, "send <destination> <message>")?,
        }),
        "json" => Ok(Command::Json {
            destination: arg(1, "json <destination> <json>")?,
            body: arg(2, "json <destination> <json>")?,
        }),
        "sub" | "subscribe" => {
            let destination = arg(1, "sub <destination> [auto|client|client-individual]")?;
            let ack = match parts.get(2) {
                Some(mode) => AckMode::from_header(mode.trim())
                    .ok_or_else(|| format!("Unknown ack mode: {}", mode))?,
                None => AckMode::Auto,
            };
            Ok(Command::Subscribe { destination, ack })
        }
        "unsub" | "unsubscribe" => Ok(Command::Unsubscribe(arg(1, "unsub <destination>")?)),
        "begin" => Ok(Command::Begin(arg(1, "begin <transaction>")?)),
        "commit" => Ok(Command::Commit(arg(1, "commit <transaction>")?)),
        "abort" => Ok(Command::Abort(arg(1, "abort <transaction>")?)),
        "ack" => Ok(Command::Ack(arg(1, "ack <message-id>")?)),
        "disconnect" => Ok(Command::Disconnect),
        "status" => Ok(Command::Status),
        "summary" => Ok(Command::Summary),
        "history" => Ok(Command::History),
        "help" | "?" => Ok(Command::Help),
        other => Err(format!("Unknown command: {}. Type 'help' for commands.", other)),
    }
}

/// Parse and execute a command
pub async fn execute_command(line: &str, client: &Client, log: &SharedLog) -> CommandResult {
    let command = match parse(line) {
        Ok(c) => c,
        Err(msg) => return CommandResult::Error(msg),
    };

    let sent = match command {
        Command::Empty => Ok(()),
        Command::Quit => return CommandResult::Quit,
        Command::Send { destination, body } => {
            client.send_message(&body, &destination, None, None).await
        }
        Command::Json { destination, body } => {
            let value: serde_json::Value = match serde_json::from_str(&body) {
                Ok(v) => v,
                Err(e) => return CommandResult::Error(format!("Invalid JSON: {}", e)),
            };
            client.send_json(&value, &destination).await
        }
        Command::Subscribe { destination, ack } => {
            let sent = client.subscribe_with_ack(&destination, ack).await;
            if sent.is_ok() {
                log.lock().await.record_subscription(&destination, ack);
            }
            sent
        }
        Command::Unsubscribe(destination) => {
            let sent = client.unsubscribe(&destination).await;
            if sent.is_ok() {
                log.lock().await.record_unsubscription(&destination);
            }
            sent
        }
        Command::Begin(tx) => client.begin(&tx).await,
        Command::Commit(tx) => client.commit(&tx).await,
        Command::Abort(tx) => client.abort(&tx).await,
        Command::Ack(id) => client.ack(&id).await,
        Command::Disconnect => client.disconnect().await,
        Command::Status => {
            let status = client.status();
            let state = match status.state {
                SessionState::Disconnected => "disconnected",
                SessionState::Connecting => "connecting",
                SessionState::Connected => "connected",
                SessionState::Disconnecting => "disconnecting",
            };
            println!(
                "{} (session {})",
                state,
                status.session_id.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        Command::Summary => {
            println!("{}", log.lock().await.summary());
            Ok(())
        }
        Command::History => {
            println!("{}", log.lock().await.history());
            Ok(())
        }
        Command::Help => {
            print_help();
            Ok(())
        }
    };

    match sent {
        Ok(()) => CommandResult::Ok,
        Err(e) => CommandResult::Error(format!("Error: {}", e)),
    }
}

/// Print help text
pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <message>   - Send a text message");
    println!("  json <destination> <json>      - Send a JSON message");
    println!("  sub <destination> [ack-mode]   - Subscribe (auto, client, client-individual)");
    println!("  unsub <destination>            - Unsubscribe");
    println!("  begin|commit|abort <tx>        - Transaction control");
    println!("  ack <message-id>               - Acknowledge a message");
    println!("  disconnect                     - Send DISCONNECT and close the socket");
    println!("  status                         - Show the session state");
    println!("  summary | history              - Session statistics / received messages");
    println!("  quit                           - Exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_keeps_spaces_in_body() {
        assert_eq!(
            parse("send /queue/a hello there").unwrap(),
            Command::Send {
                destination: "/queue/a".into(),
                body: "hello there".into()
            }
        );
    }

    #[test]
    fn subscribe_parses_ack_mode() {
        assert_eq!(
            parse("sub /queue/a client").unwrap(),
            Command::Subscribe {
                destination: "/queue/a".into(),
                ack: AckMode::Client
            }
        );
        assert!(parse("sub /queue/a sometimes").is_err());
    }

    #[test]
    fn missing_arguments_report_usage() {
        let err = parse("send /queue/a").unwrap_err();
        assert!(err.starts_with("Usage: send"));
        assert_eq!(parse("   ").unwrap(), Command::Empty);
        assert!(parse("frobnicate").is_err());
    }
}

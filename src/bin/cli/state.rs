use chrono::{DateTime, Local};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use stomp_ws::AckMode;
use tokio::sync::Mutex;

/// Messages kept for the `history` command.
pub const MAX_MESSAGES: usize = 200;

/// One received MESSAGE, as shown by `history`.
#[derive(Debug, Clone)]
pub struct LoggedMessage {
    pub timestamp: DateTime<Local>,
    pub destination: String,
    pub body: String,
}

/// What happened during the CLI session.
pub struct SessionLog {
    pub start_time: DateTime<Local>,
    pub url: String,
    pub session_id: Option<String>,
    /// Destination -> messages received.
    pub destinations: BTreeMap<String, u64>,
    /// Live subscriptions, restored after every reconnect.
    pub subscribed: BTreeMap<String, AckMode>,
    pub pings: u64,
    pub receipts: u64,
    pub errors: u64,
    pub connects: u64,
    pub messages: VecDeque<LoggedMessage>,
}

impl SessionLog {
    pub fn new(url: String) -> Self {
        Self {
            start_time: Local::now(),
            url,
            session_id: None,
            destinations: BTreeMap::new(),
            subscribed: BTreeMap::new(),
            pings: 0,
            receipts: 0,
            errors: 0,
            connects: 0,
            messages: VecDeque::with_capacity(MAX_MESSAGES),
        }
    }

    pub fn record_subscription(&mut self, destination: &str, ack: AckMode) {
        self.destinations.entry(destination.to_string()).or_default();
        self.subscribed.insert(destination.to_string(), ack);
    }

    pub fn record_unsubscription(&mut self, destination: &str) {
        self.subscribed.remove(destination);
    }

    /// Subscriptions to issue again on a new session.
    pub fn resubscriptions(&self) -> Vec<(String, AckMode)> {
        self.subscribed
            .iter()
            .map(|(dest, ack)| (dest.clone(), *ack))
            .collect()
    }

    pub fn record_message(&mut self, destination: &str, body: &str) {
        *self.destinations.entry(destination.to_string()).or_default() += 1;
        self.messages.push_back(LoggedMessage {
            timestamp: Local::now(),
            destination: destination.to_string(),
            body: body.to_string(),
        });
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_front();
        }
    }

    pub fn total_messages(&self) -> u64 {
        self.destinations.values().sum()
    }

    pub fn summary(&self) -> String {
        let end_time = Local::now();
        let secs = end_time.signed_duration_since(self.start_time).num_seconds();

        let mut lines = vec![
            format!("  URL:        {}", self.url),
            format!(
                "  Session:    {}",
                self.session_id.as_deref().unwrap_or("(none)")
            ),
            format!("  Started:    {}", self.start_time.format("%Y-%m-%d %H:%M:%S")),
            format!("  Duration:   {}m {}s", secs / 60, secs % 60),
            format!("  Connects:   {}", self.connects),
            String::new(),
            "  Destinations:".to_string(),
        ];
        let width = self
            .destinations
            .keys()
            .map(|d| d.len())
            .max()
            .unwrap_or(5)
            .max(5);
        for (dest, count) in &self.destinations {
            lines.push(format!("    {:width$} {:>6}", dest, count, width = width));
        }
        lines.push(format!(
            "    {:width$} {:>6}",
            "Total",
            self.total_messages(),
            width = width
        ));
        lines.push(String::new());
        lines.push(format!(
            "  Pings: {}  Receipts: {}  Errors: {}",
            self.pings, self.receipts, self.errors
        ));
        lines.join("\n")
    }

    pub fn history(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                format!(
                    "  {} [{}] {}",
                    m.timestamp.format("%H:%M:%S"),
                    m.destination,
                    m.body
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub type SharedLog = Arc<Mutex<SessionLog>>;

pub fn new_shared_log(url: String) -> SharedLog {
    Arc::new(Mutex::new(SessionLog::new(url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_counted_per_destination() {
        let mut log = SessionLog::new("ws://localhost/ws".into());
        log.record_subscription("/topic/idle", AckMode::Auto);
        log.record_message("/topic/a", "one");
        log.record_message("/topic/a", "two");
        assert_eq!(log.destinations["/topic/a"], 2);
        assert_eq!(log.destinations["/topic/idle"], 0);
        assert_eq!(log.total_messages(), 2);
        assert!(log.summary().contains("/topic/idle"));
        assert!(log.history().contains("[/topic/a] two"));
    }

    #[test]
    fn resubscriptions_follow_sub_and_unsub() {
        let mut log = SessionLog::new("ws://localhost/ws".into());
        log.record_subscription("/topic/cli", AckMode::Auto);
        log.record_subscription("/queue/typed", AckMode::Client);
        log.record_subscription("/queue/gone", AckMode::Auto);
        log.record_unsubscription("/queue/gone");
        assert_eq!(
            log.resubscriptions(),
            vec![
                ("/queue/typed".to_string(), AckMode::Client),
                ("/topic/cli".to_string(), AckMode::Auto),
            ]
        );
        // Counts survive an unsubscribe.
        assert!(log.destinations.contains_key("/queue/gone"));
    }

    #[test]
    fn history_is_bounded() {
        let mut log = SessionLog::new("ws://localhost/ws".into());
        for i in 0..(MAX_MESSAGES + 5) {
            log.record_message("/q", &i.to_string());
        }
        assert_eq!(log.messages.len(), MAX_MESSAGES);
        assert_eq!(log.messages.front().map(|m| m.body.as_str()), Some("5"));
    }
}

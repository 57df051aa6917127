use std::collections::{HashMap, HashSet};

/// Subscription acknowledgement modes as defined by STOMP 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    /// The value of the `ack` header for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }

    /// Parse an `ack` header value. Unknown values yield `None`.
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(AckMode::Auto),
            "client" => Some(AckMode::Client),
            "client-individual" => Some(AckMode::ClientIndividual),
            _ => None,
        }
    }
}

/// A subscription as recorded locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Subscription id sent in the `id` header.
    pub id: String,
    pub destination: String,
    pub ack: AckMode,
}

/// Local bookkeeping of active subscriptions and open transactions.
///
/// The broker is authoritative for both; the registry only makes misuse
/// visible (duplicate subscribe, unsubscribe of an unknown id, commit of a
/// transaction never begun). Every frame is sent regardless of what the
/// registry reports.
#[derive(Debug, Default)]
pub struct Registry {
    subscriptions: HashMap<String, Subscription>,
    transactions: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription. Returns the entry it replaced, if any.
    pub fn add_subscription(&mut self, subscription: Subscription) -> Option<Subscription> {
        self.subscriptions
            .insert(subscription.id.clone(), subscription)
    }

    /// Forget a subscription. Returns `None` when the id was unknown.
    pub fn remove_subscription(&mut self, id: &str) -> Option<Subscription> {
        self.subscriptions.remove(id)
    }

    pub fn subscription(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.get(id)
    }

    pub fn is_subscribed(&self, id: &str) -> bool {
        self.subscriptions.contains_key(id)
    }

    /// Iterate over all active subscriptions (unordered).
    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    /// Mark a transaction open. Returns `false` if it already was.
    pub fn begin(&mut self, transaction: &str) -> bool {
        self.transactions.insert(transaction.to_string())
    }

    /// Close a transaction (commit or abort). Returns `false` if it was
    /// not open.
    pub fn finish(&mut self, transaction: &str) -> bool {
        self.transactions.remove(transaction)
    }

    pub fn is_open(&self, transaction: &str) -> bool {
        self.transactions.contains(transaction)
    }

    /// Drop everything; used when the session resets.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.transactions.clear();
    }
}

use clap::Parser;

#[derive(Parser)]
#[command(name = "stomp-ws")]
#[command(version)]
#[command(about = "Interactive STOMP client over WebSocket")]
pub struct Cli {
    /// WebSocket endpoint of the broker (ws:// or wss://)
    #[arg(short, long, default_value = "ws://127.0.0.1:15674/ws")]
    pub url: String,

    /// Login sent in the CONNECT frame
    #[arg(short, long)]
    pub login: Option<String>,

    /// Passcode sent in the CONNECT frame
    #[arg(short, long)]
    pub passcode: Option<String>,

    /// Virtual host sent in the CONNECT frame
    #[arg(long)]
    pub host: Option<String>,

    /// Extra handshake header as key=value (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_pair)]
    pub headers: Vec<(String, String)>,

    /// Handshake cookie as name=value (repeatable)
    #[arg(short, long = "cookie", value_parser = parse_pair)]
    pub cookies: Vec<(String, String)>,

    /// Destinations to subscribe to once connected (repeatable)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Re-open the session every N seconds while it is down
    #[arg(long, value_name = "SECS")]
    pub reconnect: Option<u64>,

    /// Disconnect after N seconds
    #[arg(long, value_name = "SECS")]
    pub auto_disconnect: Option<u64>,

    /// Give up on the WebSocket handshake after N seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Print a session summary on exit
    #[arg(long)]
    pub summary: bool,
}

impl Cli {
    /// CONNECT headers built from the credential flags.
    pub fn connect_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(login) = &self.login {
            headers.push(("login".to_string(), login.clone()));
        }
        if let Some(passcode) = &self.passcode {
            headers.push(("passcode".to_string(), passcode.clone()));
        }
        if let Some(host) = &self.host {
            headers.push(("host".to_string(), host.clone()));
        }
        headers
    }
}

/// Parse `key=value`.
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

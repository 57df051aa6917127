pub mod args;
pub mod commands;
pub mod plain;
pub mod state;

/// Exit codes for different error conditions
pub mod exit_codes {
    /// Successful execution
    pub const SUCCESS: u8 = 0;
    /// The session could not be established or was lost
    pub const NETWORK_ERROR: u8 = 1;
    /// The broker rejected the session with an ERROR frame
    pub const PROTOCOL_ERROR: u8 = 3;
}

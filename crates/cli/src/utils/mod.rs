//! Argument parsing shared by the sm-tool commands

use cardlink_secure_messaging::{SecureMessaging, SendSequenceCounter, SessionKeys};
use clap::Args;
use std::error::Error;

/// Session keys and starting counter for a secure messaging session
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// AES-128 encryption key in hex
    #[arg(long, required = true)]
    pub enc: String,

    /// AES-128 MAC key in hex
    #[arg(long, required = true)]
    pub mac: String,

    /// Counter value before the first wrap or unwrap
    #[arg(long, default_value_t = 0)]
    pub counter: u128,
}

impl SessionArgs {
    /// Open a session from the arguments
    pub fn session(&self) -> Result<SecureMessaging, Box<dyn Error>> {
        let keys = SessionKeys::from_slices(&parse_hex(&self.enc)?, &parse_hex(&self.mac)?)?;
        Ok(SecureMessaging::with_counter(
            keys,
            SendSequenceCounter::from_value(self.counter),
        ))
    }
}

/// Decode hex, ignoring whitespace and `:` separators
pub fn parse_hex(input: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    hex::decode(digits).map_err(|e| format!("invalid hex '{input}': {e}").into())
}

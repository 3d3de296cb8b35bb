//! Logical channel addressing

use cardlink_apdu_core::{ApduCommand, Command, rewrite_for_channel};
use std::error::Error;
use tracing::debug;

use crate::utils::parse_hex;

/// Rewrite a command for `channel` and return its wire hex
pub fn channel_command(apdu: &str, channel: u8) -> Result<String, Box<dyn Error>> {
    let command = Command::from_bytes(&parse_hex(apdu)?)?;
    let rewritten = rewrite_for_channel(&command, channel)?;
    debug!(
        "CLA {:02X} -> {:02X} on channel {channel}",
        command.cla,
        rewritten.class()
    );
    Ok(hex::encode_upper(rewritten.to_bytes()?))
}

//! Offline secure messaging wrap and unwrap

use cardlink_apdu_core::{ApduCommand, Command, Response};
use std::error::Error;
use tracing::{debug, info};

use crate::utils::{SessionArgs, parse_hex};

/// Wrap each command in order and return the wire hex of each
pub fn protect_command(
    session: &SessionArgs,
    apdus: &[String],
) -> Result<Vec<String>, Box<dyn Error>> {
    let mut sm = session.session()?;
    apdus
        .iter()
        .map(|apdu| {
            let command = Command::from_bytes(&parse_hex(apdu)?)?;
            let protected = sm.encrypt(&command)?;
            debug!(ssc = %sm.counter(), "Protected command");
            Ok(hex::encode_upper(protected.to_bytes()?))
        })
        .collect()
}

/// Unwrap each response in order
pub fn unprotect_command(
    session: &SessionArgs,
    responses: &[String],
) -> Result<Vec<String>, Box<dyn Error>> {
    let mut sm = session.session()?;
    responses
        .iter()
        .map(|response| {
            let response = sm.decrypt(&parse_hex(response)?)?;
            debug!(ssc = %sm.counter(), "Unprotected response");
            Ok(format_response(&response))
        })
        .collect()
}

/// Wrap one command, then unwrap the response to it
pub fn exchange_command(
    session: &SessionArgs,
    apdu: &str,
    response: &str,
) -> Result<Vec<String>, Box<dyn Error>> {
    let mut sm = session.session()?;
    let command = Command::from_bytes(&parse_hex(apdu)?)?;
    let protected = sm.encrypt(&command)?;
    let response = sm.decrypt(&parse_hex(response)?)?;
    info!(ssc = %sm.counter(), "Exchange verified");

    Ok(vec![
        format!("> {}", hex::encode_upper(protected.to_bytes()?)),
        format!("< {}", format_response(&response)),
    ])
}

fn format_response(response: &Response) -> String {
    match response.payload() {
        Some(payload) => format!("{} {}", hex::encode_upper(payload), response.status()),
        None => response.status().to_string(),
    }
}

use std::collections::VecDeque;

use bytes::Bytes;
use cardlink_apdu_core::{CardTransport, TransportError};

/// Replays canned responses in order and records every command
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    pub(crate) responses: VecDeque<Bytes>,
    pub(crate) commands: Vec<Vec<u8>>,
    pub(crate) connected: bool,
    pub(crate) resets: usize,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: &[&[u8]]) -> Self {
        Self {
            responses: responses.iter().map(|r| Bytes::copy_from_slice(r)).collect(),
            commands: Vec::new(),
            connected: true,
            resets: 0,
        }
    }
}

impl CardTransport for ScriptedTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.commands.push(command.to_vec());
        self.responses.pop_front().ok_or(TransportError::Transmission)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.resets += 1;
        Ok(())
    }
}

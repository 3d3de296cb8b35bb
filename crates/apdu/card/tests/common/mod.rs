//! A card simulator that speaks ISO 7816-4 secure messaging from the card side
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use bytes::{Bytes, BytesMut};
use cardlink_apdu_core::{CardTransport, Command, LogicalChannel, TransportError};
use cardlink_secure_messaging::{
    DataObject, SendSequenceCounter, SessionKeys,
    crypto::{self, SmCounter},
    session::{PADDING_INDICATOR, SM_CLASS_BITS},
};
use hex_literal::hex;

pub const SW_SUCCESS: [u8; 2] = [0x90, 0x00];
pub const SW_CHANNEL_NOT_SUPPORTED: [u8; 2] = [0x68, 0x81];
pub const SW_SM_NOT_SUPPORTED: [u8; 2] = [0x68, 0x82];
pub const SW_SM_INCORRECT: [u8; 2] = [0x69, 0x88];
pub const SW_FUNCTION_NOT_SUPPORTED: [u8; 2] = [0x6A, 0x81];
pub const SW_INS_NOT_SUPPORTED: [u8; 2] = [0x6D, 0x00];
pub const SW_WRONG_LENGTH: [u8; 2] = [0x67, 0x00];

/// INS answered with `[channel, p1, p2]`
pub const INS_GET_DATA: u8 = 0xCA;
/// INS answered with the command data
pub const INS_ECHO: u8 = 0xEE;

pub fn keys() -> SessionKeys {
    SessionKeys::new(
        hex!("68406B4162100563D9C901A6154D2901"),
        hex!("73FF268784F72AF833FDC9464049AFC9"),
    )
}

pub fn other_keys() -> SessionKeys {
    SessionKeys::new([0x42; 16], [0x24; 16])
}

#[derive(Debug)]
pub struct SimulatedCard {
    keys: Option<SessionKeys>,
    sessions: HashMap<u8, SendSequenceCounter>,
    open: BTreeSet<u8>,
    /// Give logical channels their own secure messaging session when opened
    pub secure_logical_channels: bool,
    /// Flip a byte of the next response MAC
    pub corrupt_next_mac: bool,
    pub connected: bool,
    pub resets: usize,
    /// Every wire command received, in order
    pub received: Vec<Vec<u8>>,
}

impl SimulatedCard {
    pub fn new() -> Self {
        Self {
            keys: None,
            sessions: HashMap::new(),
            open: BTreeSet::new(),
            secure_logical_channels: false,
            corrupt_next_mac: false,
            connected: true,
            resets: 0,
            received: Vec::new(),
        }
    }

    /// A card that has completed the trusted channel on the basic channel
    pub fn with_keys(keys: SessionKeys) -> Self {
        let mut card = Self::new();
        card.keys = Some(keys);
        card.sessions.insert(0, SendSequenceCounter::new());
        card
    }

    pub fn open_channels(&self) -> Vec<u8> {
        self.open.iter().copied().collect()
    }

    fn process(&mut self, wire: &[u8]) -> Vec<u8> {
        let Ok(command) = Command::from_bytes(wire) else {
            return SW_WRONG_LENGTH.to_vec();
        };
        let channel = LogicalChannel::from_class(command.cla).number();
        if channel != 0 && !self.open.contains(&channel) {
            return SW_CHANNEL_NOT_SUPPORTED.to_vec();
        }

        if command.cla & SM_CLASS_BITS != SM_CLASS_BITS {
            let (mut data, status) = self.execute(channel, &command);
            data.extend_from_slice(&status);
            return data;
        }

        let (Some(keys), Some(ssc)) = (self.keys.clone(), self.sessions.get_mut(&channel)) else {
            return SW_SM_NOT_SUPPORTED.to_vec();
        };
        ssc.increment();
        let command_counter = ssc.to_bytes();
        ssc.increment();
        let response_counter = ssc.to_bytes();

        let Some(plain) = unwrap_command(&keys, &command_counter, &command) else {
            return SW_SM_INCORRECT.to_vec();
        };
        let (data, status) = self.execute(channel, &plain);
        let corrupt = std::mem::take(&mut self.corrupt_next_mac);
        wrap_response(&keys, &response_counter, &data, status, corrupt)
    }

    fn execute(&mut self, channel: u8, command: &Command) -> (Vec<u8>, [u8; 2]) {
        match (command.ins, command.p1) {
            (0x70, 0x00) => {
                if channel != 0 {
                    return (Vec::new(), SW_FUNCTION_NOT_SUPPORTED);
                }
                let Some(free) = (1..=LogicalChannel::MAX).find(|n| !self.open.contains(n)) else {
                    return (Vec::new(), SW_FUNCTION_NOT_SUPPORTED);
                };
                self.open.insert(free);
                if self.secure_logical_channels && self.keys.is_some() {
                    self.sessions.insert(free, SendSequenceCounter::new());
                }
                (vec![free], SW_SUCCESS)
            }
            (0x70, 0x80) => {
                if channel == 0 {
                    self.open.clear();
                    self.sessions.clear();
                } else {
                    self.open.remove(&channel);
                    self.sessions.remove(&channel);
                }
                (Vec::new(), SW_SUCCESS)
            }
            (INS_GET_DATA, _) => (vec![channel, command.p1, command.p2], SW_SUCCESS),
            (INS_ECHO, _) => {
                let mut data = command.data.as_deref().unwrap_or_default().to_vec();
                if let Some(le) = command.le {
                    data.truncate(le as usize);
                }
                (data, SW_SUCCESS)
            }
            _ => (Vec::new(), SW_INS_NOT_SUPPORTED),
        }
    }
}

/// Verify and decrypt a protected command, `None` when it does not check out
fn unwrap_command(keys: &SessionKeys, ssc: &SmCounter, command: &Command) -> Option<Command> {
    let body = command.data.as_deref().unwrap_or_default();
    let mut input = body;
    let mut encrypted = None;
    let mut le = None;

    let (mac, authenticated_len) = loop {
        let offset = body.len() - input.len();
        match DataObject::decode(&mut input).ok()? {
            DataObject::EncryptedData(value) => encrypted = Some(value),
            DataObject::ExpectedLength(value) => le = Some(expected_length(&value)?),
            DataObject::MessageAuthenticationCode(mac) => break (mac, offset),
            _ => return None,
        }
    };
    if !input.is_empty() {
        return None;
    }

    let header = [command.cla, command.ins, command.p1, command.p2];
    let expected = crypto::calculate_mac(keys.mac(), ssc, &[&header[..], &body[..authenticated_len]]);
    if !crypto::verify_mac(&expected, &mac) {
        return None;
    }

    let data = match encrypted {
        Some(value) => {
            let (&PADDING_INDICATOR, cryptogram) = value.split_first()? else {
                return None;
            };
            Some(Bytes::from(crypto::decrypt(keys.enc(), ssc, cryptogram).ok()?))
        }
        None => None,
    };

    Some(Command {
        cla: command.cla & !SM_CLASS_BITS,
        ins: command.ins,
        p1: command.p1,
        p2: command.p2,
        data,
        le,
    })
}

fn expected_length(value: &[u8]) -> Option<u32> {
    match value {
        [0x00] => Some(256),
        [le] => Some(*le as u32),
        [0x00, 0x00] => Some(65536),
        [hi, lo] => Some(u16::from_be_bytes([*hi, *lo]) as u32),
        _ => None,
    }
}

fn wrap_response(
    keys: &SessionKeys,
    ssc: &SmCounter,
    data: &[u8],
    status: [u8; 2],
    corrupt: bool,
) -> Vec<u8> {
    let mut body = BytesMut::new();
    if !data.is_empty() {
        let mut value = vec![PADDING_INDICATOR];
        value.extend_from_slice(&crypto::encrypt(keys.enc(), ssc, data));
        DataObject::EncryptedData(value.into()).encode(&mut body);
    }
    DataObject::Status(Bytes::copy_from_slice(&status)).encode(&mut body);

    let mut mac = crypto::calculate_mac(keys.mac(), ssc, &[&body[..]]);
    if corrupt {
        mac[0] ^= 0xFF;
    }
    DataObject::MessageAuthenticationCode(Bytes::copy_from_slice(&mac)).encode(&mut body);
    body.extend_from_slice(&status);
    body.to_vec()
}

impl CardTransport for SimulatedCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::Connection);
        }
        self.received.push(command.to_vec());
        Ok(Bytes::from(self.process(command)))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.resets += 1;
        self.open.clear();
        self.sessions.clear();
        Ok(())
    }
}

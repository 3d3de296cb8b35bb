//! APDU command definitions and traits
//!
//! This module provides types and traits for working with APDU commands
//! according to ISO/IEC 7816-4, in both short and extended length form.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Expected length type for APDU commands
///
/// Valid values are `1..=65536`. 256 and 65536 are the short and extended
/// encodings of "all available bytes".
pub type ExpectedLength = u32;

/// Largest expected length that fits the short encoding
pub const EXPECTED_LENGTH_WILDCARD_SHORT: ExpectedLength = 256;

/// Largest expected length that fits the extended encoding
pub const EXPECTED_LENGTH_WILDCARD_EXTENDED: ExpectedLength = 65536;

/// Largest command data field that fits the short encoding
pub const MAX_SHORT_DATA_LENGTH: usize = 255;

/// Largest command data field that fits the extended encoding
pub const MAX_EXTENDED_DATA_LENGTH: usize = 65535;

/// Core trait for APDU commands
pub trait ApduCommand {
    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data (optional)
    fn data(&self) -> Option<&[u8]>;

    /// Expected response length (optional)
    fn expected_length(&self) -> Option<ExpectedLength>;

    /// Whether this command needs the extended length encoding
    fn is_extended(&self) -> bool {
        body(self.data()).is_some_and(|data| data.len() > MAX_SHORT_DATA_LENGTH)
            || self
                .expected_length()
                .is_some_and(|le| le > EXPECTED_LENGTH_WILDCARD_SHORT)
    }

    /// Convert to raw APDU bytes
    ///
    /// Fails when the data field or Le cannot be represented, rather than
    /// truncating the length fields.
    fn to_bytes(&self) -> Result<Bytes> {
        let data = body(self.data());
        if let Some(data) = data
            && data.len() > MAX_EXTENDED_DATA_LENGTH
        {
            return Err(Error::InvalidDataLength(data.len()));
        }
        if let Some(le) = self.expected_length()
            && !(1..=EXPECTED_LENGTH_WILDCARD_EXTENDED).contains(&le)
        {
            return Err(Error::InvalidExpectedLength(le));
        }

        let extended = self.is_extended();
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.class());
        buffer.put_u8(self.instruction());
        buffer.put_u8(self.p1());
        buffer.put_u8(self.p2());

        if let Some(data) = data {
            if extended {
                buffer.put_u8(0x00);
                buffer.put_u16(data.len() as u16);
            } else {
                buffer.put_u8(data.len() as u8);
            }
            buffer.put_slice(data);
        }

        // 256 and 65536 truncate to the all-zero wildcard encodings
        if let Some(le) = self.expected_length() {
            if extended {
                if data.is_none() {
                    buffer.put_u8(0x00);
                }
                buffer.put_u16(le as u16);
            } else {
                buffer.put_u8(le as u8);
            }
        }

        Ok(buffer.freeze())
    }

    /// Calculate length of serialized command
    fn command_length(&self) -> usize {
        let extended = self.is_extended();
        let data = body(self.data());
        let mut length = 4;

        if let Some(data) = data {
            length += data.len() + if extended { 3 } else { 1 };
        }

        if self.expected_length().is_some() {
            length += match (extended, data.is_some()) {
                (false, _) => 1,
                (true, true) => 2,
                (true, false) => 3,
            };
        }

        length
    }

    /// Convert to a generic Command
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: body(self.data()).map(Bytes::copy_from_slice),
            le: self.expected_length(),
        }
    }
}

/// An empty data field is encoded as no data field at all
fn body(data: Option<&[u8]>) -> Option<&[u8]> {
    data.filter(|data| !data.is_empty())
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: ExpectedLength) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data
    pub fn new_with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: impl Into<Bytes>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Some(data.into()),
            le: None,
        }
    }

    /// Set command data
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set expected length
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// Replace the class byte
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Parse a command from raw bytes
    ///
    /// Accepts every ISO 7816-4 case: header only, short and extended Le,
    /// short and extended Lc with or without Le.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let invalid = || Error::InvalidCommandLength(bytes.len());

        let [cla, ins, p1, p2, rest @ ..] = bytes else {
            return Err(invalid());
        };
        let mut command = Self::new(*cla, *ins, *p1, *p2);

        match rest {
            // Case 1
            [] => {}
            // Case 2S
            [le] => command.le = Some(short_le(*le)),
            // Case 3E / 4E / 2E
            [0x00, ext @ ..] if ext.len() >= 2 => {
                let lc = u16::from_be_bytes([ext[0], ext[1]]) as usize;
                let tail = &ext[2..];
                if tail.is_empty() {
                    command.le = Some(extended_le(ext[0], ext[1]));
                } else if lc == 0 {
                    return Err(invalid());
                } else if tail.len() == lc {
                    command.data = Some(Bytes::copy_from_slice(tail));
                } else if tail.len() == lc + 2 {
                    command.data = Some(Bytes::copy_from_slice(&tail[..lc]));
                    command.le = Some(extended_le(tail[lc], tail[lc + 1]));
                } else {
                    return Err(invalid());
                }
            }
            // Case 3S / 4S
            [lc, tail @ ..] if *lc != 0 => {
                let lc = *lc as usize;
                if tail.len() == lc {
                    command.data = Some(Bytes::copy_from_slice(tail));
                } else if tail.len() == lc + 1 {
                    command.data = Some(Bytes::copy_from_slice(&tail[..lc]));
                    command.le = Some(short_le(tail[lc]));
                } else {
                    return Err(invalid());
                }
            }
            _ => return Err(invalid()),
        }

        Ok(command)
    }
}

const fn short_le(byte: u8) -> ExpectedLength {
    if byte == 0 {
        EXPECTED_LENGTH_WILDCARD_SHORT
    } else {
        byte as ExpectedLength
    }
}

const fn extended_le(hi: u8, lo: u8) -> ExpectedLength {
    match u16::from_be_bytes([hi, lo]) {
        0 => EXPECTED_LENGTH_WILDCARD_EXTENDED,
        le => le as ExpectedLength,
    }
}

impl ApduCommand for Command {
    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        self.le
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<Command> for Bytes {
    type Error = Error;

    fn try_from(command: Command) -> Result<Self> {
        command.to_bytes()
    }
}

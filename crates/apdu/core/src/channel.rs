//! Logical channel addressing
//!
//! ISO/IEC 7816-4 §5.1.1 carries the logical channel number in the class
//! byte. Channels 0 to 3 use the two low bits of a first interindustry CLA.
//! Channels 4 to 19 use the further interindustry form, bit 7 set and the
//! channel offset in the low nibble.

use derive_more::Display;

use crate::{ApduCommand, Command, Error, Result};

/// A validated logical channel number in `0..=19`
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalChannel(u8);

impl LogicalChannel {
    /// The basic channel, always open
    pub const BASIC: Self = Self(0);

    /// Highest addressable channel number
    pub const MAX: u8 = 19;

    /// Highest channel number encoded in the first interindustry form
    const MAX_FIRST_INTERINDUSTRY: u8 = 3;

    /// Validate a channel number
    pub const fn new(number: u8) -> Result<Self> {
        if number > Self::MAX {
            return Err(Error::InvalidChannel(number));
        }
        Ok(Self(number))
    }

    /// Channel number
    pub const fn number(&self) -> u8 {
        self.0
    }

    /// Whether this is channel 0
    pub const fn is_basic(&self) -> bool {
        self.0 == 0
    }

    /// Decode the channel a class byte addresses
    pub const fn from_class(cla: u8) -> Self {
        if cla & 0x40 != 0 {
            Self(4 + (cla & 0x0F))
        } else {
            Self(cla & 0x03)
        }
    }

    /// Encode this channel into a class byte
    ///
    /// Channels above 3 are OR-ed onto the class as is, without clearing
    /// any bit the caller already set.
    pub const fn apply_to_class(&self, cla: u8) -> u8 {
        if self.0 <= Self::MAX_FIRST_INTERINDUSTRY {
            (cla & 0xFC) | self.0
        } else {
            cla | 0x40 | (self.0 - 4)
        }
    }

    /// Copy of `command` addressed to this channel
    pub fn apply(&self, command: &impl ApduCommand) -> Command {
        let command = command.to_command();
        let cla = self.apply_to_class(command.cla);
        command.with_class(cla)
    }
}

impl TryFrom<u8> for LogicalChannel {
    type Error = Error;

    fn try_from(number: u8) -> Result<Self> {
        Self::new(number)
    }
}

impl From<LogicalChannel> for u8 {
    fn from(channel: LogicalChannel) -> Self {
        channel.0
    }
}

/// Rewrite the class byte of `command` to address logical channel `channel`
///
/// INS, P1, P2, data and Le are carried over unchanged.
pub fn rewrite_for_channel(command: &impl ApduCommand, channel: u8) -> Result<Command> {
    Ok(LogicalChannel::new(channel)?.apply(command))
}

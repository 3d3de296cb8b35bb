//! Core error type for APDU value handling

use crate::transport::TransportError;

/// Result type for core APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or addressing APDUs
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command bytes do not form any ISO 7816-4 command case
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Response bytes are too short to carry a status word
    #[error("Invalid response length: {0}")]
    InvalidResponseLength(usize),

    /// Command data longer than an extended Lc can describe
    #[error("Invalid command data length: {0}")]
    InvalidDataLength(usize),

    /// Expected length outside 1..=65536
    #[error("Invalid expected length: {0}")]
    InvalidExpectedLength(u32),

    /// Logical channel number outside 0..=19
    #[error("Invalid logical channel: {0}")]
    InvalidChannel(u8),

    /// Failure of the underlying transport
    #[error(transparent)]
    Transport(#[from] TransportError),
}

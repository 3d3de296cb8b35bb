use cardlink_apdu_core::{LogicalChannel, StatusWord, TransportError};
use thiserror::Error;

/// Result type for card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for card and channel operations
#[derive(Debug, Error)]
pub enum Error {
    /// APDU parsing or addressing errors
    #[error(transparent)]
    Apdu(#[from] cardlink_apdu_core::Error),

    /// Secure messaging wrap or unwrap errors
    #[error(transparent)]
    SecureMessaging(#[from] cardlink_secure_messaging::Error),

    /// Transport-related errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The channel was closed and cannot carry commands
    #[error("Logical channel {0} is closed")]
    ChannelClosed(LogicalChannel),

    /// The basic channel stays open for the life of the card
    #[error("The basic channel cannot be closed")]
    BasicChannelClose,

    /// The transport lost the card
    #[error("Card not connected")]
    CardNotConnected,

    /// The card answered a management command with an error status
    #[error("{context} failed with status {status}")]
    UnexpectedStatus {
        /// Command that failed
        context: &'static str,
        /// Status returned by the card
        status: StatusWord,
    },

    /// The card answered with data that cannot be used
    #[error("Invalid response: {0}")]
    InvalidResponse(&'static str),
}

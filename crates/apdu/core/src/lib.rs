//! Core types for working with smart card APDUs
//!
//! This crate provides the plain value types that the secure messaging and card
//! layers build upon:
//!
//! - Command APDUs in short and extended length form
//! - Response APDUs and status word interpretation
//! - Logical channel addressing of the class byte
//! - The [`CardTransport`] abstraction over a physical link
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod channel;
pub mod command;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use channel::{LogicalChannel, rewrite_for_channel};
pub use command::{ApduCommand, Command, ExpectedLength};
pub use response::Response;
pub use response::status::StatusWord;
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Error, LogicalChannel, Response, Result, channel::rewrite_for_channel,
        command::ApduCommand, response::status::StatusWord, transport::CardTransport,
    };
}

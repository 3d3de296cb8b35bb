//! Card and logical channel management over a [`CardTransport`]
//!
//! [`Card`] wraps a transport and hands out [`CardChannel`]s. Channels rewrite
//! the class byte for their logical channel and, once session keys from a
//! trusted channel are attached, protect every exchange with secure messaging.
//!
//! [`CardTransport`]: cardlink_apdu_core::CardTransport
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod card;
mod channel;
mod config;
mod error;

#[cfg(test)]
mod test_utils;

pub use card::Card;
pub use channel::CardChannel;
pub use config::{CardConfig, DEFAULT_MAX_LENGTH};
pub use error::{Error, Result};

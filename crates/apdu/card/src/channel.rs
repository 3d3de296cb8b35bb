//! Card channels
//!
//! A [`CardChannel`] addresses one logical channel of a card. Every command
//! sent through it has its class byte rewritten for the channel and, once a
//! secure messaging session is attached, is wrapped before it reaches the
//! transport and unwrapped when the answer comes back.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use cardlink_apdu_core::{ApduCommand, CardTransport, Command, LogicalChannel, Response};
use cardlink_secure_messaging::{SecureMessaging, SessionKeys};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{CardConfig, Error, Result};

/// MANAGE CHANNEL instruction
pub(crate) const INS_MANAGE_CHANNEL: u8 = 0x70;
/// MANAGE CHANNEL P1 to open a channel
pub(crate) const P1_OPEN: u8 = 0x00;
/// MANAGE CHANNEL P1 to close a channel
pub(crate) const P1_CLOSE: u8 = 0x80;

/// Bumped by the card each time it resets its channel state
pub(crate) type Generation = Arc<AtomicU64>;

/// One logical channel of a card
#[derive(Debug)]
pub struct CardChannel<T: CardTransport> {
    channel: LogicalChannel,
    transport: Arc<Mutex<T>>,
    generation: Generation,
    opened_in: u64,
    secure_messaging: Option<SecureMessaging>,
    config: CardConfig,
    closed: bool,
}

impl<T: CardTransport> CardChannel<T> {
    pub(crate) fn new(
        channel: LogicalChannel,
        transport: Arc<Mutex<T>>,
        generation: Generation,
        config: CardConfig,
    ) -> Self {
        let opened_in = generation.load(Ordering::Acquire);
        Self {
            channel,
            transport,
            generation,
            opened_in,
            secure_messaging: None,
            config,
            closed: false,
        }
    }

    /// A logical channel is gone once the card resets its channel state
    fn is_revoked(&self) -> bool {
        !self.channel.is_basic() && self.generation.load(Ordering::Acquire) != self.opened_in
    }

    fn mark_closed(&mut self) {
        self.closed = true;
        self.end_secure_messaging();
    }

    /// Channel this handle addresses
    pub const fn channel_number(&self) -> LogicalChannel {
        self.channel
    }

    /// Whether the channel has been closed, by this handle or by a card reset
    pub fn is_closed(&self) -> bool {
        self.closed || self.is_revoked()
    }

    /// Whether commands are wrapped with secure messaging
    pub fn is_secure_messaging_active(&self) -> bool {
        self.secure_messaging.is_some() && !self.is_closed()
    }

    /// Start a fresh secure messaging session on this channel
    ///
    /// Replaces any session already attached, resetting the counter.
    pub fn establish_secure_messaging(&mut self, keys: SessionKeys) {
        debug!(channel = %self.channel, "Secure messaging established");
        self.secure_messaging = Some(SecureMessaging::new(keys));
    }

    /// Drop the secure messaging session, if any
    pub(crate) fn end_secure_messaging(&mut self) {
        if self.secure_messaging.take().is_some() {
            debug!(channel = %self.channel, "Secure messaging ended");
        }
    }

    /// Largest command APDU the link accepts
    pub const fn max_message_length(&self) -> usize {
        self.config.max_message_length
    }

    /// Largest response APDU the link returns
    pub const fn max_response_length(&self) -> usize {
        self.config.max_response_length
    }

    /// Whether the link carries extended length APDUs
    pub const fn is_extended_length_supported(&self) -> bool {
        self.config.is_extended_length_supported()
    }

    /// Send a command on this channel and return the card's plain response
    ///
    /// The transport stays locked from wrapping the command to unwrapping the
    /// response, so the secure messaging counter follows the wire order.
    pub fn transmit(&mut self, command: &impl ApduCommand) -> Result<Response> {
        if self.is_closed() {
            self.mark_closed();
            return Err(Error::ChannelClosed(self.channel));
        }

        let command = if self.channel.is_basic() {
            command.to_command()
        } else {
            self.channel.apply(command)
        };

        let mut transport = self.transport.lock();
        if self.is_revoked() {
            drop(transport);
            self.mark_closed();
            return Err(Error::ChannelClosed(self.channel));
        }
        if !transport.is_connected() {
            return Err(Error::CardNotConnected);
        }

        let response = match self.secure_messaging.as_mut() {
            Some(sm) => {
                let wrapped = sm.encrypt(&command)?;
                let raw = transport.transmit_raw(&wrapped.to_bytes()?)?;
                sm.decrypt(&raw).inspect_err(|e| {
                    warn!(channel = %self.channel, error = %e, "Failed to unwrap response");
                })?
            }
            None => Response::from_bytes(&transport.transmit_raw(&command.to_bytes()?)?)?,
        };
        drop(transport);

        debug!(
            channel = %self.channel,
            ins = format_args!("{:#04x}", command.ins),
            status = %response.status(),
            "Command completed"
        );
        Ok(response)
    }

    /// Send a raw command APDU on this channel and return the raw plain response
    pub fn transmit_bytes(&mut self, command: &[u8]) -> Result<Bytes> {
        let command = Command::from_bytes(command)?;
        Ok(self.transmit(&command)?.to_bytes())
    }

    /// Close this logical channel with MANAGE CHANNEL
    ///
    /// The handle is unusable afterwards even when the card refuses the close.
    pub fn close(&mut self) -> Result<()> {
        if self.channel.is_basic() {
            return Err(Error::BasicChannelClose);
        }
        if self.is_closed() {
            self.mark_closed();
            return Err(Error::ChannelClosed(self.channel));
        }

        let result = self.transmit(&Command::new(0x00, INS_MANAGE_CHANNEL, P1_CLOSE, 0x00));
        self.mark_closed();

        let response = result?;
        if !response.is_success() {
            warn!(channel = %self.channel, status = %response.status(), "Card refused to close channel");
            return Err(Error::UnexpectedStatus {
                context: "MANAGE CHANNEL close",
                status: response.status(),
            });
        }

        debug!(channel = %self.channel, "Logical channel closed");
        Ok(())
    }
}

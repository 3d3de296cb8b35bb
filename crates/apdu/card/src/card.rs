//! Card handle
//!
//! A [`Card`] owns the transport to one physical card and the basic channel.
//! Logical channels opened through it share the transport.

use std::sync::{Arc, atomic::Ordering};

use cardlink_apdu_core::{CardTransport, Command, LogicalChannel};
use cardlink_secure_messaging::SessionKeys;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    CardChannel, CardConfig, Error, Result,
    channel::{Generation, INS_MANAGE_CHANNEL, P1_CLOSE, P1_OPEN},
};

/// A connected card
#[derive(Debug)]
pub struct Card<T: CardTransport> {
    transport: Arc<Mutex<T>>,
    generation: Generation,
    config: CardConfig,
    basic: CardChannel<T>,
    session_keys: Option<SessionKeys>,
}

impl<T: CardTransport> Card<T> {
    /// Create a card over a transport with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, CardConfig::default())
    }

    /// Create a card over a transport
    pub fn with_config(transport: T, config: CardConfig) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let generation = Generation::default();
        let basic = CardChannel::new(
            LogicalChannel::BASIC,
            Arc::clone(&transport),
            Arc::clone(&generation),
            config,
        );
        Self {
            transport,
            generation,
            config,
            basic,
            session_keys: None,
        }
    }

    /// Configuration shared by all channels of this card
    pub const fn config(&self) -> &CardConfig {
        &self.config
    }

    /// Shared handle to the underlying transport
    pub const fn transport(&self) -> &Arc<Mutex<T>> {
        &self.transport
    }

    /// Whether the transport still reaches the card
    pub fn is_card_present(&self) -> bool {
        self.transport.lock().is_connected()
    }

    /// The basic channel
    pub fn open_basic_channel(&mut self) -> Result<&mut CardChannel<T>> {
        if !self.is_card_present() {
            return Err(Error::CardNotConnected);
        }
        Ok(&mut self.basic)
    }

    /// Attach session keys from a completed trusted channel establishment
    ///
    /// The basic channel starts a fresh secure messaging session right away.
    /// Logical channels opened later get their own session when the
    /// configuration asks for it.
    pub fn establish_secure_messaging(&mut self, keys: SessionKeys) {
        info!("Trusted channel established");
        self.basic.establish_secure_messaging(keys.clone());
        self.session_keys = Some(keys);
    }

    /// Open a new logical channel with MANAGE CHANNEL on the basic channel
    ///
    /// The command goes through the basic channel handle, so it is wrapped
    /// and consumes a counter step whenever the basic channel runs secure
    /// messaging.
    pub fn open_logical_channel(&mut self) -> Result<CardChannel<T>> {
        let command = Command::new_with_le(0x00, INS_MANAGE_CHANNEL, P1_OPEN, 0x00, 1);
        let response = self.open_basic_channel()?.transmit(&command)?;
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                context: "MANAGE CHANNEL open",
                status: response.status(),
            });
        }

        let number = response
            .payload()
            .as_ref()
            .and_then(|payload| payload.first().copied())
            .ok_or(Error::InvalidResponse("MANAGE CHANNEL open returned no channel number"))?;
        let channel = LogicalChannel::new(number)?;
        if channel.is_basic() {
            return Err(Error::InvalidResponse("card assigned the basic channel"));
        }

        let mut handle = CardChannel::new(
            channel,
            Arc::clone(&self.transport),
            Arc::clone(&self.generation),
            self.config,
        );
        if self.config.secure_messaging_on_logical_channels
            && let Some(keys) = &self.session_keys
        {
            handle.establish_secure_messaging(keys.clone());
        }

        debug!(%channel, "Logical channel opened");
        Ok(handle)
    }

    /// Reset the card's channel state and end secure messaging
    ///
    /// Sends MANAGE CHANNEL close on the basic channel, which closes every
    /// logical channel on the card. Like MANAGE CHANNEL open it is wrapped
    /// when the basic channel runs secure messaging. Every logical channel
    /// handle is closed and drops its session, whatever the card answers.
    /// With `reset` the transport is reset too.
    pub fn disconnect(&mut self, reset: bool) -> Result<()> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let result = self
            .basic
            .transmit(&Command::new(0x00, INS_MANAGE_CHANNEL, P1_CLOSE, 0x00));
        self.basic.end_secure_messaging();
        self.session_keys = None;

        if reset {
            debug!("Resetting transport");
            self.transport.lock().reset()?;
        }

        let response = result?;
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                context: "MANAGE CHANNEL reset",
                status: response.status(),
            });
        }
        Ok(())
    }
}

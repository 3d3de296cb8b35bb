//! Session key pair for secure messaging

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Length of an AES-128 key in bytes
pub const KEY_LENGTH: usize = 16;

/// AES-128 session keys established by the trusted channel
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    /// Encryption key
    enc: [u8; KEY_LENGTH],
    /// MAC key
    mac: [u8; KEY_LENGTH],
}

impl SessionKeys {
    /// Create a key pair from the encryption and MAC keys
    pub const fn new(enc: [u8; KEY_LENGTH], mac: [u8; KEY_LENGTH]) -> Self {
        Self { enc, mac }
    }

    /// Create a key pair from slices, which must be 16 bytes each
    pub fn from_slices(enc: &[u8], mac: &[u8]) -> Result<Self> {
        let enc = enc
            .try_into()
            .map_err(|_| Error::CryptoFailure("encryption key must be 16 bytes"))?;
        let mac = mac
            .try_into()
            .map_err(|_| Error::CryptoFailure("MAC key must be 16 bytes"))?;
        Ok(Self::new(enc, mac))
    }

    /// Get the encryption key
    pub const fn enc(&self) -> &[u8; KEY_LENGTH] {
        &self.enc
    }

    /// Get the MAC key
    pub const fn mac(&self) -> &[u8; KEY_LENGTH] {
        &self.mac
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("enc", &"<redacted>")
            .field("mac", &"<redacted>")
            .finish()
    }
}

//! APDU response definitions
//!
//! This module provides the response type shared by the plain and secure
//! messaging paths.

pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{Error, Result};
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data
    payload: Option<Bytes>,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.filter(|p| !p.is_empty()),
            status: status.into(),
        }
    }

    /// Create a success response
    pub fn success(payload: Option<Bytes>) -> Self {
        Self::new(payload, StatusWord::SUCCESS)
    }

    /// Create an error response from a status word
    pub fn error(status: impl Into<StatusWord>) -> Self {
        Self {
            payload: None,
            status: status.into(),
        }
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let [payload @ .., sw1, sw2] = data else {
            return Err(Error::InvalidResponseLength(data.len()));
        };

        trace!(
            sw1 = format_args!("{:#04x}", sw1),
            sw2 = format_args!("{:#04x}", sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self::new(
            Some(Bytes::copy_from_slice(payload)),
            StatusWord::new(*sw1, *sw2),
        ))
    }

    /// Get the response payload
    pub const fn payload(&self) -> &Option<Bytes> {
        &self.payload
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Serialize as payload followed by the status word
    pub fn to_bytes(&self) -> Bytes {
        let payload = self.payload.as_deref().unwrap_or_default();
        let mut buf = BytesMut::with_capacity(payload.len() + 2);
        buf.put_slice(payload);
        buf.put_slice(&self.status.to_bytes());
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}

//! Secure messaging data objects
//!
//! Each object is encoded as tag, BER length and value. Lengths below 0x80
//! take one byte, longer ones are prefixed by `0x80 | n` followed by `n`
//! big-endian length bytes, in the shortest form.

use bytes::{BufMut, Bytes, BytesMut};
use cardlink_apdu_core::command::{
    EXPECTED_LENGTH_WILDCARD_EXTENDED, EXPECTED_LENGTH_WILDCARD_SHORT, ExpectedLength,
};

use crate::{Error, Result};

/// Data object tags
pub mod tag {
    /// Plain value, not BER-TLV coded
    pub const PLAIN_DATA: u8 = 0x81;
    /// Padding-content indicator followed by cryptogram
    pub const ENCRYPTED_DATA: u8 = 0x87;
    /// Expected length of the unprotected response
    pub const EXPECTED_LENGTH: u8 = 0x97;
    /// Processing status
    pub const STATUS: u8 = 0x99;
    /// Cryptographic checksum
    pub const MAC: u8 = 0x8E;
}

/// Largest length field accepted when decoding, in bytes after the prefix
const MAX_LENGTH_BYTES: usize = 4;

/// A secure messaging data object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataObject {
    /// DO81
    PlainData(Bytes),
    /// DO87, first value byte is the padding indicator
    EncryptedData(Bytes),
    /// DO97
    ExpectedLength(Bytes),
    /// DO99, SW1 and SW2
    Status(Bytes),
    /// DO8E
    MessageAuthenticationCode(Bytes),
}

impl DataObject {
    /// Build the DO97 value for an expected length
    ///
    /// 256 is sent as `00`, smaller values as one byte and larger ones as two
    /// big-endian bytes, with 65536 truncating to `0000`.
    pub fn expected_length(le: ExpectedLength) -> Result<Self> {
        let value = match le {
            0 => return Err(Error::MalformedApdu("expected length must not be zero")),
            EXPECTED_LENGTH_WILDCARD_SHORT => Bytes::from_static(&[0x00]),
            1..EXPECTED_LENGTH_WILDCARD_SHORT => Bytes::copy_from_slice(&[le as u8]),
            _ if le <= EXPECTED_LENGTH_WILDCARD_EXTENDED => {
                Bytes::copy_from_slice(&(le as u16).to_be_bytes())
            }
            _ => return Err(Error::MalformedApdu("expected length exceeds 65536")),
        };
        Ok(Self::ExpectedLength(value))
    }

    /// Tag byte of this object
    pub const fn tag(&self) -> u8 {
        match self {
            Self::PlainData(_) => tag::PLAIN_DATA,
            Self::EncryptedData(_) => tag::ENCRYPTED_DATA,
            Self::ExpectedLength(_) => tag::EXPECTED_LENGTH,
            Self::Status(_) => tag::STATUS,
            Self::MessageAuthenticationCode(_) => tag::MAC,
        }
    }

    /// Value bytes of this object
    pub const fn value(&self) -> &Bytes {
        match self {
            Self::PlainData(value)
            | Self::EncryptedData(value)
            | Self::ExpectedLength(value)
            | Self::Status(value)
            | Self::MessageAuthenticationCode(value) => value,
        }
    }

    fn from_tag(tag: u8, value: Bytes) -> Result<Self> {
        Ok(match tag {
            tag::PLAIN_DATA => Self::PlainData(value),
            tag::ENCRYPTED_DATA => Self::EncryptedData(value),
            tag::EXPECTED_LENGTH => Self::ExpectedLength(value),
            tag::STATUS => Self::Status(value),
            tag::MAC => Self::MessageAuthenticationCode(value),
            _ => return Err(Error::MalformedApdu("unexpected data object tag")),
        })
    }

    /// Number of bytes [`Self::encode`] writes
    pub fn encoded_len(&self) -> usize {
        let len = self.value().len();
        1 + length_field_size(len) + len
    }

    /// Append the encoded object to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        let value = self.value();
        buf.reserve(self.encoded_len());
        buf.put_u8(self.tag());
        put_length(buf, value.len());
        buf.put_slice(value);
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one object from the front of `input`, advancing it past the object
    pub fn decode(input: &mut &[u8]) -> Result<Self> {
        let data: &[u8] = *input;
        let Some((&tag, rest)) = data.split_first() else {
            return Err(Error::MalformedApdu("missing data object"));
        };
        let (len, rest) = take_length(rest)?;
        if rest.len() < len {
            return Err(Error::MalformedApdu("truncated data object value"));
        }
        let (value, rest) = rest.split_at(len);
        let object = Self::from_tag(tag, Bytes::copy_from_slice(value))?;
        *input = rest;
        Ok(object)
    }
}

const fn length_field_size(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        1 + (usize::BITS - len.leading_zeros()).div_ceil(8) as usize
    }
}

fn put_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let width = length_field_size(len) - 1;
    buf.put_u8(0x80 | width as u8);
    buf.put_slice(&bytes[bytes.len() - width..]);
}

fn take_length(input: &[u8]) -> Result<(usize, &[u8])> {
    let [first, rest @ ..] = input else {
        return Err(Error::MalformedApdu("truncated data object length"));
    };
    match *first {
        short @ 0x00..=0x7F => Ok((short as usize, rest)),
        0x80 => Err(Error::MalformedApdu("indefinite length not allowed")),
        long => {
            let width = (long & 0x7F) as usize;
            if width > MAX_LENGTH_BYTES {
                return Err(Error::MalformedApdu("data object length field too long"));
            }
            if rest.len() < width {
                return Err(Error::MalformedApdu("truncated data object length"));
            }
            let (field, rest) = rest.split_at(width);
            let len = field.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
            Ok((len, rest))
        }
    }
}

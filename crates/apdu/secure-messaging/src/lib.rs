//! ISO/IEC 7816-4 secure messaging for AES-128 session keys
//!
//! A [`SecureMessaging`] session turns plain command APDUs into protected ones
//! and verifies and decrypts the card's protected responses:
//!
//! - command data is padded, encrypted with AES-CBC and carried in DO87
//! - the expected length is carried in DO97
//! - the class byte, header and data objects are authenticated with an
//!   AES-CMAC truncated to eight bytes and carried in DO8E
//! - the CBC IV and the MAC are bound to a 16-byte send sequence counter that
//!   is stepped before every wrap and unwrap
//!
//! ```
//! use cardlink_apdu_core::Command;
//! use cardlink_secure_messaging::{SecureMessaging, SessionKeys};
//!
//! let keys = SessionKeys::new([0x11; 16], [0x22; 16]);
//! let mut sm = SecureMessaging::new(keys);
//! let wrapped = sm.encrypt(&Command::new_with_le(0x00, 0xB0, 0x00, 0x00, 0x10)).unwrap();
//! assert_eq!(wrapped.cla, 0x0C);
//! assert_eq!(sm.counter().value(), 1);
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod crypto;
mod error;
pub mod keys;
pub mod session;
pub mod ssc;
pub mod tlv;

pub use error::{Error, Result};
pub use keys::SessionKeys;
pub use session::SecureMessaging;
pub use ssc::SendSequenceCounter;
pub use tlv::DataObject;

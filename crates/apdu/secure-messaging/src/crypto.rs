//! Cryptographic operations for AES secure messaging
//!
//! Every function builds its own cipher or MAC instance from the key it is
//! given. No cipher state outlives a call.

use aes::Aes128;
use cipher::{
    BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Iso7816,
};
use cmac::{Cmac, Mac};
use subtle::ConstantTimeEq;

use crate::{Error, Result, keys::KEY_LENGTH, ssc::SSC_LENGTH};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Length of the truncated MAC carried in DO8E
pub const MAC_LENGTH: usize = 8;

/// AES-128 key
pub type SmKey = [u8; KEY_LENGTH];
/// Counter block fed to IV derivation and MAC
pub type SmCounter = [u8; SSC_LENGTH];
/// Truncated MAC
pub type SmMac = [u8; MAC_LENGTH];

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// ISO/IEC 9797-1 padding method 2 to a multiple of the block size
///
/// A full block of padding is added when the input is already aligned.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let padded_len = (data.len() / BLOCK_SIZE + 1) * BLOCK_SIZE;
    let mut padded = Vec::with_capacity(padded_len);
    padded.extend_from_slice(data);
    padded.push(0x80);
    padded.resize(padded_len, 0x00);
    padded
}

/// Derive the CBC IV for the current exchange by encrypting the counter block
pub fn derive_iv(enc_key: &SmKey, ssc: &SmCounter) -> [u8; BLOCK_SIZE] {
    let cipher = Aes128::new(enc_key.into());
    let mut block = aes::Block::from(*ssc);
    cipher.encrypt_block(&mut block);
    block.into()
}

/// Pad and encrypt `data` in CBC mode with the counter-derived IV
pub fn encrypt(enc_key: &SmKey, ssc: &SmCounter, data: &[u8]) -> Vec<u8> {
    let iv = derive_iv(enc_key, ssc);
    Aes128CbcEnc::new(enc_key.into(), &iv.into()).encrypt_padded_vec_mut::<Iso7816>(data)
}

/// Decrypt a CBC cryptogram with the counter-derived IV and strip the padding
pub fn decrypt(enc_key: &SmKey, ssc: &SmCounter, cryptogram: &[u8]) -> Result<Vec<u8>> {
    if cryptogram.is_empty() || cryptogram.len() % BLOCK_SIZE != 0 {
        return Err(Error::CryptoFailure(
            "cryptogram is not a whole number of blocks",
        ));
    }

    let iv = derive_iv(enc_key, ssc);
    Aes128CbcDec::new(enc_key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Iso7816>(cryptogram)
        .map_err(|_| Error::MalformedApdu("invalid padding in decrypted data"))
}

/// CMAC over the counter block followed by each non-empty part padded on its own
///
/// Returns the leftmost eight bytes of the CMAC.
pub fn calculate_mac(mac_key: &SmKey, ssc: &SmCounter, parts: &[&[u8]]) -> SmMac {
    let mut mac = <Cmac<Aes128> as KeyInit>::new(mac_key.into());
    mac.update(ssc);
    for part in parts.iter().filter(|part| !part.is_empty()) {
        mac.update(&pad(part));
    }

    let tag = mac.finalize().into_bytes();
    let mut truncated = [0u8; MAC_LENGTH];
    truncated.copy_from_slice(&tag[..MAC_LENGTH]);
    truncated
}

/// Constant time comparison of a computed and a received MAC
pub fn verify_mac(expected: &[u8], received: &[u8]) -> bool {
    expected.ct_eq(received).into()
}

//! Secure messaging session
//!
//! Wraps plain command APDUs into protected wire APDUs and unwraps protected
//! responses, stepping the send sequence counter once per direction.

use bytes::{Bytes, BytesMut};
use cardlink_apdu_core::{
    ApduCommand, Command, Response, StatusWord,
    command::{
        EXPECTED_LENGTH_WILDCARD_EXTENDED, EXPECTED_LENGTH_WILDCARD_SHORT, MAX_EXTENDED_DATA_LENGTH,
        MAX_SHORT_DATA_LENGTH,
    },
};
use tracing::{debug, trace, warn};

use crate::{
    Error, Result, crypto,
    keys::SessionKeys,
    ssc::SendSequenceCounter,
    tlv::{DataObject, tag},
};

/// Class bits marking a command as SM protected with an authenticated header
pub const SM_CLASS_BITS: u8 = 0x0C;

/// First byte of a DO87 value, padding according to ISO/IEC 9797-1 method 2
pub const PADDING_INDICATOR: u8 = 0x01;

/// Smallest protected response: DO99, DO8E and the trailing status word
pub const MIN_RESPONSE_LENGTH: usize = 12;

/// Length of the DO99 value
const STATUS_LENGTH: usize = 2;

/// Secure messaging state for one channel
///
/// Commands and responses must pass through the session in the order they
/// are exchanged with the card. Each wrap and unwrap advances the counter
/// before anything else, so a failed call still consumes a counter value.
#[derive(Debug)]
pub struct SecureMessaging {
    keys: SessionKeys,
    ssc: SendSequenceCounter,
}

impl SecureMessaging {
    /// Start a session with a zeroed counter
    pub fn new(keys: SessionKeys) -> Self {
        debug!("Starting secure messaging session");
        Self {
            keys,
            ssc: SendSequenceCounter::new(),
        }
    }

    /// Resume a session whose counter already stands at `ssc`
    pub fn with_counter(keys: SessionKeys, ssc: SendSequenceCounter) -> Self {
        debug!(%ssc, "Resuming secure messaging session");
        Self { keys, ssc }
    }

    /// Current counter value
    pub const fn counter(&self) -> &SendSequenceCounter {
        &self.ssc
    }

    /// Protect a command APDU
    pub fn encrypt(&mut self, command: &impl ApduCommand) -> Result<Command> {
        self.ssc.increment();
        self.protect(command)
    }

    /// Protect a raw command APDU, returning the wire bytes
    pub fn encrypt_bytes(&mut self, command: &[u8]) -> Result<Bytes> {
        self.ssc.increment();
        let command = Command::from_bytes(command)
            .map_err(|_| Error::MalformedApdu("command is not a valid APDU"))?;
        self.protect(&command)?
            .to_bytes()
            .map_err(|_| Error::MalformedApdu("protected command cannot be encoded"))
    }

    /// Verify and decrypt a protected response
    pub fn decrypt(&mut self, response: &[u8]) -> Result<Response> {
        self.ssc.increment();
        self.unprotect(response)
    }

    /// Verify and decrypt a protected response already split into payload and status
    pub fn decrypt_response(&mut self, response: &Response) -> Result<Response> {
        self.decrypt(&response.to_bytes())
    }

    fn protect(&self, command: &impl ApduCommand) -> Result<Command> {
        let cla = command.class();
        if cla & SM_CLASS_BITS == SM_CLASS_BITS {
            return Err(Error::MalformedApdu("command is already secure messaging protected"));
        }

        let header = [
            cla | SM_CLASS_BITS,
            command.instruction(),
            command.p1(),
            command.p2(),
        ];
        let ssc = self.ssc.to_bytes();
        let le = command.expected_length();

        let expected_length = le.map(DataObject::expected_length).transpose()?;

        let mut body = BytesMut::new();
        if let Some(data) = command.data().filter(|data| !data.is_empty()) {
            let cryptogram = crypto::encrypt(self.keys.enc(), &ssc, data);
            let mut value = BytesMut::with_capacity(cryptogram.len() + 1);
            value.extend_from_slice(&[PADDING_INDICATOR]);
            value.extend_from_slice(&cryptogram);
            DataObject::EncryptedData(value.freeze()).encode(&mut body);
        }
        if let Some(expected_length) = expected_length {
            expected_length.encode(&mut body);
        }

        let mac = crypto::calculate_mac(self.keys.mac(), &ssc, &[&header[..], &body[..]]);
        DataObject::MessageAuthenticationCode(Bytes::copy_from_slice(&mac)).encode(&mut body);
        if body.len() > MAX_EXTENDED_DATA_LENGTH {
            return Err(Error::MalformedApdu("protected command exceeds extended length"));
        }

        // wire Le is a wildcard, extended once either length leaves short form
        let wire_le = if le.is_some_and(|le| le > EXPECTED_LENGTH_WILDCARD_SHORT)
            || body.len() > MAX_SHORT_DATA_LENGTH
        {
            EXPECTED_LENGTH_WILDCARD_EXTENDED
        } else {
            EXPECTED_LENGTH_WILDCARD_SHORT
        };

        trace!(ssc = %self.ssc, body = %hex::encode(&body), "Wrapped command");

        let [cla, ins, p1, p2] = header;
        Ok(Command::new_with_data(cla, ins, p1, p2, body.freeze()).with_le(wire_le))
    }

    fn unprotect(&self, response: &[u8]) -> Result<Response> {
        trace!(ssc = %self.ssc, response = %hex::encode(response), "Unwrapping response");

        if response.len() < MIN_RESPONSE_LENGTH {
            return Err(Error::MalformedApdu("response too short for secure messaging"));
        }

        let mut input = response;
        let data = match input.first() {
            Some(&(tag::PLAIN_DATA | tag::ENCRYPTED_DATA)) => Some(DataObject::decode(&mut input)?),
            _ => None,
        };

        let status = match DataObject::decode(&mut input)? {
            DataObject::Status(status) if status.len() == STATUS_LENGTH => status,
            DataObject::Status(_) => {
                return Err(Error::MalformedApdu("status object must hold two bytes"));
            }
            _ => return Err(Error::MalformedApdu("missing status object")),
        };
        let authenticated = &response[..response.len() - input.len()];

        let received_mac = match DataObject::decode(&mut input)? {
            DataObject::MessageAuthenticationCode(mac) if mac.len() == crypto::MAC_LENGTH => mac,
            DataObject::MessageAuthenticationCode(_) => {
                return Err(Error::MalformedApdu("MAC object must hold eight bytes"));
            }
            _ => return Err(Error::MalformedApdu("missing MAC object")),
        };

        if input.len() != STATUS_LENGTH {
            return Err(Error::MalformedApdu("missing trailing status word"));
        }

        let ssc = self.ssc.to_bytes();
        let expected_mac = crypto::calculate_mac(self.keys.mac(), &ssc, &[authenticated]);
        if !crypto::verify_mac(&expected_mac, &received_mac) {
            warn!(ssc = %self.ssc, "Response MAC verification failed");
            return Err(Error::IntegrityFailure);
        }

        let payload = match data {
            Some(DataObject::EncryptedData(value)) => {
                let [PADDING_INDICATOR, cryptogram @ ..] = &value[..] else {
                    return Err(Error::MalformedApdu("unsupported padding indicator"));
                };
                Some(Bytes::from(crypto::decrypt(self.keys.enc(), &ssc, cryptogram)?))
            }
            Some(DataObject::PlainData(value)) => Some(value),
            _ => None,
        };

        let response = Response::new(payload, StatusWord::new(status[0], status[1]));
        debug!(status = %response.status(), "Unwrapped response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn session() -> SecureMessaging {
        SecureMessaging::new(SessionKeys::new(
            hex!("68406B4162100563D9C901A6154D2901"),
            hex!("73FF268784F72AF833FDC9464049AFC9"),
        ))
    }

    fn wrap(command: Command) -> Bytes {
        session().encrypt(&command).unwrap().to_bytes().unwrap()
    }

    #[test]
    fn test_wrap_header_only() {
        let wire = wrap(Command::new(0x01, 0x02, 0x03, 0x04));
        assert_eq!(wire.as_ref(), hex!("0D0203040A8E08D92B4FDDC2BBED8C00"));
    }

    #[test]
    fn test_wrap_short_le() {
        let wire = wrap(Command::new_with_le(0x01, 0x02, 0x03, 0x04, 127));
        assert_eq!(wire.as_ref(), hex!("0D0203040D97017F8E0871D8E0418DAE20F300"));
    }

    #[test]
    fn test_wrap_extended_le() {
        let wire = wrap(Command::new_with_le(0x01, 0x02, 0x03, 0x04, 257));
        assert_eq!(
            wire.as_ref(),
            hex!("0D02030400000E970201018E089F3EDDFBB1D3971D0000")
        );
    }

    #[test]
    fn test_wrap_data() {
        let wire = wrap(Command::new_with_data(0x01, 0x02, 0x03, 0x04, hex!("05060708090A").to_vec()));
        assert_eq!(
            wire.as_ref(),
            hex!("0D0203041D871101496C26D36306679609665A385C54DB378E08E7AAD918F260D8EF00")
        );
    }

    #[test]
    fn test_wrap_data_and_le() {
        let command = Command::new_with_data(0x01, 0x02, 0x03, 0x04, hex!("05060708090A").to_vec()).with_le(127);
        assert_eq!(
            wrap(command).as_ref(),
            hex!("0D02030420871101496C26D36306679609665A385C54DB3797017F8E0863D541F262BD445A00")
        );
    }

    #[test]
    fn test_wrap_extended_data() {
        let command = Command::new_with_data(0x01, 0x02, 0x03, 0x04, vec![0x00; 256]).with_le(127);
        let wire = wrap(command);
        assert_eq!(
            wire.as_ref(),
            hex!(
                "0D02030400012287820111013297D4AA774AB26AF8AD539C0A829BCA4D222D3EE2DB100CF86D7DB5A1FAC12B7623328DEFE3F6FDD41A993AC917BC17B364C3DD24740079DE60A3D0231A7185D36A77D37E147025913ADA00CD07736CFDE0DB2E0BB09B75C5773607E54A9D84181ACBC6F7726762A8BCE324C0B330548114154A13EDDBFF6DCBC3773DCA9A8494404BE4A5654273F9C2B9EBE1BD615CB39FFD0D3F2A0EEA29AA10B810D53EDB550FB741A68CC6B0BDF928F9EB6BC238416AACB4CF3002E865D486CF42D762C86EEBE6A2B25DECE2E88D569854A07D3F146BC134BAF08B6EDCBEBDFF47EBA6AC7B441A1642B03253B588C49B69ABBEC92BA1723B7260DE8AD6158873141AFA7C70CFCF125BA1DF77CA48025D049FCEE497017F8E0856332C83EABDF93C0000"
            )
        );
    }

    #[test]
    fn test_wrap_raw_bytes() {
        let wire = session().encrypt_bytes(&hex!("01020304")).unwrap();
        assert_eq!(wire.as_ref(), hex!("0D0203040A8E08D92B4FDDC2BBED8C00"));

        let mut sm = session();
        assert_eq!(
            sm.encrypt_bytes(&hex!("010203")),
            Err(Error::MalformedApdu("command is not a valid APDU"))
        );
        assert_eq!(sm.counter().value(), 1);
    }

    #[test]
    fn test_wrap_rejects_protected_command() {
        let mut sm = session();
        let wrapped = sm.encrypt(&Command::new(0x01, 0x02, 0x03, 0x04)).unwrap();
        assert!(matches!(sm.encrypt(&wrapped), Err(Error::MalformedApdu(_))));
        assert_eq!(sm.counter().value(), 2);

        // partial SM indication is upgraded, not rejected
        assert!(sm.encrypt(&Command::new(0x08, 0x02, 0x03, 0x04)).is_ok());
    }

    #[test]
    fn test_wrap_bounds_protected_body() {
        let mut sm = session();
        let command = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, vec![0xAB; 65520]);
        assert_eq!(
            sm.encrypt(&command),
            Err(Error::MalformedApdu("protected command exceeds extended length"))
        );
        assert_eq!(sm.counter().value(), 1);

        let command = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, vec![0xAB; 65000]);
        let wrapped = sm.encrypt(&command).unwrap();
        let wire = wrapped.to_bytes().unwrap();
        assert_eq!(wire.len(), 7 + 65023 + 2);
        assert_eq!(Command::from_bytes(&wire).unwrap(), wrapped);
    }

    #[test]
    fn test_wrap_rejects_le_out_of_range() {
        let mut sm = session();
        let command = Command::new_with_le(0x00, 0xB0, 0x00, 0x00, 65537);
        assert!(matches!(sm.encrypt(&command), Err(Error::MalformedApdu(_))));
    }

    #[test]
    fn test_unwrap_status_only() {
        let response = session()
            .decrypt(&hex!("990290008E08087631D746F872729000"))
            .unwrap();
        assert_eq!(response.to_bytes().as_ref(), hex!("9000"));
        assert!(response.payload().is_none());
    }

    #[test]
    fn test_unwrap_encrypted_data() {
        let response = session()
            .decrypt(&hex!(
                "871101496c26d36306679609665a385c54db37990290008E08B7E9ED2A0C89FB3A9000"
            ))
            .unwrap();
        assert_eq!(response.to_bytes().as_ref(), hex!("05060708090a9000"));
    }

    #[test]
    fn test_unwrap_parsed_response() {
        let wire = Response::from_bytes(&hex!("990290008E08087631D746F872729000")).unwrap();
        let response = session().decrypt_response(&wire).unwrap();
        assert!(response.is_success());
    }

    #[test]
    fn test_unwrap_rejects_bad_mac() {
        let valid = hex!("871101496c26d36306679609665a385c54db37990290008E08B7E9ED2A0C89FB3A9000");
        let mac_offset = valid.len() - 2 - crypto::MAC_LENGTH;
        assert!(session().decrypt(&valid).is_ok());

        for position in mac_offset..mac_offset + crypto::MAC_LENGTH {
            let mut tampered = valid;
            tampered[position] ^= 0x01;

            let mut sm = session();
            assert_eq!(sm.decrypt(&tampered), Err(Error::IntegrityFailure), "byte {position}");
            assert_eq!(sm.counter().value(), 1);
        }
    }

    #[test]
    fn test_unwrap_rejects_malformed() {
        let cases: [&[u8]; 5] = [
            // no status object
            &hex!("871101496c26d36306679609665a385c54db378E08B7E9ED2A0C89FB3A9000"),
            // no trailing status word
            &hex!("871101496c26d36306679609665a385c54db37990290008E08B7E9ED2A0C89FB3A"),
            // no MAC object
            &hex!("871101496c26d36306679609665a385c54db37990290009000"),
            // plain status word
            &hex!("9000"),
            // trailing garbage
            &hex!("990290008E08087631D746F8727290009000"),
        ];
        for case in cases {
            let mut sm = session();
            assert!(
                matches!(sm.decrypt(case), Err(Error::MalformedApdu(_))),
                "{}",
                hex::encode(case)
            );
            assert_eq!(sm.counter().value(), 1);
        }
    }

    #[test]
    fn test_unwrap_plain_data_object() {
        // card-side MAC over DO81 || DO99 with counter 1
        let mut sm = session();
        let ssc = 1u128.to_be_bytes();
        let objects = hex!("8102CAFE99029000");
        let mac = crypto::calculate_mac(sm.keys.mac(), &ssc, &[&objects[..]]);

        let mut wire = objects.to_vec();
        wire.extend_from_slice(&hex!("8E08"));
        wire.extend_from_slice(&mac);
        wire.extend_from_slice(&hex!("9000"));

        let response = sm.decrypt(&wire).unwrap();
        assert_eq!(response.payload().as_deref(), Some(&hex!("CAFE")[..]));
    }

    #[test]
    fn test_counter_steps_per_direction() {
        let mut sm = session();
        sm.encrypt(&Command::new(0x00, 0xB0, 0x00, 0x00)).unwrap();
        assert_eq!(sm.counter().value(), 1);
        let _ = sm.decrypt(&hex!("990290008E08087631D746F872729000"));
        assert_eq!(sm.counter().value(), 2);
    }

    #[test]
    fn test_resume_at_counter() {
        let keys = session().keys.clone();
        let mut sm = SecureMessaging::with_counter(keys, SendSequenceCounter::from_value(1));
        let response = sm
            .decrypt(&hex!("990290008E08A89570A68664A7D69000"))
            .unwrap();
        assert!(response.is_success());
        assert_eq!(sm.counter().value(), 2);
    }
}

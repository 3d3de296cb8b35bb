use thiserror::Error;

/// Result type for secure messaging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for secure messaging operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The APDU does not have the structure secure messaging requires
    #[error("Malformed APDU: {0}")]
    MalformedApdu(&'static str),

    /// The response MAC does not match the one computed over the response
    #[error("Secure messaging integrity check failed")]
    IntegrityFailure,

    /// A cipher or MAC primitive rejected its input
    #[error("Cryptographic error: {0}")]
    CryptoFailure(&'static str),
}

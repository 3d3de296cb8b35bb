//! Send sequence counter

use std::fmt;

/// Length of the counter block in bytes
pub const SSC_LENGTH: usize = 16;

/// 16-byte big-endian counter stepped once before every wrap and unwrap
///
/// Starts at zero for a new session and wraps silently on overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSequenceCounter(u128);

impl SendSequenceCounter {
    /// A counter at zero
    pub const fn new() -> Self {
        Self(0)
    }

    /// A counter resumed at `value`
    pub const fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Advance the counter by one
    pub const fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Current value
    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Counter block as it enters the IV and MAC computations
    pub const fn to_bytes(&self) -> [u8; SSC_LENGTH] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for SendSequenceCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032X}", self.0)
    }
}

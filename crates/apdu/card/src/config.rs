//! Configuration options for card channels

/// Largest command or response the contactless link accepts by default
pub const DEFAULT_MAX_LENGTH: usize = 261;

/// Largest length that fits short APDUs
const MAX_SHORT_LENGTH: usize = 255;

/// Configuration options for a card and its channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardConfig {
    /// Largest command APDU the link accepts
    pub max_message_length: usize,

    /// Largest response APDU the link returns
    pub max_response_length: usize,

    /// Run secure messaging on logical channels opened after the session keys are known
    pub secure_messaging_on_logical_channels: bool,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_LENGTH,
            max_response_length: DEFAULT_MAX_LENGTH,
            secure_messaging_on_logical_channels: false,
        }
    }
}

impl CardConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest command APDU
    pub const fn with_max_message_length(mut self, length: usize) -> Self {
        self.max_message_length = length;
        self
    }

    /// Set the largest response APDU
    pub const fn with_max_response_length(mut self, length: usize) -> Self {
        self.max_response_length = length;
        self
    }

    /// Set whether logical channels get their own secure messaging session
    pub const fn with_secure_messaging_on_logical_channels(mut self, enabled: bool) -> Self {
        self.secure_messaging_on_logical_channels = enabled;
        self
    }

    /// Whether both directions exceed the short APDU limit
    pub const fn is_extended_length_supported(&self) -> bool {
        self.max_message_length > MAX_SHORT_LENGTH && self.max_response_length > MAX_SHORT_LENGTH
    }
}

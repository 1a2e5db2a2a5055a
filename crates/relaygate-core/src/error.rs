use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Frame errors
    #[error("Invalid relay address: {0} (must be 1-255)")]
    InvalidRelayAddress(u16),

    #[error("Invalid relay state byte: {0:#04x}")]
    InvalidRelayState(u8),

    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    #[error("Invalid sync byte: {0:#04x}")]
    InvalidSyncByte(u8),

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    // Addressing errors
    #[error("Invalid relay number: {0}")]
    InvalidRelayNumber(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = Error::ChecksumMismatch {
            expected: 0xA2,
            actual: 0xA1,
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch: expected 0xa2, got 0xa1"
        );
    }

    #[test]
    fn test_invalid_address_display() {
        assert_eq!(
            Error::InvalidRelayAddress(0).to_string(),
            "Invalid relay address: 0 (must be 1-255)"
        );
    }
}

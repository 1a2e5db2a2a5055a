use relaygate_core::{
    Error, RelayAddress, RelayState, Result,
    constants::{FRAME_LEN, FRAME_SYNC},
};
use std::fmt;

/// RelayCommandFrame is the 4-byte wire command understood by every supported
/// relay board.
///
/// # Wire Format
/// ```text
/// A0 01 01 A2    relay 1 on
/// ^^ ^^ ^^ ^^
/// |  |  |  checksum = (0xA0 + address + state) mod 256
/// |  |  state (0x01 on, 0x00 off)
/// |  relay address (1-255)
/// sync byte
/// ```
///
/// A frame is immutable once built. The only constructors are [`encode`],
/// which always produces a valid checksum, and
/// [`RelayCommandFrame::try_from_bytes`], which rejects anything whose
/// checksum does not match. An invalid frame therefore cannot exist as a
/// value and can never reach a transport.
///
/// # Basic Usage
/// ```
/// use relaygate_protocol::RelayCommandFrame;
///
/// let on = RelayCommandFrame::encode(2, true).unwrap();
/// assert_eq!(on.as_bytes(), &[0xA0, 0x02, 0x01, 0xA3]);
///
/// let off = RelayCommandFrame::encode(3, false).unwrap();
/// assert_eq!(off.as_bytes(), &[0xA0, 0x03, 0x00, 0xA3]);
///
/// assert!(RelayCommandFrame::encode(0, true).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayCommandFrame {
    bytes: [u8; FRAME_LEN],
}

impl RelayCommandFrame {
    /// Build a frame from a raw address and on/off flag.
    ///
    /// # Errors
    /// Returns `Error::InvalidRelayAddress` when `address` is 0.
    pub fn encode(address: u8, on: bool) -> Result<Self> {
        let address = RelayAddress::new(u16::from(address))?;
        Ok(encode(address, RelayState::from(on)))
    }

    /// Parse and validate a received frame.
    ///
    /// # Errors
    /// Returns an error if the length, sync byte, address, state or checksum
    /// is wrong.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FRAME_LEN {
            return Err(Error::InvalidFrameLength {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0] != FRAME_SYNC {
            return Err(Error::InvalidSyncByte(bytes[0]));
        }

        let address = RelayAddress::new(u16::from(bytes[1]))?;
        let state = RelayState::from_u8(bytes[2])?;
        let expected = checksum(address, state);
        if bytes[3] != expected {
            return Err(Error::ChecksumMismatch {
                expected,
                actual: bytes[3],
            });
        }

        Ok(Self {
            bytes: [bytes[0], bytes[1], bytes[2], bytes[3]],
        })
    }

    /// Raw bytes, ready to write to a transport.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn address(&self) -> RelayAddress {
        // Constructors guarantee a non-zero address byte.
        RelayAddress::new(u16::from(self.bytes[1])).unwrap_or_default()
    }

    pub fn state(&self) -> RelayState {
        if self.bytes[2] == RelayState::On.to_u8() {
            RelayState::On
        } else {
            RelayState::Off
        }
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[3]
    }

    /// Lowercase hex rendering used in logs, e.g. `a00101a2`.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for RelayCommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for RelayCommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Checksum byte for an address/state pair.
pub fn checksum(address: RelayAddress, state: RelayState) -> u8 {
    FRAME_SYNC
        .wrapping_add(address.as_u8())
        .wrapping_add(state.to_u8())
}

/// Build the command frame for `address` and `state`.
pub fn encode(address: RelayAddress, state: RelayState) -> RelayCommandFrame {
    RelayCommandFrame {
        bytes: [
            FRAME_SYNC,
            address.as_u8(),
            state.to_u8(),
            checksum(address, state),
        ],
    }
}

/// Check whether `bytes` form a valid command frame.
pub fn validate(bytes: &[u8]) -> bool {
    RelayCommandFrame::try_from_bytes(bytes).is_ok()
}

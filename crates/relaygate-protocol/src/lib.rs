//! Relay command frame protocol.
//!
//! Every supported relay board takes the same 4-byte command:
//! `[0xA0, address, state, checksum]`. This crate builds and validates those
//! frames ([`RelayCommandFrame`]) and provides a Tokio codec
//! ([`RelayFrameCodec`]) for pushing them through byte streams.
//!
//! ```
//! use relaygate_core::{RelayAddress, RelayState};
//! use relaygate_protocol::{encode, validate};
//!
//! let frame = encode(RelayAddress::new(1).unwrap(), RelayState::On);
//! assert_eq!(frame.as_bytes(), &[0xA0, 0x01, 0x01, 0xA2]);
//! assert!(validate(frame.as_bytes()));
//! ```

pub mod codec;
pub mod frame;

pub use codec::RelayFrameCodec;
pub use frame::{RelayCommandFrame, checksum, encode, validate};

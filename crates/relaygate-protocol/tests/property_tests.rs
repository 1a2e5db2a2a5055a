//! Property-based tests for relay command frames.
//!
//! These tests use proptest to cover the whole address space and verify that
//! the frame invariants hold for every address/state combination.

use proptest::prelude::*;
use relaygate_core::{RelayAddress, RelayState};
use relaygate_protocol::{RelayCommandFrame, encode, validate};

/// Strategy for generating valid relay addresses (1-255).
fn valid_address() -> impl Strategy<Value = u8> {
    1u8..=255u8
}

/// Strategy for generating relay states.
fn any_state() -> impl Strategy<Value = RelayState> {
    prop_oneof![Just(RelayState::On), Just(RelayState::Off)]
}

proptest! {
    /// Property: the last byte is always (0xA0 + address + state) mod 256.
    #[test]
    fn prop_checksum_matches_formula(address in valid_address(), state in any_state()) {
        let frame = encode(RelayAddress::new(u16::from(address)).unwrap(), state);
        let bytes = frame.as_bytes();

        let expected = ((0xA0u16 + u16::from(address) + u16::from(state.to_u8())) % 256) as u8;
        prop_assert_eq!(bytes.len(), 4);
        prop_assert_eq!(bytes[0], 0xA0);
        prop_assert_eq!(bytes[1], address);
        prop_assert_eq!(bytes[2], state.to_u8());
        prop_assert_eq!(bytes[3], expected);
    }

    /// Property: every encoded frame validates.
    #[test]
    fn prop_encoded_frames_validate(address in valid_address(), on in any::<bool>()) {
        let frame = RelayCommandFrame::encode(address, on).unwrap();
        prop_assert!(validate(frame.as_bytes()));
    }

    /// Property: corrupting the checksum byte always invalidates the frame.
    #[test]
    fn prop_corrupted_checksum_rejected(
        address in valid_address(),
        on in any::<bool>(),
        delta in 1u8..=255u8,
    ) {
        let frame = RelayCommandFrame::encode(address, on).unwrap();
        let mut bytes = frame.as_bytes().to_vec();
        bytes[3] = bytes[3].wrapping_add(delta);

        prop_assert!(!validate(&bytes));
    }

    /// Property: on and off frames for one address differ by exactly one in
    /// both the state and the checksum byte.
    #[test]
    fn prop_on_off_pair(address in valid_address()) {
        let on = RelayCommandFrame::encode(address, true).unwrap();
        let off = RelayCommandFrame::encode(address, false).unwrap();

        prop_assert_eq!(on.as_bytes()[2], off.as_bytes()[2] + 1);
        prop_assert_eq!(on.checksum(), off.checksum().wrapping_add(1));
    }
}

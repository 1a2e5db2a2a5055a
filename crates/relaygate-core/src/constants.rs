//! Core constants for the relay command protocol and its transports.
//!
//! This module defines the protocol-level constants shared by the codec, the
//! transport drivers and the device registry.
//!
//! # Frame Structure
//!
//! Every relay board understood by relaygate accepts the same fixed frame:
//!
//! ```text
//! +------+---------+-------+----------+
//! | 0xA0 | address | state | checksum |
//! +------+---------+-------+----------+
//!   sync   1..=255   0 / 1   (0xA0 + address + state) mod 256
//! ```
//!
//! # Usage
//!
//! ```
//! use relaygate_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(FRAME_LEN, 4);
//!
//! let hold = Duration::from_millis(DEFAULT_HOLD_MS);
//! assert_eq!(hold.as_secs(), 1);
//! ```

// ============================================================================
// Frame Layout
// ============================================================================

/// Leading sync byte of every relay command frame.
pub const FRAME_SYNC: u8 = 0xA0;

/// Total frame length in bytes (sync, address, state, checksum).
pub const FRAME_LEN: usize = 4;

/// State byte that energizes the relay.
pub const STATE_ON: u8 = 0x01;

/// State byte that releases the relay.
pub const STATE_OFF: u8 = 0x00;

/// Lowest addressable relay channel on a board.
pub const MIN_RELAY_ADDRESS: u8 = 1;

/// Highest addressable relay channel on a board.
pub const MAX_RELAY_ADDRESS: u8 = 255;

/// Relay channel used when a profile does not name one.
///
/// Single-channel boards (the MSR reader and the CH340 converter) only
/// respond on channel 1.
pub const DEFAULT_RELAY_CHANNEL: u8 = 1;

// ============================================================================
// Known Hardware Identities
// ============================================================================

/// USB vendor ID of the magnetic-stripe-reader style relay (USB bulk).
pub const MSR_VENDOR_ID: u16 = 0x5131;

/// USB product ID of the magnetic-stripe-reader style relay (USB bulk).
pub const MSR_PRODUCT_ID: u16 = 0x2007;

/// USB vendor ID of the CH340 USB-to-serial converter (QinHeng).
pub const CH340_VENDOR_ID: u16 = 0x1a86;

/// USB product ID of the CH340 USB-to-serial converter.
pub const CH340_PRODUCT_ID: u16 = 0x7523;

// ============================================================================
// Timing
// ============================================================================

/// Default hold duration (milliseconds) when a request names none.
///
/// # Value: 1000ms
pub const DEFAULT_HOLD_MS: u64 = 1000;

/// Serial read/write timeout (milliseconds).
pub const SERIAL_TIMEOUT_MS: u64 = 1000;

/// Serial line speed for every supported converter (8-N-1).
pub const SERIAL_BAUD_RATE: u32 = 9600;

/// TCP connect timeout for network relay controllers (milliseconds).
///
/// # Value: 5000ms
pub const NETWORK_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Timeout for a single USB bulk/interrupt transfer (milliseconds).
pub const USB_TRANSFER_TIMEOUT_MS: u64 = 1000;

// ============================================================================
// Diagnostics
// ============================================================================

/// Diagnostic returned when discovery finds nothing to trigger.
pub const NO_DEVICE_DIAGNOSTIC: &str = "no matching device found";

/// Separator used when joining per-device diagnostics.
pub const DIAGNOSTIC_SEPARATOR: &str = "; ";

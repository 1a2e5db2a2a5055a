//! Relay discovery, transport drivers and the trigger facade.
//!
//! This crate turns "pulse relay N for D milliseconds" into frames on a wire.
//! It covers three transports:
//!
//! - **USB**: boards with a bulk/interrupt OUT endpoint, driven through libusb
//! - **Serial**: boards behind a USB-to-serial converter (CH340)
//! - **Network**: controllers listening on a TCP port
//!
//! # Layers
//!
//! ```text
//! RelayControl (control)          request -> aggregated TriggerResult
//!     │
//!     ├─> DeviceRegistry (registry)   enumerators -> flat 1..N numbering
//!     ├─> DeviceLocks (locks)         one attempt per device at a time
//!     └─> AnyRelayBackend (devices)   open -> pulse (pulse) -> close
//!             ├─> UsbBackend      (usb)
//!             ├─> SerialBackend   (serial)
//!             ├─> NetworkBackend  (network)
//!             └─> MockRelay       (mock)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use relaygate_core::TriggerRequest;
//! use relaygate_hardware::{RelayControl, RelayControlConfig};
//!
//! # async fn example() -> relaygate_core::Result<()> {
//! let config = RelayControlConfig::from_file("relaygate.toml")?;
//! let control = RelayControl::new(config);
//!
//! // Every discovered device, default hold
//! let result = control.trigger_relay(TriggerRequest::all()).await;
//! assert!(result.success, "{}", result.diagnostic);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Driver operations return [`Result<T>`](error::Result) with
//! [`HardwareError`]. The facade converts every failure into a
//! [`TriggerResult`](relaygate_core::TriggerResult) diagnostic.

pub mod config;
pub mod control;
pub mod devices;
pub mod error;
pub mod locks;
pub mod mock;
pub mod network;
pub mod pulse;
pub mod registry;
pub mod serial;
pub mod traits;
pub mod usb;

pub use config::{DeviceProfile, NetworkProfile, RelayControlConfig, TimeoutConfig};
pub use control::RelayControl;
pub use devices::{AnyEnumerator, AnyRelayBackend, AnyRelayLink, BackendSet};
pub use error::{HardwareError, Result};
pub use locks::DeviceLocks;
pub use registry::{AddressEntry, AddressSpace, DeviceRegistry};

//! Transport trait definitions.
//!
//! These traits are the seams between the control facade and the transport
//! drivers. A [`DeviceEnumerator`] finds devices, a [`RelayBackend`] opens a
//! [`RelayLink`] to one of them, and the link carries command frames until it
//! is closed.
//!
//! Methods return `impl Future + Send` so that a trigger sequence can be moved
//! onto its own tokio task. Implementations are free to write `async fn`.
//!
//! Like every native async trait these are not object-safe; dynamic dispatch
//! goes through the enums in [`devices`](crate::devices).

use crate::error::Result;
use relaygate_core::{DeviceDescriptor, DeviceIdentity, TransportKind};
use relaygate_protocol::RelayCommandFrame;
use std::future::Future;

/// An open, exclusively owned connection to one relay board.
pub trait RelayLink: Send {
    /// Write one command frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the write, the transfer times
    /// out, or the device is gone.
    fn send_frame(&mut self, frame: RelayCommandFrame) -> impl Future<Output = Result<()>> + Send;

    /// Release the underlying handle. Consumes the link so it cannot be
    /// reused; dropping a link without calling `close` also releases it.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Opens links for one transport.
pub trait RelayBackend: Send + Sync {
    type Link: RelayLink;

    fn transport(&self) -> TransportKind;

    /// Open a link to `device`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`HardwareError`](crate::HardwareError) when the
    /// device cannot be opened (busy, permission, vanished, refused).
    fn open(&self, device: &DeviceDescriptor) -> impl Future<Output = Result<Self::Link>> + Send;
}

/// Lists attached devices of one transport.
pub trait DeviceEnumerator: Send + Sync {
    fn transport(&self) -> TransportKind;

    /// Find every attached device matching the vendor/product pair.
    ///
    /// An empty list is not an error.
    fn discover(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> impl Future<Output = Result<Vec<DeviceIdentity>>> + Send;
}

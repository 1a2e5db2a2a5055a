//! Enum wrappers for transport dispatch.
//!
//! Native async traits are not object-safe, so `Box<dyn RelayBackend>` is not
//! an option. The set of transports is closed, and these enums give each one a
//! concrete variant. A descriptor's [`TransportKind`] picks the variant.
//!
//! # Examples
//!
//! ```
//! use relaygate_hardware::devices::AnyRelayBackend;
//! use relaygate_hardware::mock::MockRelay;
//! use relaygate_hardware::traits::RelayBackend;
//! use relaygate_core::TransportKind;
//!
//! let (relay, _handle) = MockRelay::new();
//! let backend = AnyRelayBackend::Mock(relay);
//! assert_eq!(backend.transport(), TransportKind::Serial);
//! ```

use crate::Result;
use crate::mock::{MockEnumerator, MockLink, MockRelay};
use crate::network::{NetworkBackend, NetworkLink};
use crate::serial::{SerialBackend, SerialEnumerator, SerialLink};
use crate::traits::{DeviceEnumerator, RelayBackend, RelayLink};
use crate::usb::{UsbBackend, UsbEnumerator, UsbLink};
use relaygate_core::{DeviceDescriptor, DeviceIdentity, TransportKind};
use relaygate_protocol::RelayCommandFrame;

/// Enum wrapper for backend dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyRelayBackend {
    Usb(UsbBackend),
    Serial(SerialBackend),
    Network(NetworkBackend),
    /// Mock backend for development and testing.
    Mock(MockRelay),
}

impl RelayBackend for AnyRelayBackend {
    type Link = AnyRelayLink;

    fn transport(&self) -> TransportKind {
        match self {
            Self::Usb(backend) => backend.transport(),
            Self::Serial(backend) => backend.transport(),
            Self::Network(backend) => backend.transport(),
            Self::Mock(backend) => backend.transport(),
        }
    }

    async fn open(&self, device: &DeviceDescriptor) -> Result<AnyRelayLink> {
        Ok(match self {
            Self::Usb(backend) => AnyRelayLink::Usb(backend.open(device).await?),
            Self::Serial(backend) => AnyRelayLink::Serial(backend.open(device).await?),
            Self::Network(backend) => AnyRelayLink::Network(backend.open(device).await?),
            Self::Mock(backend) => AnyRelayLink::Mock(backend.open(device).await?),
        })
    }
}

/// Enum wrapper for open links.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyRelayLink {
    Usb(UsbLink),
    Serial(SerialLink),
    Network(NetworkLink),
    Mock(MockLink),
}

impl RelayLink for AnyRelayLink {
    async fn send_frame(&mut self, frame: RelayCommandFrame) -> Result<()> {
        match self {
            Self::Usb(link) => link.send_frame(frame).await,
            Self::Serial(link) => link.send_frame(frame).await,
            Self::Network(link) => link.send_frame(frame).await,
            Self::Mock(link) => link.send_frame(frame).await,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            Self::Usb(link) => link.close().await,
            Self::Serial(link) => link.close().await,
            Self::Network(link) => link.close().await,
            Self::Mock(link) => link.close().await,
        }
    }
}

/// Enum wrapper for enumerators. Network controllers are configured, not
/// discovered, so there is no network variant.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyEnumerator {
    Usb(UsbEnumerator),
    Serial(SerialEnumerator),
    Mock(MockEnumerator),
}

impl DeviceEnumerator for AnyEnumerator {
    fn transport(&self) -> TransportKind {
        match self {
            Self::Usb(enumerator) => enumerator.transport(),
            Self::Serial(enumerator) => enumerator.transport(),
            Self::Mock(enumerator) => enumerator.transport(),
        }
    }

    async fn discover(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>> {
        match self {
            Self::Usb(enumerator) => enumerator.discover(vendor_id, product_id).await,
            Self::Serial(enumerator) => enumerator.discover(vendor_id, product_id).await,
            Self::Mock(enumerator) => enumerator.discover(vendor_id, product_id).await,
        }
    }
}

/// One backend per transport.
#[derive(Debug, Clone)]
pub struct BackendSet {
    pub usb: AnyRelayBackend,
    pub serial: AnyRelayBackend,
    pub network: AnyRelayBackend,
}

impl BackendSet {
    /// Every transport served by the same mock recorder.
    pub fn mock(relay: &MockRelay) -> Self {
        Self {
            usb: AnyRelayBackend::Mock(relay.for_transport(TransportKind::Usb)),
            serial: AnyRelayBackend::Mock(relay.for_transport(TransportKind::Serial)),
            network: AnyRelayBackend::Mock(relay.for_transport(TransportKind::Network)),
        }
    }

    pub fn for_transport(&self, transport: TransportKind) -> &AnyRelayBackend {
        match transport {
            TransportKind::Usb => &self.usb,
            TransportKind::Serial => &self.serial,
            TransportKind::Network => &self.network,
        }
    }
}

impl Default for BackendSet {
    /// Real hardware drivers with default timeouts.
    fn default() -> Self {
        Self {
            usb: AnyRelayBackend::Usb(UsbBackend::default()),
            serial: AnyRelayBackend::Serial(SerialBackend::default()),
            network: AnyRelayBackend::Network(NetworkBackend::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_core::RelayAddress;

    #[tokio::test]
    async fn test_any_backend_mock_roundtrip() {
        let (relay, handle) = MockRelay::new();
        let backend = AnyRelayBackend::Mock(relay);
        let device = DeviceDescriptor::new(
            "ch340",
            DeviceIdentity::Serial {
                vendor_id: 0x1a86,
                product_id: 0x7523,
                port_name: "A".into(),
            },
            RelayAddress::default(),
        );

        let mut link = backend.open(&device).await.unwrap();
        assert!(matches!(link, AnyRelayLink::Mock(_)));
        link.send_frame(RelayCommandFrame::encode(1, true).unwrap())
            .await
            .unwrap();
        link.close().await.unwrap();

        assert_eq!(handle.frames("serial:A").len(), 1);
        assert_eq!(handle.close_count("serial:A"), 1);
    }

    #[test]
    fn test_backend_set_selects_by_transport() {
        let set = BackendSet::default();
        for transport in [
            TransportKind::Usb,
            TransportKind::Serial,
            TransportKind::Network,
        ] {
            assert_eq!(set.for_transport(transport).transport(), transport);
        }
    }

    #[tokio::test]
    async fn test_any_enumerator_mock() {
        let enumerator = AnyEnumerator::Mock(MockEnumerator::serial_ports(1, 2, &["A"]));
        assert_eq!(enumerator.transport(), TransportKind::Serial);
        assert_eq!(enumerator.discover(1, 2).await.unwrap().len(), 1);
    }
}

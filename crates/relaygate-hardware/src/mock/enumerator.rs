//! Mock device enumerator with a scripted device list.

use crate::error::{HardwareError, Result};
use crate::traits::DeviceEnumerator;
use relaygate_core::{DeviceIdentity, TransportKind};
use std::collections::HashMap;

/// Enumerator that returns whatever it was loaded with.
///
/// # Examples
///
/// ```
/// use relaygate_hardware::mock::MockEnumerator;
/// use relaygate_hardware::traits::DeviceEnumerator;
///
/// #[tokio::main]
/// async fn main() -> relaygate_hardware::Result<()> {
///     let enumerator = MockEnumerator::serial_ports(0x1a86, 0x7523, &["B", "A"]);
///     let found = enumerator.discover(0x1a86, 0x7523).await?;
///     assert_eq!(found.len(), 2);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockEnumerator {
    transport: TransportKind,
    devices: HashMap<(u16, u16), Vec<DeviceIdentity>>,
    failing: bool,
}

impl MockEnumerator {
    /// Enumerator with no devices attached.
    pub fn new(transport: TransportKind) -> Self {
        Self {
            transport,
            devices: HashMap::new(),
            failing: false,
        }
    }

    /// Serial enumerator listing `ports` (in the given order) for one id pair.
    pub fn serial_ports(vendor_id: u16, product_id: u16, ports: &[&str]) -> Self {
        let identities = ports
            .iter()
            .map(|port| DeviceIdentity::Serial {
                vendor_id,
                product_id,
                port_name: port.to_string(),
            })
            .collect();
        Self::new(TransportKind::Serial).with_devices(vendor_id, product_id, identities)
    }

    /// USB enumerator listing `(bus, address)` pairs in OS order.
    pub fn usb_devices(vendor_id: u16, product_id: u16, devices: &[(u8, u8)]) -> Self {
        let identities = devices
            .iter()
            .enumerate()
            .map(|(index, &(bus, address))| DeviceIdentity::Usb {
                vendor_id,
                product_id,
                bus,
                address,
                enumeration_index: index,
            })
            .collect();
        Self::new(TransportKind::Usb).with_devices(vendor_id, product_id, identities)
    }

    pub fn with_devices(
        mut self,
        vendor_id: u16,
        product_id: u16,
        devices: Vec<DeviceIdentity>,
    ) -> Self {
        self.devices
            .entry((vendor_id, product_id))
            .or_default()
            .extend(devices);
        self
    }

    /// Every discovery fails, as when the OS backend is unavailable.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

impl DeviceEnumerator for MockEnumerator {
    fn transport(&self) -> TransportKind {
        self.transport
    }

    async fn discover(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>> {
        if self.failing {
            return Err(HardwareError::permission(
                format!("{} bus", self.transport),
                "injected enumeration failure",
            ));
        }

        Ok(self
            .devices
            .get(&(vendor_id, product_id))
            .cloned()
            .unwrap_or_default())
    }
}

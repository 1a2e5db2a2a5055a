//! Device registry: one flat relay numbering across every transport.
//!
//! # Numbering
//!
//! ```text
//! 1 .. u          USB devices, sorted by (bus, address) within each profile
//! u+1 .. u+s       serial devices, sorted by port name within each profile
//! u+s+1 .. N       network endpoints, in config order
//! ```
//!
//! The space is rebuilt from a fresh discovery pass on every request. With
//! the same hardware attached, two passes yield the same numbering.

use crate::config::{DeviceProfile, NetworkProfile, RelayControlConfig};
use crate::devices::AnyEnumerator;
use crate::error::{HardwareError, Result};
use crate::serial::SerialEnumerator;
use crate::traits::DeviceEnumerator;
use crate::usb::UsbEnumerator;
use relaygate_core::{DeviceDescriptor, DeviceIdentity, TransportKind};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// One addressable relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressEntry {
    pub descriptor: DeviceDescriptor,

    /// Position among the devices of the same transport (0-based).
    pub local_index: usize,

    /// Hold used when a request names no duration.
    pub default_hold_ms: u64,
}

impl AddressEntry {
    /// Flat relay number (1-based).
    pub fn relay_number(&self) -> u32 {
        self.descriptor.stable_index
    }

    pub fn transport(&self) -> TransportKind {
        self.descriptor.transport()
    }

    pub fn default_hold(&self) -> Duration {
        Duration::from_millis(self.default_hold_ms)
    }
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressSpace {
    entries: Vec<AddressEntry>,
}

impl AddressSpace {
    fn from_entries(mut entries: Vec<AddressEntry>) -> Self {
        let mut per_transport = [0usize; 3];
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.descriptor.stable_index = index as u32 + 1;
            let slot = &mut per_transport[entry.transport() as usize];
            entry.local_index = *slot;
            *slot += 1;
        }
        Self { entries }
    }

    /// Look up a relay number. Pure; touches no hardware.
    ///
    /// # Errors
    ///
    /// `HardwareError::Range` for 0 or anything above [`len`](Self::len).
    pub fn resolve(&self, relay_number: u32) -> Result<&AddressEntry> {
        relay_number
            .checked_sub(1)
            .and_then(|index| self.entries.get(index as usize))
            .ok_or_else(|| HardwareError::range(relay_number, self.entries.len()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AddressEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a AddressSpace {
    type Item = &'a AddressEntry;
    type IntoIter = std::slice::Iter<'a, AddressEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Runs the enumerators and numbers what they find.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    profiles: Vec<DeviceProfile>,
    network: Vec<NetworkProfile>,
    usb: AnyEnumerator,
    serial: AnyEnumerator,
}

impl DeviceRegistry {
    /// Registry backed by the real USB and serial enumerators.
    pub fn new(config: &RelayControlConfig) -> Self {
        Self::with_enumerators(
            config,
            AnyEnumerator::Usb(UsbEnumerator::new()),
            AnyEnumerator::Serial(SerialEnumerator::new()),
        )
    }

    pub fn with_enumerators(
        config: &RelayControlConfig,
        usb: AnyEnumerator,
        serial: AnyEnumerator,
    ) -> Self {
        Self {
            profiles: config.profiles.clone(),
            network: config.network.clone(),
            usb,
            serial,
        }
    }

    /// Discover every device and number it.
    ///
    /// With `brand` set, only that brand's profiles and endpoints take part,
    /// and numbering starts at 1 within the brand. An enumerator failure is
    /// logged and counts as "no devices" for that profile.
    pub async fn build_address_space(&self, brand: Option<&str>) -> AddressSpace {
        let wanted = |name: &str, aliases: &[String]| {
            brand.is_none_or(|b| {
                b.eq_ignore_ascii_case(name) || aliases.iter().any(|a| a.eq_ignore_ascii_case(b))
            })
        };

        let mut entries = Vec::new();
        for (transport, enumerator) in [
            (TransportKind::Usb, &self.usb),
            (TransportKind::Serial, &self.serial),
        ] {
            for profile in self
                .profiles
                .iter()
                .filter(|p| p.transport == transport && wanted(&p.brand, &p.aliases))
            {
                let mut identities = match enumerator
                    .discover(profile.vendor_id, profile.product_id)
                    .await
                {
                    Ok(identities) => identities,
                    Err(e) => {
                        warn!(
                            brand = %profile.brand,
                            transport = %transport,
                            error = %e,
                            "Discovery failed, treating as no devices"
                        );
                        Vec::new()
                    }
                };
                identities.sort_by(|a, b| discovery_order(a).cmp(&discovery_order(b)));

                entries.extend(identities.into_iter().map(|identity| AddressEntry {
                    descriptor: DeviceDescriptor::new(&profile.brand, identity, profile.channel),
                    local_index: 0,
                    default_hold_ms: profile.default_hold_ms,
                }));
            }
        }

        entries.extend(
            self.network
                .iter()
                .filter(|n| wanted(&n.brand, &n.aliases))
                .map(|endpoint| AddressEntry {
                    descriptor: DeviceDescriptor::new(
                        &endpoint.brand,
                        DeviceIdentity::Network {
                            host: endpoint.host.clone(),
                            port: endpoint.port,
                        },
                        endpoint.channel,
                    ),
                    local_index: 0,
                    default_hold_ms: endpoint.default_hold_ms,
                }),
        );

        let space = AddressSpace::from_entries(entries);
        debug!(brand = ?brand, relays = space.len(), "Address space built");
        space
    }
}

/// Sort key within one profile: USB by (bus, address), serial by port name.
fn discovery_order(identity: &DeviceIdentity) -> (u8, u8, &str) {
    match identity {
        DeviceIdentity::Usb { bus, address, .. } => (*bus, *address, ""),
        DeviceIdentity::Serial { port_name, .. } => (0, 0, port_name.as_str()),
        DeviceIdentity::Network { host, .. } => (0, 0, host.as_str()),
    }
}

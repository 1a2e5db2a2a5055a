use crate::{
    Result,
    constants::{
        DIAGNOSTIC_SEPARATOR, MAX_RELAY_ADDRESS, MIN_RELAY_ADDRESS, NO_DEVICE_DIAGNOSTIC,
        STATE_OFF, STATE_ON,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relay channel on a board (1-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct RelayAddress(u8);

impl RelayAddress {
    /// Create a relay address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidRelayAddress` if the address is outside 1-255.
    pub fn new(address: u16) -> Result<Self> {
        if address < u16::from(MIN_RELAY_ADDRESS) || address > u16::from(MAX_RELAY_ADDRESS) {
            return Err(Error::InvalidRelayAddress(address));
        }
        Ok(RelayAddress(address as u8))
    }

    /// Get the raw address byte.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for RelayAddress {
    fn default() -> Self {
        RelayAddress(crate::constants::DEFAULT_RELAY_CHANNEL)
    }
}

impl TryFrom<u16> for RelayAddress {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        RelayAddress::new(value)
    }
}

impl From<RelayAddress> for u16 {
    fn from(address: RelayAddress) -> Self {
        u16::from(address.0)
    }
}

impl fmt::Display for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RelayAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let address: u16 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidRelayNumber(s.to_string()))?;
        RelayAddress::new(address)
    }
}

/// Desired contact state carried in a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayState {
    /// Contact released.
    Off,
    /// Contact energized.
    On,
}

impl RelayState {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            STATE_OFF => Ok(RelayState::Off),
            STATE_ON => Ok(RelayState::On),
            other => Err(Error::InvalidRelayState(other)),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            RelayState::Off => STATE_OFF,
            RelayState::On => STATE_ON,
        }
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on { RelayState::On } else { RelayState::Off }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RelayState::Off => write!(f, "off"),
            RelayState::On => write!(f, "on"),
        }
    }
}

/// Transport a relay board is reached through.
///
/// The declaration order is the registry priority order: USB devices are
/// numbered first, then serial converters, then network controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Usb,
    Serial,
    Network,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Usb => write!(f, "USB"),
            Self::Serial => write!(f, "serial"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Transport-specific identity of one physical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum DeviceIdentity {
    Usb {
        vendor_id: u16,
        product_id: u16,
        bus: u8,
        address: u8,
        /// Position among the matching devices in OS enumeration order.
        enumeration_index: usize,
    },
    Serial {
        vendor_id: u16,
        product_id: u16,
        port_name: String,
    },
    Network {
        host: String,
        port: u16,
    },
}

impl DeviceIdentity {
    pub fn transport(&self) -> TransportKind {
        match self {
            Self::Usb { .. } => TransportKind::Usb,
            Self::Serial { .. } => TransportKind::Serial,
            Self::Network { .. } => TransportKind::Network,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Usb {
                vendor_id,
                product_id,
                bus,
                address,
                ..
            } => write!(
                f,
                "USB {vendor_id:04x}:{product_id:04x} bus {bus:03} device {address:03}"
            ),
            Self::Serial { port_name, .. } => write!(f, "serial port {port_name}"),
            Self::Network { host, port } => write!(f, "tcp {host}:{port}"),
        }
    }
}

/// One discovered (or configured) relay device.
///
/// Descriptors are rebuilt on every discovery pass and own no hardware
/// resources; a link is only opened when a trigger runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Brand of the profile that produced this device (e.g. "ch340").
    pub brand: String,

    /// Transport-specific identity.
    pub identity: DeviceIdentity,

    /// Relay channel addressed on the board.
    pub channel: RelayAddress,

    /// Flat relay number assigned by the registry (0 until assigned).
    pub stable_index: u32,
}

impl DeviceDescriptor {
    pub fn new(brand: impl Into<String>, identity: DeviceIdentity, channel: RelayAddress) -> Self {
        Self {
            brand: brand.into(),
            identity,
            channel,
            stable_index: 0,
        }
    }

    pub fn transport(&self) -> TransportKind {
        self.identity.transport()
    }

    /// Key identifying the physical device, stable for as long as it stays
    /// attached. Two descriptors with the same key refer to the same hardware.
    pub fn identity_key(&self) -> String {
        match &self.identity {
            DeviceIdentity::Usb { bus, address, .. } => format!("usb:{bus}:{address}"),
            DeviceIdentity::Serial { port_name, .. } => format!("serial:{port_name}"),
            DeviceIdentity::Network { host, port } => format!("tcp:{host}:{port}"),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.identity, self.brand)
    }
}

/// Request to pulse one relay or every relay of a brand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    /// Flat relay number; `None` triggers every matching device.
    pub relay_number: Option<u32>,

    /// Hold duration in milliseconds; `None` uses the profile default.
    #[serde(alias = "duration")]
    pub duration_ms: Option<u64>,

    /// Brand name; `None` means every brand.
    pub brand: Option<String>,
}

impl TriggerRequest {
    /// Trigger every discovered device.
    pub fn all() -> Self {
        Self::default()
    }

    /// Trigger one relay by its flat number.
    pub fn relay(relay_number: u32) -> Self {
        Self {
            relay_number: Some(relay_number),
            ..Self::default()
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

/// Outcome of a trigger attempt (one device, or an aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResult {
    pub success: bool,
    pub diagnostic: String,
}

impl TriggerResult {
    pub fn ok(diagnostic: impl Into<String>) -> Self {
        Self {
            success: true,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: diagnostic.into(),
        }
    }

    /// Failure reported when discovery found no device to trigger.
    pub fn no_device() -> Self {
        Self::failure(NO_DEVICE_DIAGNOSTIC)
    }

    /// Combine per-device results.
    ///
    /// Succeeds when at least one attempt succeeded. Every diagnostic is kept,
    /// in attempt order. An empty set is the "no matching device" failure.
    pub fn aggregate(results: impl IntoIterator<Item = TriggerResult>) -> Self {
        let results: Vec<TriggerResult> = results.into_iter().collect();
        if results.is_empty() {
            return Self::no_device();
        }
        if results.len() == 1 {
            return results.into_iter().next().unwrap_or_else(Self::no_device);
        }

        let success = results.iter().any(|r| r.success);
        let diagnostic = results
            .iter()
            .map(|r| r.diagnostic.as_str())
            .collect::<Vec<_>>()
            .join(DIAGNOSTIC_SEPARATOR);

        Self {
            success,
            diagnostic,
        }
    }
}

impl fmt::Display for TriggerResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = if self.success { "ok" } else { "failed" };
        write!(f, "{status}: {}", self.diagnostic)
    }
}

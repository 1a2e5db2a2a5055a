//! Relay control configuration.
//!
//! The configuration names the relay brands the system knows about. USB and
//! serial brands are *profiles*: a vendor/product id pair that discovery
//! looks for. Network brands are fixed endpoints.
//!
//! # TOML Format
//!
//! ```toml
//! serial_baud_rate = 9600
//!
//! [timeouts]
//! serial_ms = 1000
//! usb_transfer_ms = 1000
//! network_connect_ms = 5000
//!
//! [[profile]]
//! brand = "msr"
//! transport = "usb"
//! vendor_id = 0x5131
//! product_id = 0x2007
//!
//! [[profile]]
//! brand = "ch340"
//! aliases = ["ch340-converter"]
//! transport = "serial"
//! vendor_id = 0x1a86
//! product_id = 0x7523
//!
//! [[network]]
//! brand = "rn-62"
//! host = "10.10.10.180"
//! port = 9747
//! ```
//!
//! Every field is optional; missing fields take the [`Default`] values, which
//! describe the MSR USB board and the CH340 serial converter.

use crate::devices::{AnyRelayBackend, BackendSet};
use crate::network::NetworkBackend;
use crate::serial::SerialBackend;
use crate::usb::UsbBackend;
use relaygate_core::{
    Error, RelayAddress, Result, TransportKind,
    constants::{
        CH340_PRODUCT_ID, CH340_VENDOR_ID, DEFAULT_HOLD_MS, MSR_PRODUCT_ID, MSR_VENDOR_ID,
        NETWORK_CONNECT_TIMEOUT_MS, SERIAL_BAUD_RATE, SERIAL_TIMEOUT_MS, USB_TRANSFER_TIMEOUT_MS,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

fn default_hold_ms() -> u64 {
    DEFAULT_HOLD_MS
}

/// A discoverable relay brand (USB or serial).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub brand: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    pub transport: TransportKind,
    pub vendor_id: u16,
    pub product_id: u16,

    /// Relay channel addressed on each board.
    #[serde(default)]
    pub channel: RelayAddress,

    #[serde(default = "default_hold_ms")]
    pub default_hold_ms: u64,
}

impl DeviceProfile {
    pub fn usb(brand: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self::new(brand, TransportKind::Usb, vendor_id, product_id)
    }

    pub fn serial(brand: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self::new(brand, TransportKind::Serial, vendor_id, product_id)
    }

    fn new(
        brand: impl Into<String>,
        transport: TransportKind,
        vendor_id: u16,
        product_id: u16,
    ) -> Self {
        Self {
            brand: brand.into(),
            aliases: Vec::new(),
            transport,
            vendor_id,
            product_id,
            channel: RelayAddress::default(),
            default_hold_ms: DEFAULT_HOLD_MS,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Case-insensitive match on the brand or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        answers_to(&self.brand, &self.aliases, name)
    }
}

/// A relay controller at a fixed TCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub brand: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    pub host: String,
    pub port: u16,

    #[serde(default)]
    pub channel: RelayAddress,

    #[serde(default = "default_hold_ms")]
    pub default_hold_ms: u64,
}

impl NetworkProfile {
    pub fn new(brand: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            brand: brand.into(),
            aliases: Vec::new(),
            host: host.into(),
            port,
            channel: RelayAddress::default(),
            default_hold_ms: DEFAULT_HOLD_MS,
        }
    }

    pub fn answers_to(&self, name: &str) -> bool {
        answers_to(&self.brand, &self.aliases, name)
    }
}

fn answers_to(brand: &str, aliases: &[String], name: &str) -> bool {
    brand.eq_ignore_ascii_case(name) || aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
}

/// Transport timeouts in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub serial_ms: u64,
    pub usb_transfer_ms: u64,
    pub network_connect_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            serial_ms: SERIAL_TIMEOUT_MS,
            usb_transfer_ms: USB_TRANSFER_TIMEOUT_MS,
            network_connect_ms: NETWORK_CONNECT_TIMEOUT_MS,
        }
    }
}

/// Top-level configuration for [`RelayControl`](crate::RelayControl).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayControlConfig {
    pub serial_baud_rate: u32,

    pub timeouts: TimeoutConfig,

    /// USB and serial brands, numbered in this order within each transport.
    #[serde(rename = "profile")]
    pub profiles: Vec<DeviceProfile>,

    /// Network controllers, numbered after every discovered device.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network: Vec<NetworkProfile>,
}

impl Default for RelayControlConfig {
    fn default() -> Self {
        Self {
            serial_baud_rate: SERIAL_BAUD_RATE,
            timeouts: TimeoutConfig::default(),
            profiles: vec![
                DeviceProfile::usb("msr", MSR_VENDOR_ID, MSR_PRODUCT_ID),
                DeviceProfile::serial("ch340", CH340_VENDOR_ID, CH340_PRODUCT_ID)
                    .with_alias("ch340-converter"),
            ],
            network: Vec::new(),
        }
    }
}

impl RelayControlConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for malformed TOML or an inconsistent
    /// configuration (see [`validate`](Self::validate)).
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check the configuration for consistency.
    ///
    /// - profiles use the USB or serial transport
    /// - brand names and aliases are unique (case-insensitive)
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();

        for profile in &self.profiles {
            if profile.transport == TransportKind::Network {
                return Err(Error::Config(format!(
                    "profile '{}': network controllers belong in [[network]]",
                    profile.brand
                )));
            }
            register_names(&mut names, &profile.brand, &profile.aliases)?;
        }
        for endpoint in &self.network {
            register_names(&mut names, &endpoint.brand, &endpoint.aliases)?;
        }
        Ok(())
    }

    /// Canonical brand name for `name` (brand or alias, any case).
    pub fn resolve_brand(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.profiles
            .iter()
            .find(|p| p.answers_to(name))
            .map(|p| p.brand.as_str())
            .or_else(|| {
                self.network
                    .iter()
                    .find(|n| n.answers_to(name))
                    .map(|n| n.brand.as_str())
            })
    }

    /// Every canonical brand name, profiles first.
    pub fn brands(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .map(|p| p.brand.as_str())
            .chain(self.network.iter().map(|n| n.brand.as_str()))
            .collect()
    }

    /// Hardware backends using the configured timeouts.
    pub fn backends(&self) -> BackendSet {
        let connect = Duration::from_millis(self.timeouts.network_connect_ms);
        BackendSet {
            usb: AnyRelayBackend::Usb(UsbBackend::new(Duration::from_millis(
                self.timeouts.usb_transfer_ms,
            ))),
            serial: AnyRelayBackend::Serial(SerialBackend::new(
                self.serial_baud_rate,
                Duration::from_millis(self.timeouts.serial_ms),
            )),
            network: AnyRelayBackend::Network(NetworkBackend::new(connect, connect)),
        }
    }
}

fn register_names(names: &mut HashSet<String>, brand: &str, aliases: &[String]) -> Result<()> {
    if brand.trim().is_empty() {
        return Err(Error::Config("brand name must not be empty".to_string()));
    }
    for name in std::iter::once(brand).chain(aliases.iter().map(String::as_str)) {
        if !names.insert(name.to_ascii_lowercase()) {
            return Err(Error::Config(format!("brand name '{name}' is used twice")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_default_matches_known_hardware() {
        let config = RelayControlConfig::default();
        config.validate().unwrap();

        assert_eq!(config.profiles[0].transport, TransportKind::Usb);
        assert_eq!(config.profiles[0].vendor_id, 0x5131);
        assert_eq!(config.profiles[1].vendor_id, 0x1a86);
        assert_eq!(config.profiles[1].default_hold_ms, 1000);
        assert!(config.network.is_empty());
    }

    #[rstest]
    #[case("ch340", Some("ch340"))]
    #[case("CH340", Some("ch340"))]
    #[case("ch340-converter", Some("ch340"))]
    #[case("MSR", Some("msr"))]
    #[case(" msr ", Some("msr"))]
    #[case("acme", None)]
    fn test_resolve_brand(#[case] name: &str, #[case] expected: Option<&str>) {
        let config = RelayControlConfig::default();
        assert_eq!(config.resolve_brand(name), expected);
    }

    #[test]
    fn test_parse_full_document() {
        let config = RelayControlConfig::from_toml_str(
            r#"
            serial_baud_rate = 19200

            [timeouts]
            network_connect_ms = 2000

            [[profile]]
            brand = "ch340"
            transport = "serial"
            vendor_id = 0x1a86
            product_id = 0x7523
            channel = 2
            default_hold_ms = 250

            [[network]]
            brand = "rn-62"
            host = "10.10.10.180"
            port = 9747
            "#,
        )
        .unwrap();

        assert_eq!(config.profiles.len(), 1);
        assert_eq!(config.profiles[0].channel.as_u8(), 2);
        assert_eq!(config.profiles[0].default_hold_ms, 250);
        assert_eq!(config.network[0].port, 9747);
        assert_eq!(config.timeouts.network_connect_ms, 2000);
        assert_eq!(config.timeouts.serial_ms, 1000);
        assert_eq!(config.serial_baud_rate, 19200);
        assert_eq!(config.brands(), vec!["ch340", "rn-62"]);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = RelayControlConfig::from_toml_str("").unwrap();
        assert_eq!(config, RelayControlConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = RelayControlConfig::default();
        config
            .network
            .push(NetworkProfile::new("rn-62", "10.10.10.180", 9747));

        let text = config.to_toml_string().unwrap();
        let parsed = RelayControlConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[rstest]
    #[case::zero_channel(
        "[[profile]]\nbrand = \"ch340\"\ntransport = \"serial\"\nvendor_id = 1\nproduct_id = 2\nchannel = 0\n"
    )]
    #[case::network_profile(
        "[[profile]]\nbrand = \"ch340\"\ntransport = \"network\"\nvendor_id = 1\nproduct_id = 2\n"
    )]
    #[case::duplicate_brand(
        "[[profile]]\nbrand = \"ch340\"\ntransport = \"serial\"\nvendor_id = 1\nproduct_id = 2\n\n[[network]]\nbrand = \"CH340\"\nhost = \"h\"\nport = 1\n"
    )]
    #[case::wrong_type("serial_baud_rate = \"fast\"\n")]
    #[case::malformed("serial_baud_rate = ")]
    fn test_invalid_documents(#[case] input: &str) {
        assert!(RelayControlConfig::from_toml_str(input).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "serial_baud_rate = 115200").unwrap();

        let config = RelayControlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.serial_baud_rate, 115200);
        assert_eq!(config.profiles, RelayControlConfig::default().profiles);
    }

    #[test]
    fn test_from_missing_file() {
        let result = RelayControlConfig::from_file("/nonexistent/relaygate.toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_backends_use_timeouts() {
        let config = RelayControlConfig::default();
        let backends = config.backends();
        assert!(matches!(backends.usb, AnyRelayBackend::Usb(_)));
        assert!(matches!(backends.serial, AnyRelayBackend::Serial(_)));
        assert!(matches!(backends.network, AnyRelayBackend::Network(_)));
    }
}

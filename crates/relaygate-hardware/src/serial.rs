//! Relay boards behind a USB-to-serial converter (CH340 and friends).
//!
//! The converter is found through the OS serial port list by its USB
//! vendor/product id. Ports are opened 8-N-1 with no flow control; the board
//! never answers, so the link only writes.

use crate::error::{HardwareError, Result};
use crate::traits::{DeviceEnumerator, RelayBackend, RelayLink};
use parking_lot::Mutex;
use relaygate_core::{
    DeviceDescriptor, DeviceIdentity, TransportKind,
    constants::{SERIAL_BAUD_RATE, SERIAL_TIMEOUT_MS},
};
use relaygate_protocol::RelayCommandFrame;
use serialport::{
    DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits,
};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Lists serial ports whose USB bridge matches a vendor/product id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialEnumerator;

impl SerialEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceEnumerator for SerialEnumerator {
    fn transport(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn discover(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>> {
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await?
            .map_err(|e| HardwareError::from_serial("serial port list", e))?;

        let found = matching_ports(&ports, vendor_id, product_id);
        debug!(
            scanned = ports.len(),
            matched = found.len(),
            "Serial discovery complete"
        );
        Ok(found)
    }
}

/// Keep USB-backed ports with the given ids, sorted by port name.
pub fn matching_ports(
    ports: &[SerialPortInfo],
    vendor_id: u16,
    product_id: u16,
) -> Vec<DeviceIdentity> {
    let mut names: Vec<&str> = ports
        .iter()
        .filter_map(|port| match &port.port_type {
            SerialPortType::UsbPort(usb) if usb.vid == vendor_id && usb.pid == product_id => {
                Some(port.port_name.as_str())
            }
            _ => None,
        })
        .collect();
    names.sort_unstable();
    names.dedup();

    names
        .into_iter()
        .map(|port_name| DeviceIdentity::Serial {
            vendor_id,
            product_id,
            port_name: port_name.to_string(),
        })
        .collect()
}

/// Opens [`SerialLink`]s.
#[derive(Debug, Clone)]
pub struct SerialBackend {
    baud_rate: u32,
    timeout: Duration,
}

impl SerialBackend {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }
}

impl Default for SerialBackend {
    fn default() -> Self {
        Self::new(SERIAL_BAUD_RATE, Duration::from_millis(SERIAL_TIMEOUT_MS))
    }
}

impl RelayBackend for SerialBackend {
    type Link = SerialLink;

    fn transport(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn open(&self, device: &DeviceDescriptor) -> Result<SerialLink> {
        let DeviceIdentity::Serial { port_name, .. } = &device.identity else {
            return Err(HardwareError::protocol(device.to_string(), "not a serial device"));
        };

        let name = device.identity.to_string();
        let path = port_name.clone();
        let (baud_rate, timeout) = (self.baud_rate, self.timeout);

        let port = tokio::task::spawn_blocking(move || {
            serialport::new(path, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(timeout)
                .open()
        })
        .await?
        .map_err(|e| HardwareError::from_serial(&name, e))?;

        info!(device = %name, baud_rate, "Serial relay opened");
        Ok(SerialLink {
            name,
            port: Arc::new(Mutex::new(port)),
        })
    }
}

/// Open serial port to a relay board. The port closes when the link drops.
pub struct SerialLink {
    name: String,
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLink")
            .field("device", &self.name)
            .finish()
    }
}

impl RelayLink for SerialLink {
    async fn send_frame(&mut self, frame: RelayCommandFrame) -> Result<()> {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let mut port = port.lock();
            port.write_all(frame.as_bytes())?;
            port.flush()
        })
        .await?
        .map_err(|e| HardwareError::from_serial_io(&self.name, e))
    }

    async fn close(self) -> Result<()> {
        debug!(device = %self.name, "Closing serial port");
        drop(self.port);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb_port(name: &str, vid: u16, pid: u16) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        }
    }

    fn port_names(found: &[DeviceIdentity]) -> Vec<String> {
        found
            .iter()
            .map(|identity| match identity {
                DeviceIdentity::Serial { port_name, .. } => port_name.clone(),
                other => panic!("unexpected identity {other}"),
            })
            .collect()
    }

    #[test]
    fn test_matching_ports_sorted_by_name() {
        let ports = vec![
            usb_port("B", 0x1a86, 0x7523),
            usb_port("A", 0x1a86, 0x7523),
        ];

        let found = matching_ports(&ports, 0x1a86, 0x7523);
        assert_eq!(port_names(&found), vec!["A", "B"]);
    }

    #[test]
    fn test_matching_ports_filters_ids_and_non_usb() {
        let ports = vec![
            usb_port("/dev/ttyUSB0", 0x1a86, 0x7523),
            usb_port("/dev/ttyUSB1", 0x0403, 0x6001),
            SerialPortInfo {
                port_name: "/dev/ttyS0".to_string(),
                port_type: SerialPortType::Unknown,
            },
        ];

        let found = matching_ports(&ports, 0x1a86, 0x7523);
        assert_eq!(port_names(&found), vec!["/dev/ttyUSB0"]);
    }

    #[test]
    fn test_matching_ports_empty() {
        assert!(matching_ports(&[], 0x1a86, 0x7523).is_empty());
    }

    #[test]
    fn test_backend_defaults() {
        let backend = SerialBackend::default();
        assert_eq!(backend.baud_rate, 9600);
        assert_eq!(backend.timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_open_missing_port_is_connection_error() {
        let device = DeviceDescriptor::new(
            "ch340",
            DeviceIdentity::Serial {
                vendor_id: 0x1a86,
                product_id: 0x7523,
                port_name: "/dev/relaygate-does-not-exist".into(),
            },
            Default::default(),
        );

        let error = SerialBackend::default().open(&device).await.unwrap_err();
        assert!(error.is_connection(), "unexpected error: {error}");
    }
}

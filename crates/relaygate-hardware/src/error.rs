//! Error types for relay hardware operations.
//!
//! Every failure a device attempt can hit is mapped into [`HardwareError`] at
//! the backend boundary. The control facade turns these into
//! [`TriggerResult`](relaygate_core::TriggerResult) diagnostics, so nothing
//! below escapes a trigger call as a fault.

use relaygate_network::TcpClientError;
use std::io;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while discovering or driving relay devices.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Relay number outside the flat address space. No hardware is touched.
    #[error("relay number {relay_number} is out of range ({available} relays available)")]
    Range { relay_number: u32, available: usize },

    /// Discovery found no device for the request. Reported as the trigger
    /// diagnostic when the address space is empty.
    #[error("no matching device found")]
    Discovery,

    /// Endpoint unreachable, vanished, or timed out.
    #[error("connection to {device} failed: {message}")]
    Connection { device: String, message: String },

    /// Remote endpoint actively refused the connection.
    #[error("connection to {device} refused")]
    ConnectionRefused { device: String },

    /// The OS denied raw access to the device.
    #[error("permission denied for {device}: {message}")]
    Permission { device: String, message: String },

    /// Device already claimed by a kernel driver or another process.
    #[error("{device} is busy")]
    DeviceBusy { device: String },

    /// Expected endpoint or response shape absent.
    #[error("protocol error on {device}: {message}")]
    Protocol { device: String, message: String },

    /// Brand name not present in the configuration.
    #[error("unknown relay brand: {0}")]
    UnknownBrand(String),

    /// Blocking or spawned task failed to complete.
    #[error("task failed: {0}")]
    Task(String),
}

impl HardwareError {
    pub fn range(relay_number: u32, available: usize) -> Self {
        Self::Range {
            relay_number,
            available,
        }
    }

    pub fn connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn connection_refused(device: impl Into<String>) -> Self {
        Self::ConnectionRefused {
            device: device.into(),
        }
    }

    pub fn permission(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permission {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn busy(device: impl Into<String>) -> Self {
        Self::DeviceBusy {
            device: device.into(),
        }
    }

    pub fn protocol(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn unknown_brand(brand: impl Into<String>) -> Self {
        Self::UnknownBrand(brand.into())
    }

    /// True for every flavour of "could not reach the device", including a
    /// refused connection.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionRefused { .. }
        )
    }

    /// Classify a libusb failure.
    pub fn from_usb(device: impl Into<String>, error: rusb::Error) -> Self {
        match error {
            rusb::Error::Busy => Self::busy(device),
            rusb::Error::Access => Self::permission(device, error.to_string()),
            other => Self::protocol(device, other.to_string()),
        }
    }

    /// Classify a serial port failure.
    pub fn from_serial(device: impl Into<String>, error: serialport::Error) -> Self {
        match error.kind() {
            serialport::ErrorKind::NoDevice => Self::connection(device, error.description),
            serialport::ErrorKind::Io(kind) => Self::from_io_kind(device, kind, error.description),
            _ => Self::connection(device, error.description),
        }
    }

    /// Classify an I/O failure on an open serial port.
    pub fn from_serial_io(device: impl Into<String>, error: io::Error) -> Self {
        Self::from_io_kind(device, error.kind(), error.to_string())
    }

    fn from_io_kind(device: impl Into<String>, kind: io::ErrorKind, message: String) -> Self {
        match kind {
            io::ErrorKind::PermissionDenied => Self::permission(device, message),
            io::ErrorKind::ResourceBusy => Self::busy(device),
            io::ErrorKind::TimedOut => Self::protocol(device, message),
            _ => Self::connection(device, message),
        }
    }

    /// Map a TCP client failure for the controller at `endpoint`.
    pub fn from_tcp(endpoint: impl Into<String>, error: TcpClientError) -> Self {
        match error {
            TcpClientError::ConnectionRefused(refused) => Self::connection_refused(refused),
            other => Self::connection(endpoint, other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for HardwareError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Task(error.to_string())
    }
}

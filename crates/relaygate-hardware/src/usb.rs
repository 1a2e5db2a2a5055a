//! USB relay boards driven through libusb.
//!
//! The MSR-style board enumerates as a vendor-specific device with a single
//! OUT endpoint on interface 0. The command frame is written to that endpoint
//! as a bulk or interrupt transfer, whichever the descriptor advertises.
//!
//! libusb calls block, so every one of them runs on the tokio blocking pool.

use crate::error::{HardwareError, Result};
use crate::traits::{DeviceEnumerator, RelayBackend, RelayLink};
use parking_lot::Mutex;
use relaygate_core::{
    DeviceDescriptor, DeviceIdentity, TransportKind, constants::USB_TRANSFER_TIMEOUT_MS,
};
use relaygate_protocol::RelayCommandFrame;
use rusb::{ConfigDescriptor, Device, DeviceHandle, Direction, GlobalContext, TransferType};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interface carrying the relay endpoint.
const RELAY_INTERFACE: u8 = 0;

/// Lists USB devices by vendor/product id.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsbEnumerator;

impl UsbEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceEnumerator for UsbEnumerator {
    fn transport(&self) -> TransportKind {
        TransportKind::Usb
    }

    async fn discover(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>> {
        let found =
            tokio::task::spawn_blocking(move || list_matching(vendor_id, product_id)).await??;

        debug!(
            vendor_id = %format!("{vendor_id:04x}"),
            product_id = %format!("{product_id:04x}"),
            count = found.len(),
            "USB discovery complete"
        );
        Ok(found)
    }
}

/// Matching devices in OS enumeration order.
fn list_matching(vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>> {
    let devices = rusb::devices().map_err(|e| HardwareError::from_usb("USB bus", e))?;

    let mut found = Vec::new();
    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(
                    bus = device.bus_number(),
                    address = device.address(),
                    error = %e,
                    "Skipping device with unreadable descriptor"
                );
                continue;
            }
        };

        if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
            found.push(DeviceIdentity::Usb {
                vendor_id,
                product_id,
                bus: device.bus_number(),
                address: device.address(),
                enumeration_index: found.len(),
            });
        }
    }

    Ok(found)
}

fn find_device(
    vendor_id: u16,
    product_id: u16,
    bus: u8,
    address: u8,
) -> Result<Option<Device<GlobalContext>>> {
    let devices = rusb::devices().map_err(|e| HardwareError::from_usb("USB bus", e))?;

    Ok(devices.iter().find(|device| {
        device.bus_number() == bus
            && device.address() == address
            && device
                .device_descriptor()
                .map(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
                .unwrap_or(false)
    }))
}

/// Opens [`UsbLink`]s.
#[derive(Debug, Clone)]
pub struct UsbBackend {
    transfer_timeout: Duration,
}

impl UsbBackend {
    pub fn new(transfer_timeout: Duration) -> Self {
        Self { transfer_timeout }
    }
}

impl Default for UsbBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(USB_TRANSFER_TIMEOUT_MS))
    }
}

impl RelayBackend for UsbBackend {
    type Link = UsbLink;

    fn transport(&self) -> TransportKind {
        TransportKind::Usb
    }

    async fn open(&self, device: &DeviceDescriptor) -> Result<UsbLink> {
        let DeviceIdentity::Usb {
            vendor_id,
            product_id,
            bus,
            address,
            ..
        } = device.identity
        else {
            return Err(HardwareError::protocol(device.to_string(), "not a USB device"));
        };

        let name = device.identity.to_string();
        let timeout = self.transfer_timeout;
        let session = tokio::task::spawn_blocking(move || {
            UsbSession::open(name, vendor_id, product_id, bus, address, timeout)
        })
        .await??;

        info!(
            device = %session.name,
            endpoint = %format!("{:#04x}", session.endpoint),
            "USB relay opened"
        );
        Ok(UsbLink {
            session: Arc::new(Mutex::new(session)),
        })
    }
}

/// Claimed interface plus the OUT endpoint found on it.
struct UsbSession {
    name: String,
    handle: DeviceHandle<GlobalContext>,
    endpoint: u8,
    transfer_type: TransferType,
    timeout: Duration,
    claimed: bool,
}

/// The parts of a configuration descriptor the open sequence needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigLayout {
    number: u8,
    interfaces: Vec<u8>,
    out_endpoint: Option<(u8, TransferType)>,
}

impl ConfigLayout {
    fn from_descriptor(config: &ConfigDescriptor) -> Self {
        let out_endpoint = config
            .interfaces()
            .filter(|interface| interface.number() == RELAY_INTERFACE)
            .flat_map(|interface| interface.descriptors())
            .flat_map(|descriptor| descriptor.endpoint_descriptors())
            .find(|endpoint| {
                endpoint.direction() == Direction::Out
                    && matches!(
                        endpoint.transfer_type(),
                        TransferType::Bulk | TransferType::Interrupt
                    )
            })
            .map(|endpoint| (endpoint.address(), endpoint.transfer_type()));

        Self {
            number: config.number(),
            interfaces: config.interfaces().map(|i| i.number()).collect(),
            out_endpoint,
        }
    }
}

/// Handle operations used while preparing a session.
trait SessionHandle {
    fn reset(&self) -> rusb::Result<()>;
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool>;
    fn detach_kernel_driver(&self, interface: u8) -> rusb::Result<()>;
    fn set_active_configuration(&self, config: u8) -> rusb::Result<()>;
    fn claim_interface(&self, interface: u8) -> rusb::Result<()>;
    fn release_interface(&self, interface: u8) -> rusb::Result<()>;
}

impl SessionHandle for DeviceHandle<GlobalContext> {
    fn reset(&self) -> rusb::Result<()> {
        DeviceHandle::reset(self)
    }

    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        DeviceHandle::kernel_driver_active(self, interface)
    }

    fn detach_kernel_driver(&self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, interface)
    }

    fn set_active_configuration(&self, config: u8) -> rusb::Result<()> {
        DeviceHandle::set_active_configuration(self, config)
    }

    fn claim_interface(&self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, interface)
    }

    fn release_interface(&self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, interface)
    }
}

/// Reset, detach kernel drivers, select the configuration, claim interface 0
/// and locate its OUT endpoint, in that order.
///
/// Only kernel driver detach is allowed to fail. On success interface 0 is
/// claimed; on failure it is not.
fn prepare<H: SessionHandle>(
    handle: &H,
    name: &str,
    layout: &ConfigLayout,
) -> Result<(u8, TransferType)> {
    handle
        .reset()
        .map_err(|e| HardwareError::from_usb(name, e))?;

    for &number in &layout.interfaces {
        match handle.kernel_driver_active(number) {
            Ok(true) => match handle.detach_kernel_driver(number) {
                Ok(()) => debug!(device = %name, interface = number, "Detached kernel driver"),
                Err(e) => warn!(
                    device = %name,
                    interface = number,
                    error = %e,
                    "Could not detach kernel driver"
                ),
            },
            Ok(false) => {}
            Err(e) => debug!(
                device = %name,
                interface = number,
                error = %e,
                "Kernel driver query unsupported"
            ),
        }
    }

    handle
        .set_active_configuration(layout.number)
        .map_err(|e| HardwareError::from_usb(name, e))?;
    handle
        .claim_interface(RELAY_INTERFACE)
        .map_err(|e| HardwareError::from_usb(name, e))?;

    match layout.out_endpoint {
        Some(endpoint) => Ok(endpoint),
        None => {
            if let Err(e) = handle.release_interface(RELAY_INTERFACE) {
                debug!(device = %name, error = %e, "Release after failed open failed");
            }
            Err(HardwareError::protocol(
                name,
                "no OUT bulk/interrupt endpoint on interface 0",
            ))
        }
    }
}

impl UsbSession {
    fn open(
        name: String,
        vendor_id: u16,
        product_id: u16,
        bus: u8,
        address: u8,
        timeout: Duration,
    ) -> Result<Self> {
        let device = find_device(vendor_id, product_id, bus, address)?
            .ok_or_else(|| HardwareError::connection(&name, "device is no longer attached"))?;
        let handle = device
            .open()
            .map_err(|e| HardwareError::from_usb(&name, e))?;

        let config = device
            .active_config_descriptor()
            .or_else(|_| device.config_descriptor(0))
            .map_err(|e| HardwareError::from_usb(&name, e))?;
        let (endpoint, transfer_type) =
            prepare(&handle, &name, &ConfigLayout::from_descriptor(&config))?;

        Ok(Self {
            name,
            handle,
            endpoint,
            transfer_type,
            timeout,
            claimed: true,
        })
    }

    fn write(&self, frame: &RelayCommandFrame) -> Result<()> {
        let bytes = frame.as_bytes();
        let written = match self.transfer_type {
            TransferType::Interrupt => {
                self.handle
                    .write_interrupt(self.endpoint, bytes, self.timeout)
            }
            _ => self.handle.write_bulk(self.endpoint, bytes, self.timeout),
        }
        .map_err(|e| HardwareError::from_usb(&self.name, e))?;

        if written != bytes.len() {
            return Err(HardwareError::protocol(
                &self.name,
                format!("short write: {written} of {} bytes", bytes.len()),
            ));
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.claimed {
            self.claimed = false;
            self.handle
                .release_interface(RELAY_INTERFACE)
                .map_err(|e| HardwareError::from_usb(&self.name, e))?;
        }
        Ok(())
    }
}

impl Drop for UsbSession {
    fn drop(&mut self) {
        if self.claimed {
            if let Err(e) = self.handle.release_interface(RELAY_INTERFACE) {
                debug!(device = %self.name, error = %e, "Release on drop failed");
            }
        }
    }
}

/// Open link to a USB relay board.
pub struct UsbLink {
    session: Arc<Mutex<UsbSession>>,
}

impl fmt::Debug for UsbLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbLink")
            .field("device", &self.session.lock().name)
            .finish()
    }
}

impl RelayLink for UsbLink {
    async fn send_frame(&mut self, frame: RelayCommandFrame) -> Result<()> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || session.lock().write(&frame)).await?
    }

    async fn close(self) -> Result<()> {
        let session = self.session;
        tokio::task::spawn_blocking(move || session.lock().release()).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_core::RelayAddress;
    use std::cell::RefCell;

    /// Scripted handle that records every call it receives.
    #[derive(Default)]
    struct ScriptedHandle {
        calls: RefCell<Vec<String>>,
        reset_error: Option<rusb::Error>,
        detach_error: Option<rusb::Error>,
        claim_error: Option<rusb::Error>,
    }

    impl ScriptedHandle {
        fn record(&self, call: impl Into<String>, error: Option<rusb::Error>) -> rusb::Result<()> {
            self.calls.borrow_mut().push(call.into());
            error.map_or(Ok(()), Err)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl SessionHandle for ScriptedHandle {
        fn reset(&self) -> rusb::Result<()> {
            self.record("reset", self.reset_error)
        }

        fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
            self.record(format!("query {interface}"), None)?;
            Ok(true)
        }

        fn detach_kernel_driver(&self, interface: u8) -> rusb::Result<()> {
            self.record(format!("detach {interface}"), self.detach_error)
        }

        fn set_active_configuration(&self, config: u8) -> rusb::Result<()> {
            self.record(format!("configure {config}"), None)
        }

        fn claim_interface(&self, interface: u8) -> rusb::Result<()> {
            self.record(format!("claim {interface}"), self.claim_error)
        }

        fn release_interface(&self, interface: u8) -> rusb::Result<()> {
            self.record(format!("release {interface}"), None)
        }
    }

    fn layout(out_endpoint: Option<(u8, TransferType)>) -> ConfigLayout {
        ConfigLayout {
            number: 1,
            interfaces: vec![0, 1],
            out_endpoint,
        }
    }

    #[test]
    fn test_prepare_claims_before_endpoint_lookup() {
        let handle = ScriptedHandle::default();

        let endpoint = prepare(&handle, "usb", &layout(Some((0x02, TransferType::Interrupt))));

        assert_eq!(endpoint.unwrap(), (0x02, TransferType::Interrupt));
        assert_eq!(
            handle.calls(),
            vec![
                "reset",
                "query 0",
                "detach 0",
                "query 1",
                "detach 1",
                "configure 1",
                "claim 0"
            ]
        );
    }

    #[test]
    fn test_prepare_reset_failure_is_fatal() {
        let handle = ScriptedHandle {
            reset_error: Some(rusb::Error::Busy),
            ..Default::default()
        };

        let result = prepare(&handle, "usb", &layout(Some((0x02, TransferType::Bulk))));

        assert!(matches!(result, Err(HardwareError::DeviceBusy { .. })));
        assert_eq!(handle.calls(), vec!["reset"]);
    }

    #[test]
    fn test_prepare_detach_failure_is_tolerated() {
        let handle = ScriptedHandle {
            detach_error: Some(rusb::Error::NotSupported),
            ..Default::default()
        };

        let result = prepare(&handle, "usb", &layout(Some((0x01, TransferType::Bulk))));
        assert_eq!(result.unwrap(), (0x01, TransferType::Bulk));
    }

    #[test]
    fn test_prepare_claim_failure_classified() {
        let handle = ScriptedHandle {
            claim_error: Some(rusb::Error::Access),
            ..Default::default()
        };

        let result = prepare(&handle, "usb", &layout(Some((0x01, TransferType::Bulk))));
        assert!(matches!(result, Err(HardwareError::Permission { .. })));
    }

    #[test]
    fn test_prepare_missing_endpoint_releases_interface() {
        let handle = ScriptedHandle::default();

        let result = prepare(&handle, "usb", &layout(None));

        assert!(matches!(result, Err(HardwareError::Protocol { .. })));
        let calls = handle.calls();
        assert_eq!(calls[calls.len() - 2..], ["claim 0", "release 0"]);
    }

    #[test]
    fn test_backend_default_timeout() {
        let backend = UsbBackend::default();
        assert_eq!(backend.transfer_timeout, Duration::from_millis(1000));
        assert_eq!(backend.transport(), TransportKind::Usb);
    }

    #[tokio::test]
    async fn test_open_rejects_foreign_identity() {
        let device = DeviceDescriptor::new(
            "ch340",
            DeviceIdentity::Serial {
                vendor_id: 0x1a86,
                product_id: 0x7523,
                port_name: "/dev/ttyUSB0".into(),
            },
            RelayAddress::default(),
        );

        let result = UsbBackend::default().open(&device).await;
        assert!(matches!(result, Err(HardwareError::Protocol { .. })));
    }
}

//! Mock relay backend that records every frame it is given.

use crate::error::{HardwareError, Result};
use crate::traits::{RelayBackend, RelayLink};
use parking_lot::Mutex;
use relaygate_core::{DeviceDescriptor, RelayState, TransportKind};
use relaygate_protocol::RelayCommandFrame;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;

/// Something that happened on a mock device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEvent {
    /// Identity key of the device (`serial:A`, `usb:1:7`, ...).
    pub device: String,
    pub kind: MockEventKind,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEventKind {
    Opened,
    Frame(RelayCommandFrame),
    Closed,
}

#[derive(Debug, Clone, Copy)]
enum OpenFailure {
    Busy,
    Refused,
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<MockEvent>,
    attempted_writes: HashMap<String, usize>,
    failing_open: HashMap<String, OpenFailure>,
    failing_on: HashSet<String>,
    failing_off: HashMap<String, usize>,
}

impl MockState {
    fn record(&mut self, device: &str, kind: MockEventKind) {
        self.events.push(MockEvent {
            device: device.to_string(),
            kind,
            at: Instant::now(),
        });
    }
}

/// Mock relay backend.
///
/// Opening a device always succeeds unless a failure was injected through the
/// [`MockRelayHandle`]. Clones share the same recorder.
///
/// # Examples
///
/// ```
/// use relaygate_core::{DeviceDescriptor, DeviceIdentity, RelayAddress};
/// use relaygate_hardware::mock::MockRelay;
/// use relaygate_hardware::traits::{RelayBackend, RelayLink};
/// use relaygate_protocol::RelayCommandFrame;
///
/// #[tokio::main]
/// async fn main() -> relaygate_hardware::Result<()> {
///     let (relay, handle) = MockRelay::new();
///     let device = DeviceDescriptor::new(
///         "ch340",
///         DeviceIdentity::Serial { vendor_id: 0x1a86, product_id: 0x7523, port_name: "A".into() },
///         RelayAddress::default(),
///     );
///
///     let mut link = relay.open(&device).await?;
///     link.send_frame(RelayCommandFrame::encode(1, true).unwrap()).await?;
///     link.close().await?;
///
///     assert_eq!(handle.frames("serial:A").len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockRelay {
    transport: TransportKind,
    state: Arc<Mutex<MockState>>,
}

impl MockRelay {
    /// Create a mock backend and the handle used to inspect it.
    pub fn new() -> (Self, MockRelayHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let relay = Self {
            transport: TransportKind::Serial,
            state: Arc::clone(&state),
        };
        (relay, MockRelayHandle { state })
    }

    /// Same recorder, reporting a different transport.
    pub fn for_transport(&self, transport: TransportKind) -> Self {
        Self {
            transport,
            state: Arc::clone(&self.state),
        }
    }
}

impl RelayBackend for MockRelay {
    type Link = MockLink;

    fn transport(&self) -> TransportKind {
        self.transport
    }

    async fn open(&self, device: &DeviceDescriptor) -> Result<MockLink> {
        let key = device.identity_key();
        let mut state = self.state.lock();

        match state.failing_open.get(&key) {
            Some(OpenFailure::Busy) => {
                return Err(HardwareError::busy(device.identity.to_string()));
            }
            Some(OpenFailure::Refused) => {
                return Err(HardwareError::connection_refused(device.identity.to_string()));
            }
            None => {}
        }

        state.record(&key, MockEventKind::Opened);
        Ok(MockLink {
            device: key,
            state: Arc::clone(&self.state),
        })
    }
}

/// Link handed out by [`MockRelay`].
#[derive(Debug)]
pub struct MockLink {
    device: String,
    state: Arc<Mutex<MockState>>,
}

impl RelayLink for MockLink {
    async fn send_frame(&mut self, frame: RelayCommandFrame) -> Result<()> {
        let mut state = self.state.lock();
        *state
            .attempted_writes
            .entry(self.device.clone())
            .or_default() += 1;

        let fail = if frame.state() == RelayState::On {
            state.failing_on.contains(&self.device)
        } else {
            match state.failing_off.get_mut(&self.device) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };

        if fail {
            return Err(HardwareError::protocol(
                self.device.clone(),
                format!("injected failure writing {frame}"),
            ));
        }

        state.record(&self.device, MockEventKind::Frame(frame));
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.state.lock().record(&self.device, MockEventKind::Closed);
        Ok(())
    }
}

/// Handle for inspecting and steering a [`MockRelay`].
#[derive(Debug, Clone)]
pub struct MockRelayHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockRelayHandle {
    /// Every recorded event, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    /// Frames successfully written to `device`.
    pub fn frames(&self, device: &str) -> Vec<RelayCommandFrame> {
        self.frame_events(device)
            .into_iter()
            .map(|(frame, _)| frame)
            .collect()
    }

    /// Timestamps of the frames written to `device`.
    pub fn frame_times(&self, device: &str) -> Vec<Instant> {
        self.frame_events(device)
            .into_iter()
            .map(|(_, at)| at)
            .collect()
    }

    fn frame_events(&self, device: &str) -> Vec<(RelayCommandFrame, Instant)> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| event.device == device)
            .filter_map(|event| match event.kind {
                MockEventKind::Frame(frame) => Some((frame, event.at)),
                _ => None,
            })
            .collect()
    }

    /// Write attempts on `device`, failed ones included.
    pub fn attempted_writes(&self, device: &str) -> usize {
        self.state
            .lock()
            .attempted_writes
            .get(device)
            .copied()
            .unwrap_or(0)
    }

    /// Number of successful opens of `device`.
    pub fn open_count(&self, device: &str) -> usize {
        self.count(device, MockEventKind::Opened)
    }

    pub fn close_count(&self, device: &str) -> usize {
        self.count(device, MockEventKind::Closed)
    }

    /// Total successful opens across all devices.
    pub fn total_opens(&self) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| event.kind == MockEventKind::Opened)
            .count()
    }

    fn count(&self, device: &str, kind: MockEventKind) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| event.device == device && event.kind == kind)
            .count()
    }

    /// Opening `device` reports it busy.
    pub fn fail_open(&self, device: &str) {
        self.state
            .lock()
            .failing_open
            .insert(device.to_string(), OpenFailure::Busy);
    }

    /// Opening `device` reports the connection refused.
    pub fn refuse_open(&self, device: &str) {
        self.state
            .lock()
            .failing_open
            .insert(device.to_string(), OpenFailure::Refused);
    }

    /// Every ON frame written to `device` fails.
    pub fn fail_on(&self, device: &str) {
        self.state.lock().failing_on.insert(device.to_string());
    }

    /// The next `count` OFF frames written to `device` fail.
    pub fn fail_off(&self, device: &str, count: usize) {
        self.state
            .lock()
            .failing_off
            .insert(device.to_string(), count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_core::{DeviceIdentity, RelayAddress};

    fn tcp(port: u16) -> DeviceDescriptor {
        DeviceDescriptor::new(
            "rn-62",
            DeviceIdentity::Network {
                host: "10.0.0.1".into(),
                port,
            },
            RelayAddress::default(),
        )
    }

    #[tokio::test]
    async fn test_records_open_frames_close() {
        let (relay, handle) = MockRelay::new();
        let mut link = relay.open(&tcp(1)).await.unwrap();
        link.send_frame(RelayCommandFrame::encode(1, true).unwrap())
            .await
            .unwrap();
        link.close().await.unwrap();

        let kinds: Vec<_> = handle.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MockEventKind::Opened,
                MockEventKind::Frame(RelayCommandFrame::encode(1, true).unwrap()),
                MockEventKind::Closed,
            ]
        );
        assert_eq!(handle.open_count("tcp:10.0.0.1:1"), 1);
        assert_eq!(handle.close_count("tcp:10.0.0.1:1"), 1);
    }

    #[tokio::test]
    async fn test_injected_open_failures() {
        let (relay, handle) = MockRelay::new();
        handle.fail_open("tcp:10.0.0.1:1");
        handle.refuse_open("tcp:10.0.0.1:2");

        assert!(matches!(
            relay.open(&tcp(1)).await,
            Err(HardwareError::DeviceBusy { .. })
        ));
        assert!(matches!(
            relay.open(&tcp(2)).await,
            Err(HardwareError::ConnectionRefused { .. })
        ));
        assert_eq!(handle.total_opens(), 0);
    }

    #[test]
    fn test_for_transport_shares_recorder() {
        let (relay, _handle) = MockRelay::new();
        let usb = relay.for_transport(TransportKind::Usb);

        assert_eq!(relay.transport(), TransportKind::Serial);
        assert_eq!(usb.transport(), TransportKind::Usb);
        assert!(Arc::ptr_eq(&relay.state, &usb.state));
    }
}

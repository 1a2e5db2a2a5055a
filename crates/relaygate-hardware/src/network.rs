//! Relay controllers reachable over TCP (RN-62 style boards).
//!
//! Network controllers are not discovered; their host and port come from the
//! configuration. Each trigger gets a fresh connection.

use crate::error::{HardwareError, Result};
use crate::traits::{RelayBackend, RelayLink};
use relaygate_core::{
    DeviceDescriptor, DeviceIdentity, TransportKind, constants::NETWORK_CONNECT_TIMEOUT_MS,
};
use relaygate_network::{RelayTcpClient, TcpClientConfig};
use relaygate_protocol::RelayCommandFrame;
use std::fmt;
use std::time::Duration;

/// Opens [`NetworkLink`]s.
#[derive(Debug, Clone)]
pub struct NetworkBackend {
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl NetworkBackend {
    pub fn new(connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            write_timeout,
        }
    }
}

impl Default for NetworkBackend {
    fn default() -> Self {
        let timeout = Duration::from_millis(NETWORK_CONNECT_TIMEOUT_MS);
        Self::new(timeout, timeout)
    }
}

impl RelayBackend for NetworkBackend {
    type Link = NetworkLink;

    fn transport(&self) -> TransportKind {
        TransportKind::Network
    }

    async fn open(&self, device: &DeviceDescriptor) -> Result<NetworkLink> {
        let DeviceIdentity::Network { host, port } = &device.identity else {
            return Err(HardwareError::protocol(device.to_string(), "not a network device"));
        };

        let config = TcpClientConfig::new(host.clone(), *port)
            .with_connect_timeout(self.connect_timeout)
            .with_write_timeout(self.write_timeout);
        let endpoint = config.endpoint();

        let mut client = RelayTcpClient::new(config);
        client
            .connect()
            .await
            .map_err(|e| HardwareError::from_tcp(&endpoint, e))?;

        Ok(NetworkLink { endpoint, client })
    }
}

/// Open TCP connection to a relay controller.
pub struct NetworkLink {
    endpoint: String,
    client: RelayTcpClient,
}

impl fmt::Debug for NetworkLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkLink")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.client.is_connected())
            .finish()
    }
}

impl RelayLink for NetworkLink {
    async fn send_frame(&mut self, frame: RelayCommandFrame) -> Result<()> {
        self.client
            .send(frame)
            .await
            .map_err(|e| HardwareError::from_tcp(&self.endpoint, e))
    }

    async fn close(mut self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| HardwareError::from_tcp(&self.endpoint, e))
    }
}

//! TCP client for network relay controllers.
//!
//! Network relay boards listen on a plain TCP port and accept the same 4-byte
//! command frames as the USB and serial boards. They never answer, so the
//! client is write-only.
//!
//! # Architecture
//!
//! ```text
//! RelayControl
//!     │
//!     └─> NetworkBackend
//!             │
//!             └─> RelayTcpClient ───(TCP)───> relay controller
//!                    │
//!                    └─> RelayFrameCodec (4-byte frames)
//! ```
//!
//! # Design Principles
//!
//! - **No automatic retry**: the control layer decides what a failure means
//! - **No keepalive**: one connection per trigger, closed right after
//! - **Bounded I/O**: connect and write both have timeouts

use futures::SinkExt;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info, trace, warn};

use relaygate_core::constants::NETWORK_CONNECT_TIMEOUT_MS;
use relaygate_protocol::{RelayCommandFrame, RelayFrameCodec};

/// Timeout applied to flush and shutdown while closing.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for the relay TCP client
///
/// # Example
///
/// ```
/// use relaygate_network::TcpClientConfig;
/// use std::time::Duration;
///
/// let config = TcpClientConfig::new("10.10.10.180", 9747)
///     .with_connect_timeout(Duration::from_secs(2));
/// assert_eq!(config.endpoint(), "10.10.10.180:9747");
/// ```
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Host name or IP address of the relay controller
    pub host: String,

    /// TCP port of the relay controller
    pub port: u16,

    /// Timeout for establishing the connection
    pub connect_timeout: Duration,

    /// Timeout for writing a single frame
    pub write_timeout: Duration,
}

impl TcpClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// `host:port` form used in logs and diagnostics.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9747,
            connect_timeout: Duration::from_millis(NETWORK_CONNECT_TIMEOUT_MS),
            write_timeout: Duration::from_millis(NETWORK_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Errors that can occur during TCP client operations
#[derive(Debug, Error)]
pub enum TcpClientError {
    /// Client is not connected
    #[error("Not connected to relay controller")]
    NotConnected,

    /// Connection attempt timed out
    #[error("Connection to {endpoint} timed out after {timeout_ms}ms")]
    ConnectionTimeout { endpoint: String, timeout_ms: u64 },

    /// Remote side actively refused the connection
    #[error("Connection to {0} refused")]
    ConnectionRefused(String),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Write-only TCP client for network relay controllers
///
/// # Connection Lifecycle
///
/// 1. Create client with `new()`
/// 2. Connect with `connect()`
/// 3. Write frames with `send()`
/// 4. Close with `close()`
pub struct RelayTcpClient {
    config: TcpClientConfig,

    /// Framed TCP stream (None if not connected)
    framed: Option<FramedWrite<TcpStream, RelayFrameCodec>>,
}

impl RelayTcpClient {
    /// Create a new client. Nothing is connected until `connect()`.
    ///
    /// ```
    /// use relaygate_network::{RelayTcpClient, TcpClientConfig};
    ///
    /// let client = RelayTcpClient::new(TcpClientConfig::default());
    /// assert!(!client.is_connected());
    /// ```
    pub fn new(config: TcpClientConfig) -> Self {
        debug!(endpoint = %config.endpoint(), "Creating relay TCP client");
        Self {
            config,
            framed: None,
        }
    }

    pub fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    /// Connect to the relay controller
    ///
    /// # Errors
    ///
    /// - `ConnectionTimeout` if the connect timeout elapses
    /// - `ConnectionRefused` if the controller refuses the connection
    /// - `Io` for any other socket failure (unreachable, bad host, ...)
    pub async fn connect(&mut self) -> Result<(), TcpClientError> {
        let endpoint = self.config.endpoint();
        info!(endpoint = %endpoint, "Connecting to relay controller");

        let connect = TcpStream::connect((self.config.host.as_str(), self.config.port));
        let stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                warn!(endpoint = %endpoint, "Connection refused");
                return Err(TcpClientError::ConnectionRefused(endpoint));
            }
            Ok(Err(e)) => {
                error!(endpoint = %endpoint, error = %e, "Connection failed");
                return Err(e.into());
            }
            Err(_) => {
                let timeout_ms = self.config.connect_timeout.as_millis() as u64;
                warn!(endpoint = %endpoint, timeout_ms, "Connection timeout");
                return Err(TcpClientError::ConnectionTimeout {
                    endpoint,
                    timeout_ms,
                });
            }
        };

        // The on/off frames are tiny; do not let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(FramedWrite::new(stream, RelayFrameCodec::new()));
        debug!(endpoint = %endpoint, "Connected");
        Ok(())
    }

    /// Write one frame and flush it.
    pub async fn send(&mut self, frame: RelayCommandFrame) -> Result<(), TcpClientError> {
        trace!(frame = %frame, "Sending frame");

        let framed = self.framed.as_mut().ok_or(TcpClientError::NotConnected)?;
        let timeout = self.config.write_timeout;

        match tokio::time::timeout(timeout, framed.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(relaygate_core::Error::Io(e))) => {
                error!(error = %e, "Failed to send frame");
                Err(TcpClientError::ConnectionLost(e.to_string()))
            }
            Ok(Err(e)) => Err(TcpClientError::ConnectionLost(e.to_string())),
            Err(_) => {
                warn!("Send timeout after {}ms", timeout.as_millis());
                Err(TcpClientError::WriteTimeout(timeout.as_millis() as u64))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Close the connection gracefully
    ///
    /// Idempotent. Flush and shutdown each get 500ms so a dead link cannot
    /// hang the caller; failures there are logged, never returned.
    pub async fn close(&mut self) -> Result<(), TcpClientError> {
        if let Some(mut framed) = self.framed.take() {
            debug!(endpoint = %self.config.endpoint(), "Closing connection");

            match tokio::time::timeout(CLOSE_TIMEOUT, framed.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!("Flush timeout during close ({}ms)", CLOSE_TIMEOUT.as_millis()),
            }

            let mut stream = framed.into_inner();
            match tokio::time::timeout(CLOSE_TIMEOUT, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!(
                    "Shutdown timeout during close ({}ms)",
                    CLOSE_TIMEOUT.as_millis()
                ),
            }
        }

        Ok(())
    }
}

impl Drop for RelayTcpClient {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("RelayTcpClient dropped while connected - connection will be closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TcpClientConfig::default();
        assert_eq!(config.port, 9747);
        assert_eq!(config.connect_timeout.as_millis(), 5000);
    }

    #[test]
    fn test_config_builder() {
        let config = TcpClientConfig::new("relay.local", 80)
            .with_connect_timeout(Duration::from_millis(250))
            .with_write_timeout(Duration::from_millis(100));

        assert_eq!(config.endpoint(), "relay.local:80");
        assert_eq!(config.connect_timeout.as_millis(), 250);
        assert_eq!(config.write_timeout.as_millis(), 100);
    }

    #[tokio::test]
    async fn test_send_without_connect() {
        let mut client = RelayTcpClient::new(TcpClientConfig::default());
        let frame = RelayCommandFrame::encode(1, true).unwrap();

        let result = client.send(frame).await;
        assert!(matches!(result, Err(TcpClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connection_timeout() {
        // Non-routable address (RFC 5737 TEST-NET-1)
        let config = TcpClientConfig::new("192.0.2.1", 9999)
            .with_connect_timeout(Duration::from_millis(100));

        let mut client = RelayTcpClient::new(config);
        let result = client.connect().await;

        assert!(matches!(
            result,
            Err(TcpClientError::ConnectionTimeout { .. }) | Err(TcpClientError::Io(_))
        ));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_multiple_close_calls() {
        let mut client = RelayTcpClient::new(TcpClientConfig::default());

        client.close().await.unwrap();
        client.close().await.unwrap();
    }
}

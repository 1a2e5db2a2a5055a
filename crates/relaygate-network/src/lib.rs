//! Network transport for relaygate
//!
//! This crate provides the TCP client used to drive network relay
//! controllers. Each trigger opens a fresh connection, writes the relay
//! command frames through [`RelayFrameCodec`](relaygate_protocol::RelayFrameCodec)
//! and closes it again.
//!
//! # Example
//!
//! ```no_run
//! use relaygate_network::{RelayTcpClient, TcpClientConfig};
//! use relaygate_protocol::RelayCommandFrame;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TcpClientConfig::new("10.10.10.180", 9747);
//!
//! let mut client = RelayTcpClient::new(config);
//! client.connect().await?;
//! client.send(RelayCommandFrame::encode(1, true)?).await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::{RelayTcpClient, TcpClientConfig, TcpClientError};

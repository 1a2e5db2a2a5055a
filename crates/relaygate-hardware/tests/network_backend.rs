//! Integration tests for the network backend.
//!
//! A local TCP listener stands in for the relay controller and records every
//! frame it receives.

use futures::StreamExt;
use relaygate_core::{DeviceDescriptor, DeviceIdentity, RelayAddress};
use relaygate_hardware::network::NetworkBackend;
use relaygate_hardware::traits::{RelayBackend, RelayLink};
use relaygate_hardware::{HardwareError, pulse};
use relaygate_protocol::{RelayCommandFrame, RelayFrameCodec};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

fn network_device(port: u16, channel: u16) -> DeviceDescriptor {
    DeviceDescriptor::new(
        "rn-62",
        DeviceIdentity::Network {
            host: "127.0.0.1".to_string(),
            port,
        },
        RelayAddress::new(channel).unwrap(),
    )
}

/// Accept one connection and collect every frame until the client closes.
async fn recording_controller() -> (u16, tokio::task::JoinHandle<Vec<RelayCommandFrame>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut frames = FramedRead::new(stream, RelayFrameCodec::new());
        let mut received = Vec::new();
        while let Some(Ok(frame)) = frames.next().await {
            received.push(frame);
        }
        received
    });

    (port, handle)
}

#[tokio::test]
async fn test_pulse_over_tcp() {
    let (port, controller) = recording_controller().await;
    let device = network_device(port, 1);

    let backend = NetworkBackend::default();
    let mut link = backend.open(&device).await.unwrap();
    let outcome = pulse::run_pulse(
        &mut link,
        device.channel,
        Duration::from_millis(20),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    link.close().await.unwrap();

    assert!(!outcome.cancelled);
    let received = controller.await.unwrap();
    assert_eq!(
        received,
        vec![
            RelayCommandFrame::encode(1, true).unwrap(),
            RelayCommandFrame::encode(1, false).unwrap(),
        ]
    );
}

#[tokio::test]
async fn test_channel_is_carried_in_frames() {
    let (port, controller) = recording_controller().await;
    let device = network_device(port, 3);

    let mut link = NetworkBackend::default().open(&device).await.unwrap();
    link.send_frame(RelayCommandFrame::encode(3, false).unwrap())
        .await
        .unwrap();
    link.close().await.unwrap();

    let received = controller.await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].as_bytes(), &[0xA0, 0x03, 0x00, 0xA3]);
}

#[tokio::test]
async fn test_refused_connection_is_classified() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let error = NetworkBackend::default()
        .open(&network_device(port, 1))
        .await
        .unwrap_err();

    assert!(matches!(error, HardwareError::ConnectionRefused { .. }));
    assert!(error.is_connection());
}

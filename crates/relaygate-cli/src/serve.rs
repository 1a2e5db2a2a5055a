//! Raw socket front end.
//!
//! A client connects, sends a relay number as ASCII (`"2"`, or `"2:500"` for a
//! 500 ms hold) and gets one reply line back:
//!
//! ```text
//! -> 2
//! <- OK relay 2 (serial port /dev/ttyUSB1 (ch340)) pulsed for 1000ms
//! -> x
//! <- ERR invalid relay number
//! ```

use anyhow::Context;
use relaygate_core::{TriggerRequest, TriggerResult};
use relaygate_hardware::RelayControl;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest request accepted; anything after this is ignored.
const MAX_REQUEST_LEN: usize = 64;

const INVALID_REQUEST: &str = "ERR invalid relay number";

/// Accept connections until `shutdown` is cancelled. In-flight holds are cut
/// short on shutdown; their OFF frames are still sent.
pub async fn serve(
    control: RelayControl,
    bind: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("cannot listen on {bind}"))?;
    info!(addr = %listener.local_addr()?, "Relay trigger server listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Server shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                debug!(peer = %peer, "Client connected");

                let control = control.clone();
                let cancel = shutdown.child_token();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &control, cancel).await {
                        warn!(peer = %peer, error = %e, "Connection error");
                    }
                });
            }
        }
    }

    Ok(())
}

/// Serve one request on `stream`, reply, and shut the write side down.
pub async fn handle_connection<S>(
    mut stream: S,
    control: &RelayControl,
    cancel: CancellationToken,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; MAX_REQUEST_LEN];
    let len = stream.read(&mut buf).await?;

    let reply = match parse_request(&buf[..len]) {
        Some(request) => {
            info!(request = ?request, "Trigger request");
            format_reply(&control.trigger_relay_with_cancel(request, cancel).await)
        }
        None => {
            warn!(raw = %String::from_utf8_lossy(&buf[..len]), "Rejected request");
            INVALID_REQUEST.to_string()
        }
    };

    stream.write_all(reply.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await
}

/// `"N"` or `"N:MS"`, surrounding whitespace ignored.
pub fn parse_request(raw: &[u8]) -> Option<TriggerRequest> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    let (relay, duration) = match text.split_once(':') {
        Some((relay, duration)) => (relay, Some(duration)),
        None => (text, None),
    };

    let mut request = TriggerRequest::relay(relay.trim().parse().ok()?);
    if let Some(duration) = duration {
        request = request.with_duration_ms(duration.trim().parse().ok()?);
    }
    Some(request)
}

pub fn format_reply(result: &TriggerResult) -> String {
    let status = if result.success { "OK" } else { "ERR" };
    format!("{status} {}", result.diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_core::TransportKind;
    use relaygate_core::constants::{CH340_PRODUCT_ID, CH340_VENDOR_ID};
    use relaygate_hardware::mock::{MockEnumerator, MockRelay, MockRelayHandle};
    use relaygate_hardware::{AnyEnumerator, BackendSet, DeviceRegistry, RelayControlConfig};
    use rstest::rstest;

    #[rstest]
    #[case(b"1", Some(1), None)]
    #[case(b"2\r\n", Some(2), None)]
    #[case(b" 3:500 ", Some(3), Some(500))]
    #[case(b"0", Some(0), None)]
    fn test_parse_valid(
        #[case] raw: &[u8],
        #[case] relay: Option<u32>,
        #[case] duration: Option<u64>,
    ) {
        let request = parse_request(raw).unwrap();
        assert_eq!(request.relay_number, relay);
        assert_eq!(request.duration_ms, duration);
    }

    #[rstest]
    #[case(b"")]
    #[case(b"abc")]
    #[case(b"-1")]
    #[case(b"1:")]
    #[case(b"1:fast")]
    #[case(&[0xff, 0xfe])]
    fn test_parse_invalid(#[case] raw: &[u8]) {
        assert!(parse_request(raw).is_none());
    }

    #[test]
    fn test_format_reply() {
        assert_eq!(format_reply(&TriggerResult::ok("done")), "OK done");
        assert_eq!(
            format_reply(&TriggerResult::no_device()),
            "ERR no matching device found"
        );
    }

    fn control(ports: &[&str]) -> (RelayControl, MockRelayHandle) {
        let config = RelayControlConfig::default();
        let registry = DeviceRegistry::with_enumerators(
            &config,
            AnyEnumerator::Mock(MockEnumerator::new(TransportKind::Usb)),
            AnyEnumerator::Mock(MockEnumerator::serial_ports(
                CH340_VENDOR_ID,
                CH340_PRODUCT_ID,
                ports,
            )),
        );
        let (relay, handle) = MockRelay::new();
        (
            RelayControl::with_parts(config, registry, BackendSet::mock(&relay)),
            handle,
        )
    }

    async fn exchange(control: &RelayControl, request: &[u8]) -> String {
        let (mut client, server) = tokio::io::duplex(256);
        let server_control = control.clone();
        let server = tokio::spawn(async move {
            handle_connection(server, &server_control, CancellationToken::new()).await
        });

        client.write_all(request).await.unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        server.await.unwrap().unwrap();
        reply
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_triggers_relay() {
        let (control, handle) = control(&["A", "B"]);

        let reply = exchange(&control, b"2:10").await;

        assert!(reply.starts_with("OK relay 2"), "{reply}");
        assert!(reply.ends_with('\n'));
        assert_eq!(handle.frames("serial:B").len(), 2);
        assert_eq!(handle.total_opens(), 1);
    }

    #[tokio::test]
    async fn test_connection_rejects_garbage() {
        let (control, handle) = control(&["A"]);

        let reply = exchange(&control, b"open sesame").await;

        assert_eq!(reply, "ERR invalid relay number\n");
        assert_eq!(handle.total_opens(), 0);
    }

    #[tokio::test]
    async fn test_connection_out_of_range() {
        let (control, _handle) = control(&["A"]);

        let reply = exchange(&control, b"5").await;
        assert!(reply.starts_with("ERR relay number 5 is out of range"), "{reply}");
    }
}

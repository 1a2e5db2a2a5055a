//! The on -> hold -> off sequence shared by every transport.
//!
//! ```text
//! send ON ──► hold (sleep, or until cancelled) ──► send OFF
//!    │                                                │
//!    └─ failure: stop, no OFF                         └─ failure: one more OFF
//! ```
//!
//! The OFF frame is sent on every path that sent ON, including cancellation.
//! If it fails, exactly one compensating OFF is written on the same link.

use crate::error::Result;
use crate::traits::RelayLink;
use relaygate_core::{RelayAddress, RelayState};
use relaygate_protocol::encode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// What happened during a completed pulse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseOutcome {
    /// The hold was cut short by the cancellation token.
    pub cancelled: bool,
    /// The first OFF frame failed and the compensating one went through.
    pub off_retried: bool,
}

/// Energize `channel`, hold for `hold`, then release it.
///
/// A zero `hold` sends OFF right after ON without touching the timer.
///
/// # Errors
///
/// Returns the ON failure (no OFF is sent), or the compensating OFF failure
/// when both OFF frames failed. In the latter case the relay may still be
/// energized.
pub async fn run_pulse<L: RelayLink>(
    link: &mut L,
    channel: RelayAddress,
    hold: Duration,
    cancel: &CancellationToken,
) -> Result<PulseOutcome> {
    let on = encode(channel, RelayState::On);
    let off = encode(channel, RelayState::Off);

    debug!(frame = %on, "Sending ON frame");
    link.send_frame(on).await?;

    let mut outcome = PulseOutcome::default();
    if !hold.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(hold) => {}
            _ = cancel.cancelled() => {
                debug!("Hold cancelled, releasing relay early");
                outcome.cancelled = true;
            }
        }
    }

    debug!(frame = %off, "Sending OFF frame");
    if let Err(first) = link.send_frame(off).await {
        warn!(error = %first, "OFF frame failed, sending compensating OFF");
        if let Err(second) = link.send_frame(off).await {
            error!(
                channel = channel.as_u8(),
                first = %first,
                error = %second,
                "Compensating OFF failed, relay may remain energized"
            );
            return Err(second);
        }
        outcome.off_retried = true;
    }

    Ok(outcome)
}

//! Tokio codec for relay command frames.
//!
//! `RelayFrameCodec` lets a [`RelayCommandFrame`] be sent through any
//! `AsyncWrite` with `tokio_util::codec::Framed` / `FramedWrite`, and lets a
//! device simulator or a test harness read frames back out of a byte stream.
//!
//! # Architecture
//!
//! ```text
//! RelayCommandFrame -> Encoder -> 4 raw bytes -> TCP / serial stream
//! byte stream -> Decoder -> validated RelayCommandFrame
//! ```
//!
//! # Resynchronization
//!
//! The relay protocol has no end marker, so the decoder locks onto the
//! `0xA0` sync byte. Bytes preceding a sync byte are discarded. A candidate
//! frame with a bad checksum is dropped one byte at a time and reported as an
//! error, which lets the stream recover on the next valid frame.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::RelayCommandFrame;
use relaygate_core::{
    Error, Result,
    constants::{FRAME_LEN, FRAME_SYNC},
};

/// Tokio codec for relay command frames.
///
/// # Example
///
/// ```rust,no_run
/// use futures::SinkExt;
/// use tokio::net::TcpStream;
/// use tokio_util::codec::FramedWrite;
/// use relaygate_protocol::{RelayCommandFrame, RelayFrameCodec};
///
/// # async fn example() -> relaygate_core::Result<()> {
/// let stream = TcpStream::connect("10.10.10.180:9747").await?;
/// let mut sink = FramedWrite::new(stream, RelayFrameCodec::new());
///
/// sink.send(RelayCommandFrame::encode(1, true)?).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RelayFrameCodec {
    /// Bytes discarded while hunting for a sync byte.
    skipped: usize,
}

impl RelayFrameCodec {
    pub fn new() -> Self {
        Self { skipped: 0 }
    }

    /// Total number of bytes discarded while resynchronizing.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped
    }
}

impl Decoder for RelayFrameCodec {
    type Item = RelayCommandFrame;
    type Error = Error;

    /// Decode one frame from the byte stream.
    ///
    /// - `Ok(Some(frame))` - a complete, checksum-valid frame
    /// - `Ok(None)` - need more data
    /// - `Err(Error)` - the candidate frame at the sync byte was invalid
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use tokio_util::codec::Decoder;
    /// use relaygate_protocol::RelayFrameCodec;
    ///
    /// let mut codec = RelayFrameCodec::new();
    /// let mut buffer = BytesMut::from(&[0xA0, 0x01, 0x01, 0xA2][..]);
    ///
    /// let frame = codec.decode(&mut buffer).unwrap().unwrap();
    /// assert_eq!(frame.to_hex(), "a00101a2");
    /// ```
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match src.iter().position(|&b| b == FRAME_SYNC) {
            Some(0) => {}
            Some(offset) => {
                trace!(skipped = offset, "Discarding bytes before sync byte");
                self.skipped += offset;
                src.advance(offset);
            }
            None => {
                if !src.is_empty() {
                    trace!(skipped = src.len(), "No sync byte in buffer");
                    self.skipped += src.len();
                    src.clear();
                }
                return Ok(None);
            }
        }

        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }

        match RelayCommandFrame::try_from_bytes(&src[..FRAME_LEN]) {
            Ok(frame) => {
                src.advance(FRAME_LEN);
                Ok(Some(frame))
            }
            Err(e) => {
                // Drop only the sync byte so a real frame starting inside the
                // rejected window is still found.
                src.advance(1);
                self.skipped += 1;
                Err(e)
            }
        }
    }
}

impl Encoder<RelayCommandFrame> for RelayFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: RelayCommandFrame, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(FRAME_LEN);
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

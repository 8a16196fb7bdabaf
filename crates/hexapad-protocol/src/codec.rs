//! Tokio codec for the keypad byte stream.
//!
//! `KeypadCodec` wraps a [`FrameDecoder`] so any `AsyncRead` carrying the
//! keypad UART stream (a serial device, a pipe, a capture file) can be
//! turned into a stream of [`Event`]s with [`tokio_util::codec::FramedRead`].
//!
//! ```text
//! AsyncRead -> FramedRead<_, KeypadCodec> -> Stream<Item = Result<Event>>
//! ```
//!
//! Decode errors are soft: they are counted by the decoder and never
//! surface as stream errors. The only errors the stream yields are I/O
//! errors from the underlying reader.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use hexapad_protocol::KeypadCodec;
//! use tokio_util::codec::FramedRead;
//!
//! # async fn example() -> hexapad_core::Result<()> {
//! let file = tokio::fs::File::open("capture.bin").await?;
//! let mut events = FramedRead::new(file, KeypadCodec::new());
//!
//! while let Some(event) = events.next().await {
//!     println!("{}", event?);
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{Buf, BytesMut};
use hexapad_core::{Error, Result};
use tokio_util::codec::Decoder;

use crate::{DecodeStats, Event, FrameDecoder};

#[derive(Debug, Default)]
pub struct KeypadCodec {
    decoder: FrameDecoder,
}

impl KeypadCodec {
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(),
        }
    }

    /// Counters of the wrapped decoder.
    #[must_use]
    pub fn stats(&self) -> DecodeStats {
        self.decoder.stats()
    }
}

impl Decoder for KeypadCodec {
    type Item = Event;
    type Error = Error;

    /// Consume bytes from `src` until one event is complete.
    ///
    /// Bytes of a partial frame stay inside the decoder, so `src` is always
    /// drained up to the byte that completed the event.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Event>> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(event) = self.decoder.feed(byte) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

//! Byte-at-a-time decoder for the keypad UART stream.
//!
//! The keypad sends fixed-length frames whose length is implied by the
//! header byte (see [`hexapad_core::constants`]). The decoder keeps one
//! frame worth of bytes in a stack buffer and emits at most one [`Event`]
//! per byte fed, so it never allocates and costs O(1) per byte.
//!
//! # Error Recovery
//!
//! Unknown headers, unknown key codes and invalid digit slots are soft
//! errors: the offending bytes are dropped and counted, decoding goes on.
//! Three soft errors in a row mean the decoder has lost frame alignment; it
//! then enters [`DecoderState::Resync`] and drops everything up to the next
//! `0xFF` filler byte, which the keypad sends between frames while idle.
//!
//! # Usage
//!
//! ```
//! use hexapad_protocol::{Event, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//!
//! // Key "1" (code 0x05) as a single key press frame
//! assert_eq!(decoder.feed(0xA1), None);
//! assert_eq!(decoder.feed(0x05), Some(Event::Digit(1)));
//!
//! assert_eq!(decoder.stats().frames, 1);
//! ```

use hexapad_core::{
    ArmKey, Digits,
    constants::{
        ENTRY_FRAME_LEN, ENTRY_PIN_SLOTS, ENTRY_PREFIX_SLOTS, ENTRY_SELECT_OFFSET, FILLER_BYTE,
        HEADER_ARM_SELECT, HEADER_ENTRY, HEADER_KEY, HEADER_READER_MODE, READER_MODE_NORMAL,
        READER_MODE_RFID, RESYNC_ERROR_THRESHOLD, frame_length,
    },
};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    event::{Command, EntryFrame, Event, ReaderMode},
    key::{Key, digit_from_code},
};

/// Soft decode error. Never fatal; counted in [`DecodeStats::errors`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown frame header 0x{0:02X}")]
    UnknownHeader(u8),

    #[error("Unknown key code 0x{0:02X}")]
    UnknownKey(u8),

    #[error("Invalid arm-select code 0x{0:02X} in entry frame")]
    InvalidArmSelect(u8),

    #[error("Unknown code 0x{code:02X} in indicator frame 0x{header:02X}")]
    UnknownIndicator { header: u8, code: u8 },
}

/// Decoder state.
///
/// ```text
/// ┌──────────────┐  header byte   ┌──────────────┐
/// │WaitingHeader │───────────────>│ ReadingFrame │
/// └──────────────┘                └──────────────┘
///    ^   ^   │                          │
///    │   │   │ 3rd error in a row       │ frame complete
///    │   │   v                          │ (event or soft error)
///    │  ┌────────┐                      │
///    │  │ Resync │ drops bytes          │
///    │  └────────┘ until 0xFF           │
///    │                                  │
///    └──────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Looking for a header byte. Filler bytes are skipped silently.
    WaitingHeader,
    /// Collecting the rest of a frame whose length is known.
    ReadingFrame,
    /// Alignment lost; waiting for a filler byte.
    Resync,
}

/// Decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Frames decoded into events.
    pub frames: u64,
    /// Soft decode errors.
    pub errors: u64,
    /// Times the decoder entered [`DecoderState::Resync`].
    pub resyncs: u64,
    /// Bytes dropped by error handling and resynchronization.
    pub discarded_bytes: u64,
}

/// Stateful keypad frame decoder.
///
/// # Example
///
/// ```
/// use hexapad_protocol::{Command, Event, FrameDecoder};
///
/// let mut decoder = FrameDecoder::new();
/// let events: Vec<Event> = decoder.events(&[0xA1, 0x05, 0xFF, 0xA1, 0x23]).collect();
///
/// assert_eq!(events, vec![Event::Digit(1), Event::Command(Command::Enter)]);
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    buffer: [u8; ENTRY_FRAME_LEN],
    len: usize,
    expected: usize,
    consecutive_errors: u8,
    last_error: Option<DecodeError>,
    stats: DecodeStats,
}

impl FrameDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DecoderState::WaitingHeader,
            buffer: [0; ENTRY_FRAME_LEN],
            len: 0,
            expected: 0,
            consecutive_errors: 0,
            last_error: None,
            stats: DecodeStats {
                frames: 0,
                errors: 0,
                resyncs: 0,
                discarded_bytes: 0,
            },
        }
    }

    /// Feed one byte. Returns the event completed by this byte, if any.
    pub fn feed(&mut self, byte: u8) -> Option<Event> {
        match self.state {
            DecoderState::WaitingHeader => {
                self.handle_waiting_header(byte);
                None
            }
            DecoderState::ReadingFrame => self.handle_reading_frame(byte),
            DecoderState::Resync => {
                self.handle_resync(byte);
                None
            }
        }
    }

    /// Iterate over the events decoded from `bytes`.
    ///
    /// Bytes are consumed lazily; dropping the iterator early leaves the
    /// remaining bytes unfed.
    pub fn events<'a>(&'a mut self, bytes: &'a [u8]) -> Events<'a> {
        Events {
            decoder: self,
            bytes: bytes.iter(),
        }
    }

    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Most recent soft error, if any occurred since construction or
    /// [`FrameDecoder::reset`].
    #[must_use]
    pub fn last_error(&self) -> Option<DecodeError> {
        self.last_error
    }

    /// Drop any partial frame and return to [`DecoderState::WaitingHeader`].
    ///
    /// Counters are kept.
    pub fn reset(&mut self) {
        self.state = DecoderState::WaitingHeader;
        self.len = 0;
        self.expected = 0;
        self.consecutive_errors = 0;
        self.last_error = None;
    }

    fn handle_waiting_header(&mut self, byte: u8) {
        if byte == FILLER_BYTE {
            return;
        }
        match frame_length(byte) {
            Some(expected) => {
                self.buffer[0] = byte;
                self.len = 1;
                self.expected = expected;
                self.state = DecoderState::ReadingFrame;
            }
            None => {
                self.stats.discarded_bytes += 1;
                self.soft_error(DecodeError::UnknownHeader(byte));
            }
        }
    }

    fn handle_reading_frame(&mut self, byte: u8) -> Option<Event> {
        self.buffer[self.len] = byte;
        self.len += 1;
        if self.len < self.expected {
            return None;
        }

        let frame_len = self.len;
        self.len = 0;
        self.state = DecoderState::WaitingHeader;

        match parse_frame(&self.buffer[..frame_len]) {
            Ok(event) => {
                self.consecutive_errors = 0;
                self.stats.frames += 1;
                trace!(len = frame_len, header = self.buffer[0], %event, "Frame decoded");
                Some(event)
            }
            Err(e) => {
                self.stats.discarded_bytes += frame_len as u64;
                self.soft_error(e);
                None
            }
        }
    }

    fn handle_resync(&mut self, byte: u8) {
        if byte == FILLER_BYTE {
            debug!("Resynchronized on filler byte");
            self.state = DecoderState::WaitingHeader;
        } else {
            self.stats.discarded_bytes += 1;
        }
    }

    fn soft_error(&mut self, error: DecodeError) {
        self.stats.errors += 1;
        self.consecutive_errors += 1;
        self.last_error = Some(error);
        debug!(error = %error, consecutive = self.consecutive_errors, "Decode error");

        if self.consecutive_errors >= RESYNC_ERROR_THRESHOLD {
            warn!(
                "{} consecutive decode errors, resynchronizing",
                self.consecutive_errors
            );
            self.consecutive_errors = 0;
            self.len = 0;
            self.stats.resyncs += 1;
            self.state = DecoderState::Resync;
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`FrameDecoder::events`].
pub struct Events<'a> {
    decoder: &'a mut FrameDecoder,
    bytes: std::slice::Iter<'a, u8>,
}

impl Iterator for Events<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        for &byte in self.bytes.by_ref() {
            if let Some(event) = self.decoder.feed(byte) {
                return Some(event);
            }
        }
        None
    }
}

fn parse_frame(frame: &[u8]) -> Result<Event, DecodeError> {
    match frame[0] {
        HEADER_KEY => parse_key(frame[1]),
        HEADER_ENTRY => parse_entry(frame),
        HEADER_ARM_SELECT => parse_arm_select(frame[1]),
        HEADER_READER_MODE => parse_reader_mode(frame[1]),
        other => Err(DecodeError::UnknownHeader(other)),
    }
}

fn parse_key(code: u8) -> Result<Event, DecodeError> {
    let key = Key::from_code(code).ok_or(DecodeError::UnknownKey(code))?;
    Ok(match key {
        Key::Digit(d) => Event::Digit(d),
        Key::Arm(arm) => Event::Command(Command::ArmKey(arm)),
        Key::Enter => Event::Command(Command::Enter),
        Key::Cancel => Event::Command(Command::Cancel),
        Key::Idle => Event::Heartbeat,
    })
}

fn parse_entry(frame: &[u8]) -> Result<Event, DecodeError> {
    let prefix = collect_digits(frame, 1, ENTRY_PREFIX_SLOTS);

    let select = frame[ENTRY_SELECT_OFFSET];
    let arm_key = ArmKey::from_code(select).ok_or(DecodeError::InvalidArmSelect(select))?;

    let pin = collect_digits(frame, ENTRY_SELECT_OFFSET + 1, ENTRY_PIN_SLOTS);

    Ok(Event::Command(Command::Entry(EntryFrame {
        prefix,
        arm_key,
        pin,
    })))
}

/// Collect the digits of `slots` bytes starting at `start`.
///
/// Filler and slots that hold no digit code are skipped. A corrupt slot
/// costs one digit, not the frame.
fn collect_digits(frame: &[u8], start: usize, slots: usize) -> Digits {
    let mut digits = Digits::new();
    for (offset, &code) in frame.iter().enumerate().skip(start).take(slots) {
        if code == FILLER_BYTE {
            continue;
        }
        let Some(digit) = digit_from_code(code) else {
            warn!(offset, code, "Skipping invalid digit in entry frame");
            continue;
        };
        // Slot counts are below the buffer capacity.
        if digits.push(digit).is_err() {
            break;
        }
    }
    digits
}

fn parse_arm_select(code: u8) -> Result<Event, DecodeError> {
    if code == FILLER_BYTE {
        return Ok(Event::Command(Command::ArmSelectIndicator(None)));
    }
    ArmKey::from_code(code)
        .map(|key| Event::Command(Command::ArmSelectIndicator(Some(key))))
        .ok_or(DecodeError::UnknownIndicator {
            header: HEADER_ARM_SELECT,
            code,
        })
}

fn parse_reader_mode(code: u8) -> Result<Event, DecodeError> {
    let mode = match code {
        READER_MODE_NORMAL => ReaderMode::Normal,
        READER_MODE_RFID => ReaderMode::Rfid,
        _ => {
            return Err(DecodeError::UnknownIndicator {
                header: HEADER_READER_MODE,
                code,
            });
        }
    };
    Ok(Event::Command(Command::ReaderMode(mode)))
}

pub mod codec;
pub mod decoder;
pub mod event;
pub mod key;

pub use codec::KeypadCodec;
pub use decoder::{DecodeError, DecodeStats, DecoderState, Events, FrameDecoder};
pub use event::{Command, EntryFrame, Event, ReaderMode};
pub use key::Key;

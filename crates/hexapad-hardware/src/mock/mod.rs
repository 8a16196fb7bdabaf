//! Mock device implementations for testing and development.
//!
//! Each mock comes with a handle that shares its state, so a test can hand
//! the device to the panel and still inspect what the panel did with it.

pub mod preferences;
pub mod strip;
pub mod tone;

pub use preferences::MemoryPreferences;
pub use strip::{MockLedStrip, MockLedStripHandle};
pub use tone::{MockTone, MockToneHandle};

//! Output device seams.
//!
//! The panel runs a single-threaded polling loop, so every seam is a plain
//! synchronous trait. Implementations must not block: a driver that talks to
//! slow hardware should latch the value and flush it from its own task.
//!
//! All traits are object-safe; the panel owns them as `Box<dyn Trait>`.

use crate::error::Result;

/// Addressable RGB LED strip.
pub trait LedDriver: Send {
    /// Number of pixels the strip can show.
    fn led_count(&self) -> usize;

    /// Show a full frame. `pixels.len()` equals [`LedDriver::led_count`].
    ///
    /// # Errors
    /// Returns an error if the frame could not be sent to the strip.
    fn write(&mut self, pixels: &[[u8; 3]]) -> Result<()>;
}

/// Buzzer output. Level 0 is silent.
pub trait ToneOutput: Send {
    /// # Errors
    /// Returns an error if the output could not be driven.
    fn set_level(&mut self, level: u8) -> Result<()>;
}

/// Small key/value store for settings restored on boot.
pub trait PreferenceStore: Send {
    /// # Errors
    /// Returns an error if the backing store could not be read.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    /// Returns an error if the backing store could not be written.
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

//! Output devices that only log what they are asked to do.
//!
//! Used when replaying a capture on a development machine, where there is no
//! strip or buzzer attached.

use crate::{HardwareError, Result, traits::LedDriver, traits::ToneOutput};
use tracing::{debug, trace};

/// LED strip that logs each frame at `debug` level.
#[derive(Debug)]
pub struct TraceLedStrip {
    led_count: usize,
    frames: u64,
}

impl TraceLedStrip {
    #[must_use]
    pub fn new(led_count: usize) -> Self {
        Self {
            led_count,
            frames: 0,
        }
    }

    /// Frames shown so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl LedDriver for TraceLedStrip {
    fn led_count(&self) -> usize {
        self.led_count
    }

    fn write(&mut self, pixels: &[[u8; 3]]) -> Result<()> {
        if pixels.len() != self.led_count {
            return Err(HardwareError::invalid_data(format!(
                "frame has {} pixels, strip has {}",
                pixels.len(),
                self.led_count
            )));
        }
        self.frames += 1;
        let hex: Vec<String> = pixels
            .iter()
            .map(|[r, g, b]| format!("{r:02x}{g:02x}{b:02x}"))
            .collect();
        debug!(frame = self.frames, pixels = %hex.join(" "), "LED frame");
        Ok(())
    }
}

/// Buzzer that logs level changes at `trace` level.
#[derive(Debug, Default)]
pub struct TraceTone {
    level: u8,
}

impl TraceTone {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }
}

impl ToneOutput for TraceTone {
    fn set_level(&mut self, level: u8) -> Result<()> {
        trace!(from = self.level, to = level, "Buzzer level");
        self.level = level;
        Ok(())
    }
}

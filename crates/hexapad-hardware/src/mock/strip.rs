//! Mock LED strip for testing.

use crate::{HardwareError, Result, traits::LedDriver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct StripState {
    frames: Vec<Vec<[u8; 3]>>,
    fail_next: bool,
}

/// LED strip that records every frame it is asked to show.
///
/// # Examples
///
/// ```
/// use hexapad_hardware::mock::MockLedStrip;
/// use hexapad_hardware::traits::LedDriver;
///
/// let (mut strip, handle) = MockLedStrip::new(3);
/// strip.write(&[[255, 0, 0], [0, 0, 0], [0, 0, 0]]).unwrap();
///
/// assert_eq!(handle.write_count(), 1);
/// assert_eq!(handle.pixel(0), Some([255, 0, 0]));
/// ```
#[derive(Debug)]
pub struct MockLedStrip {
    led_count: usize,
    state: Arc<Mutex<StripState>>,
}

impl MockLedStrip {
    /// Create a strip of `led_count` pixels and a handle to inspect it.
    pub fn new(led_count: usize) -> (Self, MockLedStripHandle) {
        let state = Arc::new(Mutex::new(StripState::default()));
        let strip = Self {
            led_count,
            state: Arc::clone(&state),
        };
        (strip, MockLedStripHandle { led_count, state })
    }
}

impl LedDriver for MockLedStrip {
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
        let mut state = lock(&self.state);
        if state.fail_next {
            state.fail_next = false;
            return Err(HardwareError::write_failed("mock strip", "injected failure"));
        }
        state.frames.push(pixels.to_vec());
        Ok(())
    }
}

/// Inspection handle for a [`MockLedStrip`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockLedStripHandle {
    led_count: usize,
    state: Arc<Mutex<StripState>>,
}

impl MockLedStripHandle {
    #[must_use]
    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        lock(&self.state).frames.len()
    }

    /// Most recent frame, if any was written.
    #[must_use]
    pub fn last_frame(&self) -> Option<Vec<[u8; 3]>> {
        lock(&self.state).frames.last().cloned()
    }

    /// Pixel of the most recent frame.
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<[u8; 3]> {
        lock(&self.state)
            .frames
            .last()
            .and_then(|frame| frame.get(index).copied())
    }

    /// Make the next write fail.
    pub fn fail_next_write(&self) {
        lock(&self.state).fail_next = true;
    }
}

fn lock(state: &Mutex<StripState>) -> MutexGuard<'_, StripState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Mock buzzer output for testing.

use crate::{Result, traits::ToneOutput};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Buzzer output that records every level change.
///
/// # Examples
///
/// ```
/// use hexapad_hardware::mock::MockTone;
/// use hexapad_hardware::traits::ToneOutput;
///
/// let (mut tone, handle) = MockTone::new();
/// tone.set_level(128).unwrap();
/// tone.set_level(0).unwrap();
///
/// assert_eq!(handle.levels(), vec![128, 0]);
/// assert_eq!(handle.level(), 0);
/// ```
#[derive(Debug)]
pub struct MockTone {
    levels: Arc<Mutex<Vec<u8>>>,
}

impl MockTone {
    pub fn new() -> (Self, MockToneHandle) {
        let levels = Arc::new(Mutex::new(Vec::new()));
        let tone = Self {
            levels: Arc::clone(&levels),
        };
        (tone, MockToneHandle { levels })
    }
}

impl ToneOutput for MockTone {
    fn set_level(&mut self, level: u8) -> Result<()> {
        lock(&self.levels).push(level);
        Ok(())
    }
}

/// Inspection handle for a [`MockTone`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockToneHandle {
    levels: Arc<Mutex<Vec<u8>>>,
}

impl MockToneHandle {
    /// Current level (0 before the first write).
    #[must_use]
    pub fn level(&self) -> u8 {
        lock(&self.levels).last().copied().unwrap_or(0)
    }

    /// Every level written, oldest first.
    #[must_use]
    pub fn levels(&self) -> Vec<u8> {
        lock(&self.levels).clone()
    }

    /// Number of writes with a non-zero level.
    #[must_use]
    pub fn on_count(&self) -> usize {
        lock(&self.levels).iter().filter(|&&l| l > 0).count()
    }

    pub fn clear(&self) {
        lock(&self.levels).clear();
    }
}

fn lock(levels: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    levels.lock().unwrap_or_else(PoisonError::into_inner)
}

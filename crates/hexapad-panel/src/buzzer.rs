//! Non-blocking buzzer sequencer.
//!
//! A pattern is played as a sequence of deadlines checked on every tick:
//!
//! ```text
//!            start()
//!   Idle ─────────────> Beeping(1)
//!    ^                     │ beep_length elapsed
//!    │ last beep,          v
//!    │ no repeat        Pausing ── short_pause / long_pause ──> Beeping(n)
//!    └─────────────────────┘
//! ```
//!
//! Two sources share the output: the pattern and the short key beep. The
//! level written to the [`ToneOutput`] is
//!
//! - `0` while pin mode mute is active (it overrides everything else),
//! - otherwise the pattern tone unless tones are muted, or the key beep tone
//!   unless key beeps are muted, whichever is louder.
//!
//! The output is only written when that level changes.

use hexapad_core::BuzzerPattern;
use hexapad_hardware::ToneOutput;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Observable sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerState {
    Idle,
    /// Beep number `n` (1-based) of the current cycle is sounding.
    Beeping(u8),
    Pausing,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Beeping { completed: u8, until: Instant },
    Pausing { completed: u8, until: Instant },
}

/// Buzzer sequencer driving one [`ToneOutput`].
pub struct Buzzer {
    output: Box<dyn ToneOutput>,
    pattern: BuzzerPattern,
    phase: Phase,
    key_beep_until: Option<Instant>,
    key_beep_length: Duration,
    key_beep_tone: u8,
    tone_muted: bool,
    beep_muted: bool,
    pinmode_muted: bool,
    level: u8,
}

impl Buzzer {
    pub fn new(output: Box<dyn ToneOutput>) -> Self {
        Self {
            output,
            pattern: BuzzerPattern::default(),
            phase: Phase::Idle,
            key_beep_until: None,
            key_beep_length: Duration::from_millis(hexapad_core::constants::DEFAULT_KEY_BEEP_MS),
            key_beep_tone: u8::MAX,
            tone_muted: false,
            beep_muted: false,
            pinmode_muted: false,
            level: 0,
        }
    }

    /// Length and level of the key beep.
    pub fn with_key_beep(mut self, length: Duration, tone: u8) -> Self {
        self.key_beep_length = length;
        self.key_beep_tone = tone;
        self
    }

    pub fn state(&self) -> BuzzerState {
        match self.phase {
            Phase::Idle => BuzzerState::Idle,
            Phase::Beeping { completed, .. } => BuzzerState::Beeping(completed.saturating_add(1)),
            Phase::Pausing { .. } => BuzzerState::Pausing,
        }
    }

    /// Level currently applied to the output.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Start `pattern`, replacing whatever was playing.
    ///
    /// A pattern with zero beeps and no repeat plays nothing and only stops
    /// the current one.
    pub fn start(&mut self, pattern: BuzzerPattern, now: Instant) {
        if pattern.beeps == 0 && !pattern.repeat {
            debug!("Pattern with no beeps, nothing to play");
            self.stop();
            return;
        }

        debug!(
            beeps = pattern.beeps,
            short_ms = pattern.short_pause_ms,
            long_ms = pattern.long_pause_ms,
            tone = pattern.tone,
            repeat = pattern.repeat,
            length_ms = pattern.beep_length_ms,
            "Buzzer pattern started"
        );
        self.pattern = pattern;
        self.phase = Phase::Beeping {
            completed: 0,
            until: now + Duration::from_millis(pattern.beep_length_ms),
        };
        self.refresh();
    }

    /// Cancel the pattern and silence it immediately.
    pub fn stop(&mut self) {
        if !matches!(self.phase, Phase::Idle) {
            debug!("Buzzer pattern stopped");
        }
        self.phase = Phase::Idle;
        self.refresh();
    }

    /// Sound the short key beep.
    pub fn key_beep(&mut self, now: Instant) {
        self.key_beep_until = Some(now + self.key_beep_length);
        trace!("Key beep");
        self.refresh();
    }

    /// Advance the pattern and expire the key beep.
    pub fn tick(&mut self, now: Instant) {
        if let Some(until) = self.key_beep_until
            && now >= until
        {
            self.key_beep_until = None;
        }

        self.phase = match self.phase {
            Phase::Beeping { completed, until } if now >= until => {
                let completed = completed.saturating_add(1);
                // Zero-beep repeating patterns still sound once per cycle.
                if completed >= self.pattern.beeps.max(1) {
                    if self.pattern.repeat {
                        Phase::Pausing {
                            completed: 0,
                            until: now + Duration::from_millis(self.pattern.long_pause_ms),
                        }
                    } else {
                        debug!("Buzzer pattern finished");
                        Phase::Idle
                    }
                } else {
                    Phase::Pausing {
                        completed,
                        until: now + Duration::from_millis(self.pattern.short_pause_ms),
                    }
                }
            }
            Phase::Pausing { completed, until } if now >= until => Phase::Beeping {
                completed,
                until: now + Duration::from_millis(self.pattern.beep_length_ms),
            },
            phase => phase,
        };

        self.refresh();
    }

    pub fn tone_muted(&self) -> bool {
        self.tone_muted
    }

    pub fn set_tone_muted(&mut self, muted: bool) {
        if self.tone_muted != muted {
            self.tone_muted = muted;
            debug!(muted, "Tone mute changed");
            self.refresh();
        }
    }

    pub fn beep_muted(&self) -> bool {
        self.beep_muted
    }

    pub fn set_beep_muted(&mut self, muted: bool) {
        if self.beep_muted != muted {
            self.beep_muted = muted;
            debug!(muted, "Key beep mute changed");
            self.refresh();
        }
    }

    pub fn pinmode_muted(&self) -> bool {
        self.pinmode_muted
    }

    pub fn set_pinmode_muted(&mut self, muted: bool) {
        if self.pinmode_muted != muted {
            self.pinmode_muted = muted;
            debug!(muted, "Pin mode mute changed");
            self.refresh();
        }
    }

    fn target_level(&self) -> u8 {
        if self.pinmode_muted {
            return 0;
        }
        let pattern = match self.phase {
            Phase::Beeping { .. } if !self.tone_muted => self.pattern.tone,
            _ => 0,
        };
        let key = match self.key_beep_until {
            Some(_) if !self.beep_muted => self.key_beep_tone,
            _ => 0,
        };
        pattern.max(key)
    }

    fn refresh(&mut self) {
        let level = self.target_level();
        if level == self.level {
            return;
        }
        match self.output.set_level(level) {
            Ok(()) => self.level = level,
            Err(e) => warn!(error = %e, level, "Failed to drive buzzer"),
        }
    }
}

impl std::fmt::Debug for Buzzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buzzer")
            .field("state", &self.state())
            .field("level", &self.level)
            .field("tone_muted", &self.tone_muted)
            .field("beep_muted", &self.beep_muted)
            .field("pinmode_muted", &self.pinmode_muted)
            .finish()
    }
}

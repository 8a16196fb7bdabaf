//! PIN entry and arm-request state machine.
//!
//! Turns keypad events into at most one dispatch per completed entry. The
//! machine only extracts flags from well-known prefixes and forwards the
//! remaining digits verbatim; the controller decides whether the PIN is
//! right.
//!
//! # States
//!
//! ```text
//!          digit                        Enter / arm key
//!   Idle ─────────> Entering ─────────────────────────> Evaluating ──> Idle
//!    ^                 │  incorrect_pin_timeout, Cancel,                 │
//!    └─────────────────┘  too many digits                                │
//!                                                                        v
//!                        open_sensors lockout active, buffer empty:  Locked
//! ```
//!
//! The incorrect-PIN deadline only runs while `Entering` and is pushed back
//! by every digit. The failed-open-sensors lockout is independent of the
//! buffer: while it is active, arm requests are suppressed, disarm always
//! goes through.
//!
//! # Prefixes
//!
//! On the key-by-key path the force and skip-delay prefixes are matched
//! against the start of the buffer only. With combined prefixes allowed
//! both may be stripped, in either order, each at most once. Complete entry
//! frames carry the prefix in its own field, which must equal a configured
//! prefix exactly.
//!
//! # Examples
//!
//! ```
//! use hexapad_core::{AlarmMode, config::EntryConfig};
//! use hexapad_panel::pin_entry::{EntryFeedback, PinEntry};
//! use hexapad_protocol::{Command, Event};
//! use std::sync::{Arc, Mutex};
//! use std::time::{Duration, Instant};
//!
//! let sent = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&sent);
//!
//! let mut entry = PinEntry::new(&EntryConfig::default(), Duration::from_secs(5), Duration::from_secs(10))
//!     .unwrap()
//!     .on_mode(AlarmMode::Away, move |request| sink.lock().unwrap().push(request.clone()));
//!
//! let now = Instant::now();
//! for digit in [9, 9, 9, 1, 2, 3, 4] {
//!     entry.handle_event(&Event::Digit(digit), now);
//! }
//! entry.handle_event(&Event::Command(Command::Enter), now);
//!
//! let sent = sent.lock().unwrap();
//! assert!(sent[0].forced);
//! assert!(!sent[0].skip_delay);
//! assert_eq!(sent[0].raw_pin, "1234");
//! assert!(matches!(entry.drain_feedback().next(), Some(EntryFeedback::Accepted(_))));
//! ```

use hexapad_core::{
    AlarmMode, ArmKey, ArmRequest, CustomActionRequest, Digits, DispatchTarget, DynamicMode,
    Error, Result, config::EntryConfig,
};
use hexapad_protocol::{Command, EntryFrame, Event};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Callback receiving the request for one alarm mode.
pub type ModeCallback = Box<dyn FnMut(&ArmRequest) + Send>;
/// Callback receiving custom-action entries.
pub type CustomActionCallback = Box<dyn FnMut(&CustomActionRequest) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Idle,
    Entering,
    Evaluating,
    Locked,
}

/// Why an entry was dropped without dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooLong,
    EmptyPin,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::TooLong => "too_long",
            RejectReason::EmptyPin => "empty_pin",
        }
    }
}

/// User-visible outcome of entry handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFeedback {
    Accepted(DispatchTarget),
    Rejected(RejectReason),
    Timeout,
    /// The entry resolved to a target nobody handles.
    ConfigurationError(DispatchTarget),
    /// Arm attempt dropped during the open-sensors lockout.
    Suppressed,
    LockoutStarted,
    LockoutEnded,
}

impl EntryFeedback {
    /// Configuration key used to attach reactions.
    pub fn key(&self) -> &'static str {
        match self {
            EntryFeedback::Accepted(_) => "accepted",
            EntryFeedback::Rejected(_) => "rejected",
            EntryFeedback::Timeout => "timeout",
            EntryFeedback::ConfigurationError(_) => "configuration_error",
            EntryFeedback::Suppressed => "suppressed",
            EntryFeedback::LockoutStarted => "lockout_started",
            EntryFeedback::LockoutEnded => "lockout_ended",
        }
    }
}

impl fmt::Display for EntryFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryFeedback::Accepted(target) => write!(f, "accepted ({target})"),
            EntryFeedback::Rejected(reason) => write!(f, "rejected ({})", reason.as_str()),
            EntryFeedback::ConfigurationError(target) => {
                write!(f, "configuration error ({target})")
            }
            other => f.write_str(other.key()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Entering { deadline: Instant },
    Evaluating,
}

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    forced: bool,
    skip_delay: bool,
}

/// PIN entry machine. Register callbacks with [`PinEntry::on_mode`] and
/// [`PinEntry::on_custom_action`], then feed events and tick it.
pub struct PinEntry {
    force_prefix: Digits,
    skip_delay_prefix: Digits,
    allow_combined_prefixes: bool,
    max_entry_length: usize,
    default_mode: AlarmMode,
    dynamic_mode: DynamicMode,
    incorrect_pin_timeout: Duration,
    lockout_timeout: Duration,

    buffer: Digits,
    phase: Phase,
    lockout_until: Option<Instant>,

    mode_callbacks: HashMap<AlarmMode, ModeCallback>,
    custom_action: Option<CustomActionCallback>,
    feedback: Vec<EntryFeedback>,
}

impl PinEntry {
    /// # Errors
    /// Returns an error when a prefix is not a digit string or the maximum
    /// entry length is outside `1..=32`.
    pub fn new(
        config: &EntryConfig,
        incorrect_pin_timeout: Duration,
        lockout_timeout: Duration,
    ) -> Result<Self> {
        let force_prefix: Digits = config.force_prefix.parse()?;
        let skip_delay_prefix: Digits = config.skip_delay_prefix.parse()?;
        if !(1..=hexapad_core::constants::MAX_ENTRY_DIGITS).contains(&config.max_entry_length) {
            return Err(Error::config(
                "entry.max_entry_length",
                format!("{} is out of range", config.max_entry_length),
            ));
        }

        Ok(Self {
            force_prefix,
            skip_delay_prefix,
            allow_combined_prefixes: config.allow_combined_prefixes,
            max_entry_length: config.max_entry_length,
            default_mode: config.default_mode,
            dynamic_mode: config.dynamic_mode,
            incorrect_pin_timeout,
            lockout_timeout,
            buffer: Digits::new(),
            phase: Phase::Idle,
            lockout_until: None,
            mode_callbacks: HashMap::new(),
            custom_action: None,
            feedback: Vec::new(),
        })
    }

    /// Register the callback for `mode`, replacing any earlier one.
    pub fn on_mode<F>(mut self, mode: AlarmMode, callback: F) -> Self
    where
        F: FnMut(&ArmRequest) + Send + 'static,
    {
        self.mode_callbacks.insert(mode, Box::new(callback));
        self
    }

    pub fn on_custom_action<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CustomActionRequest) + Send + 'static,
    {
        self.custom_action = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> EntryState {
        match self.phase {
            Phase::Entering { .. } => EntryState::Entering,
            Phase::Evaluating => EntryState::Evaluating,
            Phase::Idle if self.lockout_until.is_some() => EntryState::Locked,
            Phase::Idle => EntryState::Idle,
        }
    }

    /// Number of digits typed so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_locked_out(&self) -> bool {
        self.lockout_until.is_some()
    }

    pub fn dynamic_mode(&self) -> DynamicMode {
        self.dynamic_mode
    }

    /// Change what the dynamic arm-select key resolves to. Applies to the
    /// next submitted entry.
    pub fn set_dynamic_mode(&mut self, mode: DynamicMode) {
        if self.dynamic_mode != mode {
            debug!(from = %self.dynamic_mode, to = %mode, "Dynamic arm key changed");
            self.dynamic_mode = mode;
        }
    }

    /// Take the feedback produced since the last call, oldest first.
    pub fn drain_feedback(&mut self) -> std::vec::Drain<'_, EntryFeedback> {
        self.feedback.drain(..)
    }

    /// Apply one keypad event.
    pub fn handle_event(&mut self, event: &Event, now: Instant) {
        match event {
            Event::Digit(digit) => self.push_digit(*digit, now),
            Event::Command(Command::Enter) => {
                self.submit_buffer(DispatchTarget::Mode(self.default_mode));
            }
            Event::Command(Command::ArmKey(key)) => self.submit_buffer(self.resolve(*key)),
            Event::Command(Command::Cancel) => {
                if !self.buffer.is_empty() {
                    debug!(digits = self.buffer.len(), "Entry cancelled");
                }
                self.reset();
            }
            Event::Command(Command::Entry(frame)) => self.submit_frame(frame),
            Event::Command(Command::ArmSelectIndicator(_) | Command::ReaderMode(_))
            | Event::Heartbeat => {}
        }
    }

    /// Expire the incorrect-PIN deadline and the lockout.
    pub fn tick(&mut self, now: Instant) {
        if let Phase::Entering { deadline } = self.phase
            && now >= deadline
        {
            info!(digits = self.buffer.len(), "PIN entry timed out");
            self.reset();
            self.feedback.push(EntryFeedback::Timeout);
        }

        if let Some(until) = self.lockout_until
            && now >= until
        {
            info!("Open sensors lockout expired");
            self.lockout_until = None;
            self.feedback.push(EntryFeedback::LockoutEnded);
        }
    }

    /// Start (or extend) the failed-open-sensors lockout.
    pub fn start_lockout(&mut self, now: Instant) {
        let was_locked = self.lockout_until.is_some();
        self.lockout_until = Some(now + self.lockout_timeout);
        if !was_locked {
            warn!(
                timeout_ms = self.lockout_timeout.as_millis() as u64,
                "Arming failed on open sensors, arm requests suppressed"
            );
            self.feedback.push(EntryFeedback::LockoutStarted);
        }
    }

    /// End the lockout early, when the controller reports sensors clear.
    pub fn end_lockout(&mut self) {
        if self.lockout_until.take().is_some() {
            info!("Sensors clear, lockout ended");
            self.feedback.push(EntryFeedback::LockoutEnded);
        }
    }

    fn resolve(&self, key: ArmKey) -> DispatchTarget {
        match key {
            ArmKey::Away => DispatchTarget::Mode(AlarmMode::Away),
            ArmKey::Home => DispatchTarget::Mode(AlarmMode::Home),
            ArmKey::Disarm => DispatchTarget::Mode(AlarmMode::Disarm),
            ArmKey::Dynamic => self.dynamic_mode.target(),
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.phase = Phase::Idle;
    }

    fn push_digit(&mut self, digit: u8, now: Instant) {
        if self.buffer.len() >= self.max_entry_length {
            warn!(max = self.max_entry_length, "Entry too long, discarded");
            self.reset();
            self.feedback.push(EntryFeedback::Rejected(RejectReason::TooLong));
            return;
        }
        if let Err(e) = self.buffer.push(digit) {
            warn!(error = %e, "Digit dropped");
            return;
        }
        self.phase = Phase::Entering {
            deadline: now + self.incorrect_pin_timeout,
        };
    }

    /// Strip leading prefixes. Returns the flags and the prefix length.
    fn split_prefixes(&self, digits: &[u8]) -> (Flags, usize) {
        let mut flags = Flags::default();
        let mut consumed = 0;
        loop {
            let rest = &digits[consumed..];
            let force = (!flags.forced && has_prefix(rest, &self.force_prefix))
                .then_some(self.force_prefix.len());
            let skip = (!flags.skip_delay && has_prefix(rest, &self.skip_delay_prefix))
                .then_some(self.skip_delay_prefix.len());

            // Prefer the longer prefix when both match at this position.
            match (force, skip) {
                (Some(f), Some(s)) if s > f => {
                    flags.skip_delay = true;
                    consumed += s;
                }
                (Some(f), _) => {
                    flags.forced = true;
                    consumed += f;
                }
                (None, Some(s)) => {
                    flags.skip_delay = true;
                    consumed += s;
                }
                (None, None) => break,
            }
            if !self.allow_combined_prefixes {
                break;
            }
        }
        (flags, consumed)
    }

    fn submit_buffer(&mut self, target: DispatchTarget) {
        let digits = std::mem::take(&mut self.buffer);
        self.phase = Phase::Evaluating;

        let (flags, consumed) = self.split_prefixes(digits.as_slice());
        let (prefix, pin) = digits.as_slice().split_at(consumed);
        self.dispatch(target, flags, prefix, pin);
    }

    fn submit_frame(&mut self, frame: &EntryFrame) {
        if !self.buffer.is_empty() {
            debug!("Entry frame replaces typed digits");
        }
        self.buffer.clear();
        self.phase = Phase::Evaluating;

        if frame.prefix.len() + frame.pin.len() > self.max_entry_length {
            warn!(max = self.max_entry_length, "Entry frame too long, discarded");
            self.reset();
            self.feedback.push(EntryFeedback::Rejected(RejectReason::TooLong));
            return;
        }

        let flags = Flags {
            forced: !self.force_prefix.is_empty() && frame.prefix == self.force_prefix,
            skip_delay: !self.skip_delay_prefix.is_empty()
                && frame.prefix == self.skip_delay_prefix,
        };
        let target = self.resolve(frame.arm_key);
        self.dispatch(target, flags, frame.prefix.as_slice(), frame.pin.as_slice());
    }

    fn dispatch(&mut self, target: DispatchTarget, flags: Flags, prefix: &[u8], pin: &[u8]) {
        let outcome = self.evaluate(target, flags, prefix, pin);
        self.reset();
        self.feedback.push(outcome);
    }

    fn evaluate(
        &mut self,
        target: DispatchTarget,
        flags: Flags,
        prefix: &[u8],
        pin: &[u8],
    ) -> EntryFeedback {
        if pin.is_empty() {
            info!(target = %target, "Entry without PIN rejected");
            return EntryFeedback::Rejected(RejectReason::EmptyPin);
        }

        match target {
            DispatchTarget::Mode(mode) => {
                if mode.is_arm() && self.lockout_until.is_some() {
                    warn!(mode = %mode, "Arm request suppressed during open sensors lockout");
                    return EntryFeedback::Suppressed;
                }
                let Some(callback) = self.mode_callbacks.get_mut(&mode) else {
                    warn!(mode = %mode, "No handler for mode, request dropped");
                    return EntryFeedback::ConfigurationError(target);
                };
                let request = ArmRequest {
                    mode,
                    forced: flags.forced,
                    skip_delay: flags.skip_delay,
                    raw_pin: to_text(pin),
                };
                info!(
                    mode = %mode,
                    forced = request.forced,
                    skip_delay = request.skip_delay,
                    pin_digits = pin.len(),
                    "Dispatching arm request"
                );
                callback(&request);
            }
            DispatchTarget::CustomAction => {
                let Some(callback) = self.custom_action.as_mut() else {
                    warn!("No handler for custom action, request dropped");
                    return EntryFeedback::ConfigurationError(target);
                };
                let request = CustomActionRequest {
                    prefix: to_text(prefix),
                    pin: to_text(pin),
                };
                info!(prefix_digits = prefix.len(), pin_digits = pin.len(), "Dispatching custom action");
                callback(&request);
            }
        }
        EntryFeedback::Accepted(target)
    }
}

impl fmt::Debug for PinEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinEntry")
            .field("state", &self.state())
            .field("buffered", &self.buffer.len())
            .field("modes", &self.mode_callbacks.keys().collect::<Vec<_>>())
            .field("custom_action", &self.custom_action.is_some())
            .finish_non_exhaustive()
    }
}

fn has_prefix(digits: &[u8], prefix: &Digits) -> bool {
    !prefix.is_empty() && digits.starts_with(prefix.as_slice())
}

fn to_text(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    type Sent = Arc<Mutex<Vec<ArmRequest>>>;

    const PIN_TIMEOUT: Duration = Duration::from_secs(5);
    const LOCKOUT: Duration = Duration::from_secs(10);

    fn entry_with(config: EntryConfig) -> (PinEntry, Sent) {
        let sent: Sent = Arc::default();
        let mut entry = PinEntry::new(&config, PIN_TIMEOUT, LOCKOUT).unwrap();
        for mode in AlarmMode::ALL {
            let sink = Arc::clone(&sent);
            entry = entry.on_mode(mode, move |r| sink.lock().unwrap().push(r.clone()));
        }
        (entry, sent)
    }

    fn entry() -> (PinEntry, Sent) {
        entry_with(EntryConfig::default())
    }

    fn type_digits(entry: &mut PinEntry, digits: &str, now: Instant) {
        for c in digits.chars() {
            let d = c.to_digit(10).unwrap() as u8;
            entry.handle_event(&Event::Digit(d), now);
        }
    }

    fn enter(entry: &mut PinEntry, now: Instant) {
        entry.handle_event(&Event::Command(Command::Enter), now);
    }

    fn feedback(entry: &mut PinEntry) -> Vec<EntryFeedback> {
        entry.drain_feedback().collect()
    }

    #[rstest]
    #[case("9991234", true, false, "1234")]
    #[case("9981234", false, true, "1234")]
    #[case("9999981234", true, true, "1234")]
    #[case("9989991234", true, true, "1234")]
    #[case("1234999", false, false, "1234999")]
    #[case("999999", true, false, "999")]
    fn test_prefixes(
        #[case] typed: &str,
        #[case] forced: bool,
        #[case] skip_delay: bool,
        #[case] pin: &str,
    ) {
        let (mut entry, sent) = entry();
        let now = Instant::now();

        type_digits(&mut entry, typed, now);
        enter(&mut entry, now);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].mode, AlarmMode::Away);
        assert_eq!(sent[0].forced, forced);
        assert_eq!(sent[0].skip_delay, skip_delay);
        assert_eq!(sent[0].raw_pin, pin);
    }

    #[test]
    fn test_combined_prefixes_disabled() {
        let (mut entry, sent) = entry_with(EntryConfig {
            allow_combined_prefixes: false,
            ..EntryConfig::default()
        });
        let now = Instant::now();

        type_digits(&mut entry, "9999981234", now);
        enter(&mut entry, now);

        let sent = sent.lock().unwrap();
        assert!(sent[0].forced);
        assert!(!sent[0].skip_delay);
        assert_eq!(sent[0].raw_pin, "9981234");
    }

    #[test]
    fn test_arm_keys_pick_mode() {
        let (mut entry, sent) = entry();
        let now = Instant::now();

        type_digits(&mut entry, "1234", now);
        entry.handle_event(&Event::Command(Command::ArmKey(ArmKey::Home)), now);
        type_digits(&mut entry, "1234", now);
        entry.handle_event(&Event::Command(Command::ArmKey(ArmKey::Dynamic)), now);
        type_digits(&mut entry, "1234", now);
        entry.handle_event(&Event::Command(Command::ArmKey(ArmKey::Disarm)), now);

        let modes: Vec<_> = sent.lock().unwrap().iter().map(|r| r.mode).collect();
        assert_eq!(modes, [AlarmMode::Home, AlarmMode::Night, AlarmMode::Disarm]);
    }

    #[test]
    fn test_timeout_clears_buffer_once() {
        let (mut entry, sent) = entry();
        let t0 = Instant::now();

        type_digits(&mut entry, "12", t0);
        assert_eq!(entry.state(), EntryState::Entering);

        entry.tick(t0 + PIN_TIMEOUT - Duration::from_millis(1));
        assert_eq!(entry.buffered_len(), 2);

        entry.tick(t0 + PIN_TIMEOUT);
        entry.tick(t0 + PIN_TIMEOUT * 2);
        assert_eq!(entry.state(), EntryState::Idle);
        assert_eq!(entry.buffered_len(), 0);
        assert_eq!(feedback(&mut entry), [EntryFeedback::Timeout]);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_each_digit_extends_deadline() {
        let (mut entry, _sent) = entry();
        let t0 = Instant::now();

        type_digits(&mut entry, "1", t0);
        type_digits(&mut entry, "2", t0 + Duration::from_secs(4));
        entry.tick(t0 + Duration::from_secs(6));
        assert_eq!(entry.buffered_len(), 2);
        assert!(feedback(&mut entry).is_empty());
    }

    #[test]
    fn test_max_length_boundary() {
        let (mut entry, sent) = entry();
        let now = Instant::now();

        type_digits(&mut entry, &"1".repeat(16), now);
        enter(&mut entry, now);
        assert_eq!(sent.lock().unwrap()[0].raw_pin.len(), 16);
        feedback(&mut entry);

        type_digits(&mut entry, &"1".repeat(17), now);
        assert_eq!(
            feedback(&mut entry),
            [EntryFeedback::Rejected(RejectReason::TooLong)]
        );
        assert_eq!(entry.buffered_len(), 0);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[rstest]
    #[case("")]
    #[case("999")]
    #[case("999998")]
    fn test_empty_pin_rejected(#[case] typed: &str) {
        let (mut entry, sent) = entry();
        let now = Instant::now();

        type_digits(&mut entry, typed, now);
        enter(&mut entry, now);

        assert_eq!(
            feedback(&mut entry),
            [EntryFeedback::Rejected(RejectReason::EmptyPin)]
        );
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_is_silent() {
        let (mut entry, sent) = entry();
        let now = Instant::now();

        type_digits(&mut entry, "12", now);
        entry.handle_event(&Event::Command(Command::Cancel), now);

        assert_eq!(entry.state(), EntryState::Idle);
        assert!(feedback(&mut entry).is_empty());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_handler_is_configuration_error() {
        let mut entry = PinEntry::new(&EntryConfig::default(), PIN_TIMEOUT, LOCKOUT).unwrap();
        let now = Instant::now();

        type_digits(&mut entry, "1234", now);
        enter(&mut entry, now);

        assert_eq!(
            feedback(&mut entry),
            [EntryFeedback::ConfigurationError(DispatchTarget::Mode(
                AlarmMode::Away
            ))]
        );
    }

    #[test]
    fn test_custom_action_gets_prefix_and_pin() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&requests);
        let config = EntryConfig {
            dynamic_mode: DynamicMode::Action,
            ..EntryConfig::default()
        };
        let mut entry = PinEntry::new(&config, PIN_TIMEOUT, LOCKOUT)
            .unwrap()
            .on_custom_action(move |r| sink.lock().unwrap().push(r.clone()));
        let now = Instant::now();

        type_digits(&mut entry, "9984321", now);
        entry.handle_event(&Event::Command(Command::ArmKey(ArmKey::Dynamic)), now);

        let requests = requests.lock().unwrap();
        assert_eq!(
            requests[0],
            CustomActionRequest {
                prefix: "998".to_string(),
                pin: "4321".to_string()
            }
        );
    }

    #[test]
    fn test_dynamic_key_follows_runtime_selection() {
        let (mut entry, sent) = entry();
        let now = Instant::now();
        let dynamic = Event::Command(Command::ArmKey(ArmKey::Dynamic));

        type_digits(&mut entry, "1234", now);
        entry.handle_event(&dynamic, now);
        entry.set_dynamic_mode(DynamicMode::Vacation);
        type_digits(&mut entry, "1234", now);
        entry.handle_event(&dynamic, now);

        let modes: Vec<AlarmMode> = sent.lock().unwrap().iter().map(|r| r.mode).collect();
        assert_eq!(modes, [AlarmMode::Night, AlarmMode::Vacation]);
        assert_eq!(entry.dynamic_mode(), DynamicMode::Vacation);
    }

    #[test]
    fn test_lockout_suppresses_arm_but_not_disarm() {
        let (mut entry, sent) = entry();
        let t0 = Instant::now();

        entry.start_lockout(t0);
        assert_eq!(entry.state(), EntryState::Locked);

        type_digits(&mut entry, "1234", t0);
        enter(&mut entry, t0);
        type_digits(&mut entry, "1234", t0);
        entry.handle_event(&Event::Command(Command::ArmKey(ArmKey::Disarm)), t0);

        assert_eq!(
            feedback(&mut entry),
            [
                EntryFeedback::LockoutStarted,
                EntryFeedback::Suppressed,
                EntryFeedback::Accepted(DispatchTarget::Mode(AlarmMode::Disarm)),
            ]
        );
        assert_eq!(sent.lock().unwrap().len(), 1);

        entry.tick(t0 + LOCKOUT);
        assert_eq!(feedback(&mut entry), [EntryFeedback::LockoutEnded]);
        assert_eq!(entry.state(), EntryState::Idle);
    }

    #[test]
    fn test_sensors_clear_ends_lockout() {
        let (mut entry, _sent) = entry();
        let t0 = Instant::now();

        entry.start_lockout(t0);
        entry.start_lockout(t0 + Duration::from_secs(1));
        entry.end_lockout();
        entry.end_lockout();

        assert_eq!(
            feedback(&mut entry),
            [EntryFeedback::LockoutStarted, EntryFeedback::LockoutEnded]
        );
    }

    #[rstest]
    #[case("999", true, false)]
    #[case("998", false, true)]
    #[case("", false, false)]
    #[case("997", false, false)]
    fn test_entry_frame_prefix(#[case] prefix: &str, #[case] forced: bool, #[case] skip: bool) {
        let (mut entry, sent) = entry();
        let frame = EntryFrame {
            prefix: prefix.parse().unwrap(),
            arm_key: ArmKey::Away,
            pin: "1234".parse().unwrap(),
        };

        entry.handle_event(&Event::Command(Command::Entry(frame)), Instant::now());

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].forced, forced);
        assert_eq!(sent[0].skip_delay, skip);
        assert_eq!(sent[0].raw_pin, "1234");
    }

    #[test]
    fn test_entry_frame_replaces_typed_digits() {
        let (mut entry, sent) = entry();
        let now = Instant::now();

        type_digits(&mut entry, "55", now);
        let frame = EntryFrame {
            prefix: Digits::new(),
            arm_key: ArmKey::Home,
            pin: "1234".parse().unwrap(),
        };
        entry.handle_event(&Event::Command(Command::Entry(frame)), now);

        assert_eq!(sent.lock().unwrap()[0].raw_pin, "1234");
        assert_eq!(entry.state(), EntryState::Idle);
    }
}

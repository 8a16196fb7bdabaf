//! Panel scheduler facade.
//!
//! [`Panel`] owns every component and is driven from a single loop:
//!
//! ```text
//! serial bytes ──> FrameDecoder ──> Event ──┬──> key beep / pin mode
//!                                           ├──> indicator mode machines
//!                                           └──> PinEntry ──> ControllerRequest
//!                                                    │
//!                                                    └──> feedback reactions
//!
//! controller notifications ──> AlarmStateSync ──> watch ──> status reactions
//!
//! tick(now): notifications, sync timers, status reactions, entry timers,
//!            pin mode, buzzer, LED render
//! ```
//!
//! Nothing in here blocks and nothing stops the loop: hardware failures are
//! logged, bad bytes are counted by the decoder, and controller outages show
//! up as `connection_timed_out`.

use crate::{
    buzzer::Buzzer,
    led::LedEngine,
    modes::{ModeMachine, Trigger},
    pin_entry::{EntryFeedback, PinEntry},
    ready::ReadySelector,
    sync::AlarmStateSync,
};
use hexapad_core::{
    AlarmMode, AlarmStatus, BuzzerPattern, DynamicMode, Result,
    config::{ModeConfig, PanelConfig, TriggerAction},
};
use hexapad_hardware::{
    ControllerLink, ControllerNotification, ControllerRequest, ControllerRequester, LedDriver,
    PreferenceStore, ToneOutput,
};
use hexapad_protocol::{Command, DecodeStats, Event, FrameDecoder};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Preference key of the tone mute switch.
pub const TONE_MUTED_KEY: &str = "buzzer.tone_muted";
/// Preference key of the key beep mute switch.
pub const BEEP_MUTED_KEY: &str = "buzzer.beep_muted";
/// Preference key of the dynamic arm-select key resolution.
pub const DYNAMIC_MODE_KEY: &str = "entry.dynamic_mode";

/// Outputs that triggers act on.
pub struct Outputs {
    pub leds: LedEngine,
    pub buzzer: Buzzer,
    /// Time of the event being handled.
    pub now: Instant,
}

/// Devices the panel drives.
pub struct PanelDevices {
    pub strip: Box<dyn LedDriver>,
    pub tone: Box<dyn ToneOutput>,
    pub store: Box<dyn PreferenceStore>,
}

pub struct Panel {
    decoder: FrameDecoder,
    entry: PinEntry,
    sync: AlarmStateSync,
    ready: ReadySelector,
    link: ControllerLink,
    store: Box<dyn PreferenceStore>,
    outputs: Outputs,

    status_rx: watch::Receiver<AlarmStatus>,
    status_modes: Option<ModeMachine<Outputs>>,
    arm_select: Option<ModeMachine<Outputs>>,
    reader_mode: Option<ModeMachine<Outputs>>,
    test_modes: Option<ModeMachine<Outputs>>,
    feedback: HashMap<String, Vec<Trigger<Outputs>>>,

    key_beep: bool,
    pinmode: Option<Duration>,
    pinmode_until: Option<Instant>,
}

impl Panel {
    /// Validate `config` and build the panel.
    ///
    /// The reactions for the initial status (`connection_timed_out`) run
    /// right away.
    ///
    /// # Errors
    /// Returns the first configuration error. The panel never starts with an
    /// invalid configuration.
    pub fn new(
        config: &PanelConfig,
        devices: PanelDevices,
        link: ControllerLink,
        now: Instant,
    ) -> Result<Self> {
        config.validate()?;

        let PanelDevices { strip, tone, store } = devices;

        let leds = LedEngine::new(&config.strip, strip)?;
        let mut buzzer = Buzzer::new(tone).with_key_beep(
            Duration::from_millis(config.buzzer.key_beep_ms),
            config.buzzer.key_beep_tone,
        );
        buzzer.set_tone_muted(load_flag(&*store, TONE_MUTED_KEY, config.buzzer.tone_muted));
        buzzer.set_beep_muted(load_flag(&*store, BEEP_MUTED_KEY, config.buzzer.beep_muted));

        let mut entry = build_entry(config, link.requester())?;
        entry.set_dynamic_mode(load_dynamic_mode(&*store, config.entry.dynamic_mode));
        let ready = ReadySelector::new(&config.ready, &*store)?;
        let sync = AlarmStateSync::new(config, ready.selected(), now);
        let status_rx = sync.subscribe_status();

        let status_modes = if config.status.reactions.is_empty() {
            None
        } else {
            let mut builder = ModeMachine::builder("status");
            for (key, actions) in &config.status.reactions {
                // validated above
                let Some(key) = AlarmStatus::canonical_key(key) else {
                    continue;
                };
                builder = builder.mode(&key);
                for action in actions {
                    builder = builder.boxed_trigger(&key, compile_action(action));
                }
            }
            Some(builder.build()?)
        };

        let feedback = config
            .feedback
            .iter()
            .map(|(key, actions)| (key.clone(), compile_actions(actions)))
            .collect();

        let mut panel = Self {
            decoder: FrameDecoder::new(),
            entry,
            sync,
            ready,
            link,
            store,
            outputs: Outputs { leds, buzzer, now },
            status_rx,
            status_modes,
            arm_select: build_modes("arm_select", config.indicators.arm_select.as_ref())?,
            reader_mode: build_modes("reader_mode", config.indicators.reader_mode.as_ref())?,
            test_modes: build_modes("test_modes", config.test_modes.as_ref())?,
            feedback,
            key_beep: config.buzzer.key_beep,
            pinmode: config.timeouts.pinmode_ms.map(Duration::from_millis),
            pinmode_until: None,
        };

        let status = panel.status_rx.borrow_and_update().clone();
        panel.apply_status(&status, now);
        info!(
            leds = panel.outputs.leds.led_count(),
            ready_option = %panel.ready.selected_option(),
            dynamic_mode = %panel.entry.dynamic_mode(),
            "Panel started"
        );
        Ok(panel)
    }

    /// Feed one serial byte.
    pub fn feed(&mut self, byte: u8, now: Instant) {
        if let Some(event) = self.decoder.feed(byte) {
            self.handle_event(&event, now);
        }
    }

    pub fn feed_bytes(&mut self, bytes: &[u8], now: Instant) {
        for &byte in bytes {
            self.feed(byte, now);
        }
    }

    /// Route one decoded event. Feedback it causes is applied before this
    /// returns.
    ///
    /// Key beeps and pin mode follow [`Event::is_key_activity`]. The idle
    /// polls the keypad sends as key frames (`A1 51`, `A1 FF`) decode to
    /// [`Event::Heartbeat`], so they stay silent and never extend pin mode,
    /// even though they arrive as key frames like any real key press.
    pub fn handle_event(&mut self, event: &Event, now: Instant) {
        self.outputs.now = now;

        if event.is_key_activity() {
            if self.key_beep {
                self.outputs.buzzer.key_beep(now);
            }
            if let Some(pinmode) = self.pinmode {
                if self.pinmode_until.is_none() {
                    debug!("Pin mode on");
                }
                self.pinmode_until = Some(now + pinmode);
                self.outputs.buzzer.set_pinmode_muted(true);
            }
        }

        match event {
            Event::Command(Command::ArmSelectIndicator(key)) => {
                let mode = key.map_or("none", |k| k.as_str());
                select_indicator(self.arm_select.as_mut(), mode, &mut self.outputs);
            }
            Event::Command(Command::ReaderMode(mode)) => {
                select_indicator(self.reader_mode.as_mut(), mode.as_str(), &mut self.outputs);
            }
            _ => self.entry.handle_event(event, now),
        }

        self.apply_feedback();
    }

    /// Advance every timer and push outputs to the hardware.
    pub fn tick(&mut self, now: Instant) {
        self.outputs.now = now;

        while let Some(notification) = self.link.try_next_notification() {
            self.handle_notification(&notification, now);
        }

        self.sync.tick(now);
        if self.status_rx.has_changed().unwrap_or(false) {
            let status = self.status_rx.borrow_and_update().clone();
            self.apply_status(&status, now);
        }

        self.entry.tick(now);
        self.apply_feedback();

        if let Some(until) = self.pinmode_until
            && now >= until
        {
            debug!("Pin mode off");
            self.pinmode_until = None;
            self.outputs.buzzer.set_pinmode_muted(false);
        }

        self.outputs.buzzer.tick(now);
        if let Err(e) = self.outputs.leds.render(now) {
            warn!(error = %e, "LED render failed");
        }
    }

    pub fn status(&self) -> AlarmStatus {
        self.sync.status()
    }

    pub fn is_ready(&self) -> bool {
        self.sync.is_ready()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<AlarmStatus> {
        self.sync.subscribe_status()
    }

    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.sync.subscribe_ready()
    }

    /// Change the armed mode whose readiness is shown and persist it.
    ///
    /// # Errors
    /// Returns a configuration error for an option that was not configured.
    pub fn select_ready(&mut self, option: &str, now: Instant) -> Result<bool> {
        let changed = self.ready.select(option, &mut *self.store)?;
        if changed {
            self.sync.set_selected(self.ready.selected(), now);
        }
        Ok(changed)
    }

    pub fn ready_selector(&self) -> &ReadySelector {
        &self.ready
    }

    /// Select what the dynamic arm-select key submits and persist it.
    ///
    /// Returns `false` when `mode` is already selected.
    pub fn select_dynamic_mode(&mut self, mode: DynamicMode) -> bool {
        if self.entry.dynamic_mode() == mode {
            return false;
        }
        self.entry.set_dynamic_mode(mode);
        info!(dynamic_mode = %mode, "Dynamic arm key selection changed");
        if let Err(e) = self.store.save(DYNAMIC_MODE_KEY, mode.as_str()) {
            warn!(error = %e, "Could not save dynamic arm key selection");
        }
        true
    }

    pub fn dynamic_mode(&self) -> DynamicMode {
        self.entry.dynamic_mode()
    }

    /// Mute or unmute buzzer patterns and persist the switch.
    pub fn set_tone_muted(&mut self, muted: bool) {
        self.outputs.buzzer.set_tone_muted(muted);
        save_flag(&mut *self.store, TONE_MUTED_KEY, muted);
    }

    /// Mute or unmute key beeps and persist the switch.
    pub fn set_beep_muted(&mut self, muted: bool) {
        self.outputs.buzzer.set_beep_muted(muted);
        save_flag(&mut *self.store, BEEP_MUTED_KEY, muted);
    }

    /// Switch the free-standing test mode machine.
    ///
    /// # Errors
    /// Returns `Error::UnknownMode` for an undeclared mode, or a
    /// configuration error when no test modes are configured.
    pub fn set_test_mode(&mut self, name: &str, now: Instant) -> Result<bool> {
        let Some(machine) = self.test_modes.as_mut() else {
            return Err(hexapad_core::Error::config("test_modes", "no test modes configured"));
        };
        self.outputs.now = now;
        machine.set_mode(name, &mut self.outputs)
    }

    pub fn test_mode(&self) -> Option<&str> {
        self.test_modes.as_ref().map(ModeMachine::current_mode)
    }

    pub fn arm_select_mode(&self) -> Option<&str> {
        self.arm_select.as_ref().map(ModeMachine::current_mode)
    }

    pub fn reader_mode(&self) -> Option<&str> {
        self.reader_mode.as_ref().map(ModeMachine::current_mode)
    }

    pub fn entry(&self) -> &PinEntry {
        &self.entry
    }

    pub fn leds(&self) -> &LedEngine {
        &self.outputs.leds
    }

    pub fn leds_mut(&mut self) -> &mut LedEngine {
        &mut self.outputs.leds
    }

    pub fn buzzer(&self) -> &Buzzer {
        &self.outputs.buzzer
    }

    pub fn buzzer_mut(&mut self) -> &mut Buzzer {
        &mut self.outputs.buzzer
    }

    pub fn decode_stats(&self) -> DecodeStats {
        self.decoder.stats()
    }

    fn handle_notification(&mut self, notification: &ControllerNotification, now: Instant) {
        self.sync.handle(notification, now);

        match notification {
            ControllerNotification::FailedArm { .. }
                if self.sync.status() == AlarmStatus::FailedOpenSensors =>
            {
                self.entry.start_lockout(now);
            }
            ControllerNotification::SensorsChanged { open: false } => self.entry.end_lockout(),
            _ => {}
        }
    }

    fn apply_status(&mut self, status: &AlarmStatus, now: Instant) {
        let Some(machine) = self.status_modes.as_mut() else {
            return;
        };
        let key = status.key();
        if !machine.has_mode(&key) {
            debug!(status = %status, "No reaction for status");
            return;
        }
        self.outputs.now = now;
        if let Err(e) = machine.enter(&key, &mut self.outputs) {
            warn!(error = %e, "Status reaction failed");
        }
    }

    fn apply_feedback(&mut self) {
        let feedback: Vec<EntryFeedback> = self.entry.drain_feedback().collect();
        for item in feedback {
            debug!(feedback = %item, "Entry feedback");
            match self.feedback.get_mut(item.key()) {
                Some(triggers) => {
                    for trigger in triggers {
                        trigger(&mut self.outputs);
                    }
                }
                None => {
                    if let Some(pattern) = default_pattern(&item) {
                        self.outputs.buzzer.start(pattern, self.outputs.now);
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("status", &self.sync.status())
            .field("ready", &self.sync.is_ready())
            .field("entry", &self.entry)
            .field("decoder", &self.decoder.state())
            .finish_non_exhaustive()
    }
}

fn build_entry(config: &PanelConfig, requester: ControllerRequester) -> Result<PinEntry> {
    let mut entry = PinEntry::new(
        &config.entry,
        Duration::from_millis(config.timeouts.incorrect_pin_ms),
        Duration::from_millis(config.timeouts.failed_open_sensors_ms),
    )?;

    for &mode in &config.entry.enabled_modes {
        let requester = requester.clone();
        entry = entry.on_mode(mode, move |request| {
            let request = match mode {
                AlarmMode::Disarm => ControllerRequest::Disarm {
                    raw_pin: request.raw_pin.clone(),
                },
                _ => ControllerRequest::Arm(request.clone()),
            };
            if let Err(e) = requester.request(request) {
                warn!(error = %e, "Controller request lost");
            }
        });
    }

    if config.entry.custom_action {
        entry = entry.on_custom_action(move |request| {
            if let Err(e) = requester.request(ControllerRequest::CustomAction(request.clone())) {
                warn!(error = %e, "Controller request lost");
            }
        });
    }
    Ok(entry)
}

fn build_modes(label: &str, config: Option<&ModeConfig>) -> Result<Option<ModeMachine<Outputs>>> {
    let Some(config) = config else {
        return Ok(None);
    };
    let mut builder = ModeMachine::builder(label);
    for decl in &config.modes {
        builder = builder.mode(&decl.name);
        for action in &decl.actions {
            builder = builder.boxed_trigger(&decl.name, compile_action(action));
        }
    }
    for action in &config.on_transition {
        builder = builder.boxed_on_transition(compile_action(action));
    }
    if let Some(initial) = &config.initial_mode {
        builder = builder.initial(initial);
    }
    builder.build().map(Some)
}

fn select_indicator(machine: Option<&mut ModeMachine<Outputs>>, mode: &str, outputs: &mut Outputs) {
    let Some(machine) = machine else {
        return;
    };
    if let Err(e) = machine.set_mode(mode, outputs) {
        debug!(machine = %machine.label(), error = %e, "Indicator mode ignored");
    }
}

fn compile_actions(actions: &[TriggerAction]) -> Vec<Trigger<Outputs>> {
    actions.iter().map(compile_action).collect()
}

/// Resolve one configured action into a trigger. Names were checked by
/// `PanelConfig::validate`, so failures here are only logged.
fn compile_action(action: &TriggerAction) -> Trigger<Outputs> {
    match action.clone() {
        TriggerAction::SetColor { group, color } => Box::new(move |out: &mut Outputs| {
            if let Err(e) = out.leds.set_group_color(&group, color) {
                warn!(error = %e, "set_color failed");
            }
        }),
        TriggerAction::SetOutput { output, value } => Box::new(move |out: &mut Outputs| {
            if let Err(e) = out.leds.set_output(&output, value) {
                warn!(error = %e, "set_output failed");
            }
        }),
        TriggerAction::Flash {
            group,
            color,
            duration_ms,
        } => Box::new(move |out: &mut Outputs| {
            let duration = Duration::from_millis(duration_ms);
            if let Err(e) = out.leds.flash(&group, color, duration, out.now) {
                warn!(error = %e, "flash failed");
            }
        }),
        TriggerAction::Beep { pattern } => {
            Box::new(move |out: &mut Outputs| out.buzzer.start(pattern, out.now))
        }
        TriggerAction::StopBuzzer => Box::new(|out: &mut Outputs| out.buzzer.stop()),
        TriggerAction::SetBrightness { value } => {
            Box::new(move |out: &mut Outputs| out.leds.set_global_brightness(value))
        }
        TriggerAction::SetGamma { enabled } => {
            Box::new(move |out: &mut Outputs| out.leds.set_gamma_enabled(enabled))
        }
        TriggerAction::Log { message } => Box::new(move |_: &mut Outputs| info!("{message}")),
    }
}

/// Buzzer pattern played for feedback that has no configured reaction.
fn default_pattern(feedback: &EntryFeedback) -> Option<BuzzerPattern> {
    let pattern = match feedback {
        EntryFeedback::Accepted(_) => BuzzerPattern {
            beeps: 1,
            beep_length_ms: 100,
            ..BuzzerPattern::default()
        },
        EntryFeedback::Rejected(_)
        | EntryFeedback::Timeout
        | EntryFeedback::ConfigurationError(_) => BuzzerPattern {
            beeps: 3,
            beep_length_ms: 100,
            short_pause_ms: 100,
            ..BuzzerPattern::default()
        },
        EntryFeedback::Suppressed | EntryFeedback::LockoutStarted => BuzzerPattern {
            beeps: 2,
            beep_length_ms: 400,
            short_pause_ms: 200,
            ..BuzzerPattern::default()
        },
        EntryFeedback::LockoutEnded => return None,
    };
    Some(pattern)
}

fn load_flag(store: &dyn PreferenceStore, key: &str, default: bool) -> bool {
    match store.load(key) {
        Ok(Some(value)) => match value.trim() {
            "true" => true,
            "false" => false,
            other => {
                warn!(key, value = other, "Stored switch is not a boolean");
                default
            }
        },
        Ok(None) => default,
        Err(e) => {
            warn!(key, error = %e, "Could not read stored switch");
            default
        }
    }
}

fn load_dynamic_mode(store: &dyn PreferenceStore, default: DynamicMode) -> DynamicMode {
    match store.load(DYNAMIC_MODE_KEY) {
        Ok(Some(value)) => value.parse().unwrap_or_else(|_| {
            warn!(value = %value, "Stored dynamic arm key selection is not a mode");
            default
        }),
        Ok(None) => default,
        Err(e) => {
            warn!(error = %e, "Could not read stored dynamic arm key selection");
            default
        }
    }
}

fn save_flag(store: &mut dyn PreferenceStore, key: &str, value: bool) {
    if let Err(e) = store.save(key, if value { "true" } else { "false" }) {
        warn!(key, error = %e, "Could not save switch");
    }
}

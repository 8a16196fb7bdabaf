//! Alarm state synchronizer.
//!
//! Owns the single current [`AlarmStatus`] and the "ready" flag. Both are
//! published through `tokio::sync::watch` channels, so any number of readers
//! (the panel's reactions, a status display, tests) see the latest value
//! without holding a reference to the synchronizer. A value is only sent
//! when it actually changes.
//!
//! # Status resolution
//!
//! 1. Link down or no notification within the grace period:
//!    `connection_timed_out`.
//! 2. Raw controller state, refined with attributes for the Alarmo
//!    integration (`arming` becomes `arming_home`, `armed_away` becomes
//!    `armed_away_bypass`, ...).
//! 3. A failed arm attempt temporarily overrides the result with
//!    `incorrect_pin` or `failed_open_sensors`.
//!
//! # Readiness
//!
//! `ready = link ok && !sensors_open && flag(selected mode)`, where flags
//! the controller never reported count as ready.

use hexapad_core::{
    AlarmStatus, ArmedMode,
    config::{Integration, PanelConfig},
};
use hexapad_hardware::{Attribute, ControllerNotification, ReadinessFlags};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone)]
struct Attributes {
    arm_mode: Option<ArmedMode>,
    next_state: Option<ArmedMode>,
    bypassed: bool,
}

#[derive(Debug)]
pub struct AlarmStateSync {
    integration: Integration,
    grace: Duration,
    incorrect_pin_timeout: Duration,
    failed_open_sensors_timeout: Duration,

    raw_state: String,
    attributes: Attributes,
    sensors_open: bool,
    link_up: bool,
    readiness: ReadinessFlags,
    selected: ArmedMode,
    last_seen: Instant,
    timed_out: bool,
    status_override: Option<(AlarmStatus, Instant)>,

    status: watch::Sender<AlarmStatus>,
    ready: watch::Sender<bool>,
}

impl AlarmStateSync {
    /// Start with no controller state: `connection_timed_out`, not ready.
    /// The grace period runs from `now`.
    pub fn new(config: &PanelConfig, selected: ArmedMode, now: Instant) -> Self {
        let (status, _) = watch::channel(AlarmStatus::ConnectionTimedOut);
        let (ready, _) = watch::channel(false);
        Self {
            integration: config.status.integration,
            grace: Duration::from_millis(config.timeouts.connection_grace_ms),
            incorrect_pin_timeout: Duration::from_millis(config.timeouts.incorrect_pin_ms),
            failed_open_sensors_timeout: Duration::from_millis(
                config.timeouts.failed_open_sensors_ms,
            ),
            raw_state: String::new(),
            attributes: Attributes::default(),
            sensors_open: false,
            link_up: true,
            readiness: ReadinessFlags::default(),
            selected,
            last_seen: now,
            timed_out: false,
            status_override: None,
            status,
            ready,
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<AlarmStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    pub fn status(&self) -> AlarmStatus {
        self.status.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn sensors_open(&self) -> bool {
        self.sensors_open
    }

    /// Returns `true` while the link is up and notifications keep arriving.
    pub fn link_ok(&self) -> bool {
        self.link_up && !self.timed_out
    }

    /// Apply one controller notification.
    pub fn handle(&mut self, notification: &ControllerNotification, now: Instant) {
        self.last_seen = now;
        if self.timed_out {
            info!("Controller notifications resumed");
            self.timed_out = false;
        }

        match notification {
            ControllerNotification::State { state } => {
                debug!(state = %state, "Controller state");
                self.raw_state = state.trim().to_string();
            }
            ControllerNotification::Attribute { name, value } => {
                self.apply_attribute(*name, value);
            }
            ControllerNotification::SensorsChanged { open } => {
                debug!(open, "Sensors changed");
                self.sensors_open = *open;
            }
            ControllerNotification::FailedArm { reason } => {
                self.apply_failed_arm(reason, now);
            }
            ControllerNotification::ReadyUpdate(flags) => {
                self.readiness = *flags;
            }
            ControllerNotification::LinkChanged { connected } => {
                if self.link_up != *connected {
                    info!(connected, "Controller link changed");
                    self.link_up = *connected;
                    if !*connected {
                        self.status_override = None;
                    }
                }
            }
            ControllerNotification::Heartbeat => {}
        }

        self.publish(now);
    }

    /// Change the mode whose readiness is reported.
    pub fn set_selected(&mut self, mode: ArmedMode, now: Instant) {
        self.selected = mode;
        self.publish(now);
    }

    /// Expire the grace period and status overrides.
    pub fn tick(&mut self, now: Instant) {
        if !self.timed_out && now.saturating_duration_since(self.last_seen) >= self.grace {
            warn!(
                grace_ms = self.grace.as_millis() as u64,
                "No controller notification within grace period"
            );
            self.timed_out = true;
        }
        if let Some((_, until)) = &self.status_override
            && now >= *until
        {
            debug!("Status override expired");
            self.status_override = None;
        }
        self.publish(now);
    }

    fn apply_attribute(&mut self, name: Attribute, value: &str) {
        let value = value.trim();
        match name {
            Attribute::ArmMode => self.attributes.arm_mode = parse_mode_attribute(value),
            Attribute::NextState => self.attributes.next_state = parse_mode_attribute(value),
            Attribute::BypassedSensors => self.attributes.bypassed = is_non_empty_list(value),
        }
        debug!(attribute = ?name, value, "Controller attribute");
    }

    fn apply_failed_arm(&mut self, reason: &str, now: Instant) {
        if !self.link_up || self.base_status().is_connection_timed_out() {
            debug!(reason, "Failed arm ignored while the controller is unreachable");
            return;
        }
        let reason = reason.trim().to_ascii_lowercase();
        let (status, timeout) = match reason.as_str() {
            "invalid_code" | "not_allowed" => (AlarmStatus::IncorrectPin, self.incorrect_pin_timeout),
            "open_sensors" => (AlarmStatus::FailedOpenSensors, self.failed_open_sensors_timeout),
            other => {
                debug!(reason = other, "Failed arm reason without override");
                return;
            }
        };
        info!(reason = %reason, status = %status, "Arm attempt failed");
        self.status_override = Some((status, now + timeout));
    }

    fn base_status(&self) -> AlarmStatus {
        let status = AlarmStatus::parse(&self.raw_state);
        if self.integration != Integration::Alarmo {
            return status;
        }
        let attrs = &self.attributes;
        match status {
            AlarmStatus::Arming(None) => AlarmStatus::Arming(attrs.arm_mode),
            AlarmStatus::Pending(None) => AlarmStatus::Pending(attrs.arm_mode.or(attrs.next_state)),
            AlarmStatus::Armed { mode, .. } => AlarmStatus::Armed {
                mode,
                bypassed: attrs.bypassed,
            },
            other => other,
        }
    }

    fn compute_status(&self, now: Instant) -> AlarmStatus {
        if !self.link_ok() {
            return AlarmStatus::ConnectionTimedOut;
        }
        let base = self.base_status();
        if base.is_connection_timed_out() {
            return base;
        }
        match &self.status_override {
            Some((status, until)) if now < *until => status.clone(),
            _ => base,
        }
    }

    fn compute_ready(&self) -> bool {
        self.link_ok()
            && !self.base_status().is_connection_timed_out()
            && !self.sensors_open
            && self.readiness.is_ready(self.selected)
    }

    fn publish(&mut self, now: Instant) {
        let status = self.compute_status(now);
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            info!(from = %current, to = %status, "Alarm status changed");
            *current = status;
            true
        });

        let ready = self.compute_ready();
        self.ready.send_if_modified(|current| {
            if *current == ready {
                return false;
            }
            debug!(ready, "Ready changed");
            *current = ready;
            true
        });
    }
}

fn parse_mode_attribute(value: &str) -> Option<ArmedMode> {
    match value.to_ascii_lowercase().as_str() {
        "" | "null" | "none" => None,
        other => ArmedMode::from_armed_state(other),
    }
}

/// Attribute values like `[]`, `{}`, `null` or an empty string mean "no
/// bypassed sensors".
fn is_non_empty_list(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "null" | "none" | "[]" | "{}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sync(integration: Integration) -> (AlarmStateSync, Instant) {
        let mut config = PanelConfig::default();
        config.status.integration = integration;
        let now = Instant::now();
        (AlarmStateSync::new(&config, ArmedMode::Away, now), now)
    }

    fn state(s: &str) -> ControllerNotification {
        ControllerNotification::State {
            state: s.to_string(),
        }
    }

    fn attribute(name: Attribute, value: &str) -> ControllerNotification {
        ControllerNotification::Attribute {
            name,
            value: value.to_string(),
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_starts_timed_out() {
        let (sync, _) = sync(Integration::Generic);
        assert_eq!(sync.status(), AlarmStatus::ConnectionTimedOut);
        assert!(!sync.is_ready());
    }

    #[rstest]
    #[case("disarmed", "disarmed")]
    #[case("ARMED_HOME", "armed_home")]
    #[case("unavailable", "connection_timed_out")]
    #[case("unknown", "connection_timed_out")]
    #[case("maintenance", "unknown")]
    fn test_generic_states(#[case] raw: &str, #[case] key: &str) {
        let (mut sync, now) = sync(Integration::Generic);
        sync.handle(&state(raw), now);
        assert_eq!(sync.status().key(), key);
    }

    #[test]
    fn test_unknown_state_keeps_raw_text() {
        let (mut sync, now) = sync(Integration::Generic);
        sync.handle(&state("Maintenance"), now);
        assert_eq!(sync.status(), AlarmStatus::Unknown("Maintenance".to_string()));
    }

    #[test]
    fn test_grace_period_and_recovery() {
        let (mut sync, t0) = sync(Integration::Generic);
        sync.handle(&state("disarmed"), t0);
        assert_eq!(sync.status(), AlarmStatus::Disarmed);

        sync.tick(t0 + secs(59));
        assert_eq!(sync.status(), AlarmStatus::Disarmed);

        sync.tick(t0 + secs(60));
        assert_eq!(sync.status(), AlarmStatus::ConnectionTimedOut);
        assert!(!sync.is_ready());

        sync.handle(&ControllerNotification::Heartbeat, t0 + secs(61));
        assert_eq!(sync.status(), AlarmStatus::Disarmed);
        assert!(sync.is_ready());
    }

    #[rstest]
    #[case("arming", Attribute::ArmMode, "armed_home", "arming_home")]
    #[case("arming", Attribute::ArmMode, "armed_custom_bypass", "arming_custom")]
    #[case("pending", Attribute::NextState, "armed_night", "pending_night")]
    #[case("armed_away", Attribute::BypassedSensors, "['binary_sensor.door']", "armed_away_bypass")]
    #[case("armed_away", Attribute::BypassedSensors, "[]", "armed_away")]
    #[case("armed_custom_bypass", Attribute::BypassedSensors, "null", "armed_custom")]
    fn test_alarmo_refinement(
        #[case] raw: &str,
        #[case] name: Attribute,
        #[case] value: &str,
        #[case] key: &str,
    ) {
        let (mut sync, now) = sync(Integration::Alarmo);
        sync.handle(&attribute(name, value), now);
        sync.handle(&state(raw), now);
        assert_eq!(sync.status().key(), key);
    }

    #[test]
    fn test_generic_ignores_attributes() {
        let (mut sync, now) = sync(Integration::Generic);
        sync.handle(&attribute(Attribute::ArmMode, "armed_home"), now);
        sync.handle(&state("arming"), now);
        assert_eq!(sync.status(), AlarmStatus::Arming(None));
    }

    #[test]
    fn test_failed_arm_override_expires() {
        let (mut sync, t0) = sync(Integration::Generic);
        sync.handle(&state("disarmed"), t0);
        sync.handle(
            &ControllerNotification::FailedArm {
                reason: "invalid_code".to_string(),
            },
            t0,
        );
        assert_eq!(sync.status(), AlarmStatus::IncorrectPin);

        sync.tick(t0 + secs(5));
        assert_eq!(sync.status(), AlarmStatus::Disarmed);
    }

    #[test]
    fn test_failed_arm_ignored_while_unreachable() {
        let (mut sync, t0) = sync(Integration::Generic);
        sync.handle(
            &ControllerNotification::FailedArm {
                reason: "open_sensors".to_string(),
            },
            t0,
        );
        sync.handle(&state("disarmed"), t0);
        assert_eq!(sync.status(), AlarmStatus::Disarmed);
    }

    #[test]
    fn test_link_drop_clears_override() {
        let (mut sync, t0) = sync(Integration::Generic);
        sync.handle(&state("disarmed"), t0);
        sync.handle(
            &ControllerNotification::FailedArm {
                reason: "open_sensors".to_string(),
            },
            t0,
        );
        assert_eq!(sync.status(), AlarmStatus::FailedOpenSensors);

        sync.handle(&ControllerNotification::LinkChanged { connected: false }, t0);
        assert_eq!(sync.status(), AlarmStatus::ConnectionTimedOut);

        sync.handle(&ControllerNotification::LinkChanged { connected: true }, t0);
        assert_eq!(sync.status(), AlarmStatus::Disarmed);
    }

    #[test]
    fn test_ready_follows_sensors_and_flags() {
        let (mut sync, now) = sync(Integration::Generic);
        sync.handle(&state("disarmed"), now);
        assert!(sync.is_ready());

        sync.handle(&ControllerNotification::SensorsChanged { open: true }, now);
        assert!(!sync.is_ready());
        sync.handle(&ControllerNotification::SensorsChanged { open: false }, now);
        assert!(sync.is_ready());

        sync.handle(
            &ControllerNotification::ReadyUpdate(ReadinessFlags {
                armed_home: Some(false),
                ..ReadinessFlags::default()
            }),
            now,
        );
        assert!(sync.is_ready());
        sync.set_selected(ArmedMode::Home, now);
        assert!(!sync.is_ready());
    }

    #[tokio::test]
    async fn test_watch_publishes_only_changes() {
        let (mut sync, now) = sync(Integration::Generic);
        let mut status = sync.subscribe_status();

        sync.handle(&state("disarmed"), now);
        assert!(status.has_changed().unwrap());
        assert_eq!(*status.borrow_and_update(), AlarmStatus::Disarmed);

        sync.handle(&state("disarmed"), now);
        sync.handle(&ControllerNotification::Heartbeat, now);
        assert!(!status.has_changed().unwrap());

        sync.handle(&state("triggered"), now);
        status.changed().await.unwrap();
        assert_eq!(*status.borrow(), AlarmStatus::Triggered);
    }
}

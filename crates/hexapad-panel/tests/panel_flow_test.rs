//! End-to-end flows through the panel: serial bytes in, controller requests
//! and device writes out.

use hexapad_core::{AlarmMode, AlarmStatus, DynamicMode, config::PanelConfig};
use hexapad_hardware::mock::{
    MemoryPreferences, MockLedStrip, MockLedStripHandle, MockTone, MockToneHandle,
};
use hexapad_hardware::{ControllerHandle, ControllerLink, ControllerNotification, ControllerRequest};
use hexapad_panel::{
    BuzzerState, Panel, PanelDevices, panel::DYNAMIC_MODE_KEY, ready::READY_SELECTION_KEY,
};
use hexapad_protocol::key::digit_to_code;
use proptest::prelude::*;
use std::time::{Duration, Instant};

struct Rig {
    panel: Panel,
    controller: ControllerHandle,
    strip: MockLedStripHandle,
    tone: MockToneHandle,
    store: MemoryPreferences,
    t0: Instant,
}

fn rig(json: &str) -> Rig {
    let config: PanelConfig = serde_json::from_str(json).unwrap();
    let (strip, strip_handle) = MockLedStrip::new(config.strip.led_count);
    let (tone, tone_handle) = MockTone::new();
    let store = MemoryPreferences::new();
    let devices = PanelDevices {
        strip: Box::new(strip),
        tone: Box::new(tone),
        store: Box::new(store.clone()),
    };
    let (link, controller) = ControllerLink::pair();
    let t0 = Instant::now();
    let panel = Panel::new(&config, devices, link, t0).unwrap();
    Rig {
        panel,
        controller,
        strip: strip_handle,
        tone: tone_handle,
        store,
        t0,
    }
}

/// Single key press frames for `keys` (digits, `#` and `*`).
fn key_frames(keys: &str) -> Vec<u8> {
    keys.chars()
        .flat_map(|c| {
            let code = match c {
                '#' => 0x23,
                '*' => 0x2A,
                d => digit_to_code(d.to_digit(10).unwrap() as u8).unwrap(),
            };
            [0xA1, code]
        })
        .collect()
}

fn notify(rig: &Rig, notification: ControllerNotification) {
    rig.controller.notify(notification).unwrap();
}

fn state(raw: &str) -> ControllerNotification {
    ControllerNotification::State {
        state: raw.to_string(),
    }
}

const STRIP_JSON: &str = r#"{
    "strip": {
        "led_count": 10,
        "groups": [{ "name": "front", "leds": [0, 1, 2], "max_brightness": 0.5 }]
    },
    "status": {
        "reactions": {
            "disarmed": [{ "action": "set_color", "group": "front", "color": { "red": 1.0 } }],
            "connection_timed_out": [{ "action": "set_color", "group": "front", "color": { "blue": 1.0 } }]
        }
    }
}"#;

#[test]
fn test_forced_entry_from_key_frames() {
    let mut rig = rig("{}");

    rig.panel.feed_bytes(&key_frames("9991234#"), rig.t0);

    let requests = rig.controller.drain_requests();
    assert_eq!(requests.len(), 1);
    match &requests[0] {
        ControllerRequest::Arm(request) => {
            assert_eq!(request.mode, AlarmMode::Away);
            assert!(request.forced);
            assert!(!request.skip_delay);
            assert_eq!(request.raw_pin, "1234");
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_entry_frame_dispatches_with_its_arm_key() {
    let mut rig = rig("{}");
    // prefix 998, arm-select home, PIN 4321, remaining slots filled
    let mut frame = vec![0xA0, 0x27, 0x27, 0x22, 0x42, 0x11, 0x0F, 0x0A, 0x05];
    frame.resize(21, 0xFF);

    rig.panel.feed_bytes(&frame, rig.t0);

    match rig.controller.try_recv_request() {
        Some(ControllerRequest::Arm(request)) => {
            assert_eq!(request.mode, AlarmMode::Home);
            assert!(request.skip_delay);
            assert!(!request.forced);
            assert_eq!(request.raw_pin, "4321");
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_dynamic_key_selection_switches_target() {
    let mut rig = rig(r#"{ "entry": { "custom_action": true } }"#);
    let t0 = rig.t0;
    // PIN 1234 followed by the dynamic arm-select key
    let mut frames = key_frames("1234");
    frames.extend([0xA1, 0x44]);

    rig.panel.feed_bytes(&frames, t0);
    assert!(rig.panel.select_dynamic_mode(DynamicMode::Action));
    assert!(!rig.panel.select_dynamic_mode(DynamicMode::Action));
    rig.panel.feed_bytes(&frames, t0);

    match rig.controller.drain_requests().as_slice() {
        [ControllerRequest::Arm(first), ControllerRequest::CustomAction(second)] => {
            assert_eq!(first.mode, AlarmMode::Night);
            assert_eq!(first.raw_pin, "1234");
            assert_eq!(second.pin, "1234");
        }
        other => panic!("unexpected requests: {other:?}"),
    }
    assert_eq!(rig.store.get(DYNAMIC_MODE_KEY).as_deref(), Some("action"));
}

#[test]
fn test_timeout_plays_feedback_without_request() {
    let mut rig = rig(r#"{ "buzzer": { "key_beep": false } }"#);

    rig.panel.feed_bytes(&key_frames("12"), rig.t0);
    rig.panel.tick(rig.t0 + Duration::from_millis(4_999));
    assert_eq!(rig.panel.buzzer().state(), BuzzerState::Idle);

    rig.panel.tick(rig.t0 + Duration::from_secs(5));
    assert_eq!(rig.panel.buzzer().state(), BuzzerState::Beeping(1));
    assert_eq!(rig.tone.level(), 128);
    assert_eq!(rig.panel.entry().buffered_len(), 0);
    assert!(rig.controller.drain_requests().is_empty());
}

#[test]
fn test_status_reaction_lights_group_at_half_brightness() {
    let mut rig = rig(STRIP_JSON);

    rig.panel.tick(rig.t0);
    assert_eq!(rig.strip.pixel(0), Some([0, 0, 128]));

    notify(&rig, state("disarmed"));
    rig.panel.tick(rig.t0 + Duration::from_millis(10));

    assert_eq!(rig.panel.status(), AlarmStatus::Disarmed);
    for i in 0..3 {
        assert_eq!(rig.strip.pixel(i), Some([128, 0, 0]));
    }
    for i in 3..10 {
        assert_eq!(rig.strip.pixel(i), Some([0, 0, 0]));
    }
}

#[test]
fn test_unchanged_frame_is_not_rewritten() {
    let mut rig = rig(STRIP_JSON);

    rig.panel.tick(rig.t0);
    rig.panel.tick(rig.t0 + Duration::from_millis(10));
    rig.panel.tick(rig.t0 + Duration::from_millis(20));

    assert_eq!(rig.strip.write_count(), 1);
    assert_eq!(rig.panel.leds().write_count(), 1);
}

#[test]
fn test_connection_timeout_and_recovery() {
    let mut rig = rig(STRIP_JSON);
    let t0 = rig.t0;

    notify(&rig, state("disarmed"));
    rig.panel.tick(t0);
    assert_eq!(rig.panel.status(), AlarmStatus::Disarmed);

    rig.panel.tick(t0 + Duration::from_millis(59_999));
    assert_eq!(rig.panel.status(), AlarmStatus::Disarmed);

    rig.panel.tick(t0 + Duration::from_secs(60));
    assert_eq!(rig.panel.status(), AlarmStatus::ConnectionTimedOut);
    assert_eq!(rig.strip.pixel(0), Some([0, 0, 128]));

    notify(&rig, ControllerNotification::Heartbeat);
    rig.panel.tick(t0 + Duration::from_secs(61));
    assert_eq!(rig.panel.status(), AlarmStatus::Disarmed);
    assert_eq!(rig.strip.pixel(0), Some([128, 0, 0]));
}

#[test]
fn test_status_alias_reaction_fires() {
    let json = STRIP_JSON.replace("\"connection_timed_out\"", "\"Connection_Timeout\"");
    let mut rig = rig(&json);
    let t0 = rig.t0;

    rig.panel.tick(t0);
    assert_eq!(rig.strip.pixel(0), Some([0, 0, 128]));

    notify(&rig, state("disarmed"));
    rig.panel.tick(t0 + Duration::from_millis(10));
    assert_eq!(rig.strip.pixel(0), Some([128, 0, 0]));

    rig.panel.tick(t0 + Duration::from_secs(61));
    assert_eq!(rig.panel.status(), AlarmStatus::ConnectionTimedOut);
    assert_eq!(rig.strip.pixel(0), Some([0, 0, 128]));
}

#[test]
fn test_open_sensors_lockout_suppresses_arming() {
    let mut rig = rig("{}");
    let t0 = rig.t0;

    notify(&rig, state("disarmed"));
    notify(
        &rig,
        ControllerNotification::FailedArm {
            reason: "open_sensors".to_string(),
        },
    );
    rig.panel.tick(t0);
    assert_eq!(rig.panel.status(), AlarmStatus::FailedOpenSensors);
    assert!(rig.panel.entry().is_locked_out());

    rig.panel.feed_bytes(&key_frames("1234#"), t0);
    assert!(rig.controller.drain_requests().is_empty());

    // Disarm is never suppressed
    let mut bytes = key_frames("1234");
    bytes.extend([0xA1, 0x43]);
    rig.panel.feed_bytes(&bytes, t0);
    assert!(matches!(
        rig.controller.drain_requests().as_slice(),
        [ControllerRequest::Disarm { .. }]
    ));

    notify(&rig, ControllerNotification::SensorsChanged { open: false });
    rig.panel.tick(t0 + Duration::from_secs(1));
    assert!(!rig.panel.entry().is_locked_out());

    rig.panel.feed_bytes(&key_frames("1234#"), t0 + Duration::from_secs(1));
    assert!(matches!(
        rig.controller.drain_requests().as_slice(),
        [ControllerRequest::Arm(_)]
    ));
}

#[test]
fn test_test_modes_fire_triggers_in_order() {
    let mut rig = rig(
        r#"{
        "strip": { "led_count": 3, "groups": [{ "name": "all", "leds": [0, 1, 2] }] },
        "test_modes": {
            "modes": [
                { "name": "mode1" },
                { "name": "mode2", "actions": [
                    { "action": "set_color", "group": "all", "color": { "red": 1.0 } },
                    { "action": "set_color", "group": "all", "color": { "green": 1.0 } }
                ] }
            ]
        }
    }"#,
    );

    assert_eq!(rig.panel.test_mode(), Some("mode1"));
    assert!(rig.panel.set_test_mode("Mode2", rig.t0).unwrap());
    assert!(!rig.panel.set_test_mode("mode2", rig.t0).unwrap());
    assert!(rig.panel.set_test_mode("mode3", rig.t0).is_err());

    rig.panel.tick(rig.t0);
    assert_eq!(rig.panel.test_mode(), Some("mode2"));
    assert_eq!(rig.strip.pixel(1), Some([0, 255, 0]));
}

#[test]
fn test_indicator_frames_select_modes() {
    let mut rig = rig(
        r#"{
        "indicators": {
            "arm_select": { "modes": [
                { "name": "none" }, { "name": "away" }, { "name": "home" },
                { "name": "disarm" }, { "name": "dynamic" }
            ] }
        }
    }"#,
    );

    rig.panel.feed_bytes(&[0xA3, 0x42], rig.t0);
    assert_eq!(rig.panel.arm_select_mode(), Some("home"));

    rig.panel.feed_bytes(&[0xA3, 0xFF], rig.t0);
    assert_eq!(rig.panel.arm_select_mode(), Some("none"));

    // Reader mode frames are ignored without a reader mode machine
    rig.panel.feed_bytes(&[0xA4, 0x30], rig.t0);
    assert_eq!(rig.panel.reader_mode(), None);
    assert!(rig.controller.drain_requests().is_empty());
}

#[test]
fn test_ready_follows_selected_option() {
    let mut rig = rig("{}");
    let t0 = rig.t0;
    let ready = rig.panel.subscribe_ready();
    assert!(!*ready.borrow());

    notify(&rig, state("disarmed"));
    notify(
        &rig,
        ControllerNotification::ReadyUpdate(hexapad_hardware::ReadinessFlags {
            armed_home: Some(false),
            ..Default::default()
        }),
    );
    rig.panel.tick(t0);
    assert!(rig.panel.is_ready());

    assert!(rig.panel.select_ready("armed_home", t0).unwrap());
    assert!(!rig.panel.is_ready());
    assert!(!*ready.borrow());
    assert_eq!(rig.store.get(READY_SELECTION_KEY).as_deref(), Some("armed_home"));

    notify(&rig, ControllerNotification::SensorsChanged { open: true });
    rig.panel.select_ready("armed_away", t0).unwrap();
    rig.panel.tick(t0);
    assert!(!rig.panel.is_ready());
}

#[test]
fn test_key_beep_and_pin_mode() {
    let mut rig = rig(r#"{ "timeouts": { "pinmode_ms": 1000 } }"#);
    let t0 = rig.t0;

    rig.panel.feed_bytes(&key_frames("1"), t0);
    assert!(rig.panel.buzzer().pinmode_muted());
    assert_eq!(rig.tone.level(), 0);

    // Idle polls are not key activity
    rig.panel.feed_bytes(&[0xA1, 0x51], t0 + Duration::from_millis(900));
    rig.panel.tick(t0 + Duration::from_millis(1_000));
    assert!(!rig.panel.buzzer().pinmode_muted());
}

#[test]
fn test_key_beep_sounds_and_expires() {
    let mut rig = rig("{}");
    let t0 = rig.t0;

    rig.panel.feed_bytes(&key_frames("5"), t0);
    assert_eq!(rig.tone.level(), 255);

    rig.panel.tick(t0 + Duration::from_millis(50));
    assert_eq!(rig.tone.level(), 0);
}

#[test]
fn test_idle_polls_stay_silent() {
    let mut rig = rig(r#"{ "timeouts": { "pinmode_ms": 1000 } }"#);

    rig.panel.feed_bytes(&[0xA1, 0x51, 0xA1, 0xFF], rig.t0);

    assert_eq!(rig.panel.decode_stats().frames, 2);
    assert_eq!(rig.tone.on_count(), 0);
    assert!(!rig.panel.buzzer().pinmode_muted());
}

#[test]
fn test_garbage_bytes_do_not_break_entry() {
    let mut rig = rig("{}");

    let mut bytes = vec![0x13, 0x37, 0x42, 0xFF];
    bytes.extend(key_frames("1234#"));
    rig.panel.feed_bytes(&bytes, rig.t0);

    assert!(rig.panel.decode_stats().errors > 0);
    assert!(matches!(
        rig.controller.drain_requests().as_slice(),
        [ControllerRequest::Arm(request)] if request.raw_pin == "1234"
    ));
}

proptest! {
    #[test]
    fn prop_prefixes_never_leak_into_pin(
        force in any::<bool>(),
        skip in any::<bool>(),
        skip_first in any::<bool>(),
        pin in "[0-8][0-9]{0,9}",
    ) {
        let mut rig = rig("{}");
        let mut typed = String::new();
        let prefixes = match (force, skip, skip_first) {
            (true, true, true) => vec!["998", "999"],
            (true, true, false) => vec!["999", "998"],
            (true, false, _) => vec!["999"],
            (false, true, _) => vec!["998"],
            (false, false, _) => vec![],
        };
        for prefix in prefixes {
            typed.push_str(prefix);
        }
        typed.push_str(&pin);
        typed.push('#');

        rig.panel.feed_bytes(&key_frames(&typed), rig.t0);

        let requests = rig.controller.drain_requests();
        prop_assert_eq!(requests.len(), 1);
        match &requests[0] {
            ControllerRequest::Arm(request) => {
                prop_assert_eq!(request.forced, force);
                prop_assert_eq!(request.skip_delay, skip);
                prop_assert_eq!(&request.raw_pin, &pin);
            }
            other => prop_assert!(false, "unexpected request: {:?}", other),
        }
    }
}

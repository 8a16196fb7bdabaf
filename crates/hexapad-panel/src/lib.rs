//! Keypad bridge logic.
//!
//! Everything between the serial byte stream and the output devices:
//!
//! - [`pin_entry`]: PIN entry, prefixes, lockout and dispatch.
//! - [`sync`]: current alarm status and readiness from controller
//!   notifications.
//! - [`ready`]: armed mode whose readiness is shown, persisted.
//! - [`led`]: LED groups rendered onto a strip.
//! - [`buzzer`]: non-blocking beep patterns and key beeps.
//! - [`modes`]: named-mode machines with trigger lists.
//! - [`panel`]: the [`Panel`] facade that wires all of the above and is
//!   driven by `feed` and `tick`.
//!
//! # Example
//!
//! ```
//! use hexapad_core::config::PanelConfig;
//! use hexapad_hardware::{ControllerLink, ControllerRequest};
//! use hexapad_hardware::mock::{MemoryPreferences, MockLedStrip, MockTone};
//! use hexapad_panel::{Panel, PanelDevices};
//! use std::time::Instant;
//!
//! let (strip, _) = MockLedStrip::new(0);
//! let (tone, _) = MockTone::new();
//! let devices = PanelDevices {
//!     strip: Box::new(strip),
//!     tone: Box::new(tone),
//!     store: Box::new(MemoryPreferences::new()),
//! };
//! let (link, mut controller) = ControllerLink::pair();
//! let now = Instant::now();
//! let mut panel = Panel::new(&PanelConfig::default(), devices, link, now).unwrap();
//!
//! // "1234#" typed key by key.
//! panel.feed_bytes(&[0xA1, 0x05, 0xA1, 0x0A, 0xA1, 0x0F, 0xA1, 0x11, 0xA1, 0x23], now);
//!
//! match controller.try_recv_request() {
//!     Some(ControllerRequest::Arm(request)) => assert_eq!(request.raw_pin, "1234"),
//!     other => panic!("unexpected request: {other:?}"),
//! }
//! ```

pub mod buzzer;
pub mod led;
pub mod modes;
pub mod panel;
pub mod pin_entry;
pub mod ready;
pub mod sync;

pub use buzzer::{Buzzer, BuzzerState};
pub use led::LedEngine;
pub use modes::{ModeMachine, ModeMachineBuilder, Trigger};
pub use panel::{Outputs, Panel, PanelDevices};
pub use pin_entry::{EntryFeedback, EntryState, PinEntry, RejectReason};
pub use ready::ReadySelector;
pub use sync::AlarmStateSync;

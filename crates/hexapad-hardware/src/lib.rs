//! Device seams for the hexapad keypad bridge.
//!
//! The panel logic in `hexapad-panel` never touches hardware directly. It
//! drives three output traits and talks to the alarm controller through a
//! channel pair:
//!
//! - [`LedDriver`]: addressable RGB strip, one full frame per write.
//! - [`ToneOutput`]: buzzer level, 0 is silent.
//! - [`PreferenceStore`]: persisted settings (ready selection, mute switches).
//! - [`ControllerLink`]: fire-and-forget requests out, notifications in.
//!
//! # Implementations
//!
//! - [`mock`]: recording devices with inspection handles, for tests.
//! - [`trace`]: devices that only log, for replaying captures.
//! - [`JsonFilePreferences`]: preferences kept in a JSON file.
//!
//! # Example
//!
//! ```
//! use hexapad_hardware::mock::MockLedStrip;
//! use hexapad_hardware::LedDriver;
//!
//! fn clear<D: LedDriver>(driver: &mut D) -> hexapad_hardware::Result<()> {
//!     let frame = vec![[0, 0, 0]; driver.led_count()];
//!     driver.write(&frame)
//! }
//!
//! let (mut strip, handle) = MockLedStrip::new(4);
//! clear(&mut strip).unwrap();
//! assert_eq!(handle.pixel(3), Some([0, 0, 0]));
//! ```
//!
//! # Error Handling
//!
//! Every fallible operation returns [`Result<T>`][error::Result] with a
//! [`HardwareError`]. The panel converts these into `hexapad_core::Error`
//! and logs them; a failed LED or buzzer write never stops the loop.

pub mod controller;
pub mod error;
pub mod mock;
pub mod preferences;
pub mod trace;
pub mod traits;

pub use controller::{
    Attribute, ControllerHandle, ControllerLink, ControllerNotification, ControllerRequest,
    ControllerRequester, ReadinessFlags,
};
pub use error::{HardwareError, Result};
pub use preferences::JsonFilePreferences;
pub use trace::{TraceLedStrip, TraceTone};
pub use traits::{LedDriver, PreferenceStore, ToneOutput};

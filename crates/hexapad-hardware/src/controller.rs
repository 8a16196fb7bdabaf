//! Channel pair connecting the panel to the external alarm controller.
//!
//! Requests flow from the panel to the controller and are fire-and-forget:
//! the panel never waits for an answer, the outcome comes back later as a
//! state notification. Notifications flow the other way and are drained by
//! the panel on each tick without blocking.
//!
//! ```text
//!  Panel                                 Controller
//!  ControllerLink ── ControllerRequest ──────> ControllerHandle
//!                 <── ControllerNotification ──
//! ```
//!
//! Both directions use unbounded tokio channels so neither side can stall
//! the other's loop.
//!
//! # Example
//!
//! ```
//! use hexapad_core::{AlarmMode, ArmRequest};
//! use hexapad_hardware::controller::{ControllerLink, ControllerNotification, ControllerRequest};
//!
//! let (mut link, mut controller) = ControllerLink::pair();
//!
//! link.request(ControllerRequest::Arm(ArmRequest {
//!     mode: AlarmMode::Home,
//!     forced: false,
//!     skip_delay: false,
//!     raw_pin: "1234".to_string(),
//! }))
//! .unwrap();
//! assert!(matches!(controller.try_recv_request(), Some(ControllerRequest::Arm(_))));
//!
//! controller.notify(ControllerNotification::State { state: "armed_home".to_string() }).unwrap();
//! assert!(link.try_next_notification().is_some());
//! ```

use crate::error::{HardwareError, Result};
use hexapad_core::{ArmRequest, ArmedMode, CustomActionRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, warn};

/// Request sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerRequest {
    /// Arm in `request.mode`, which is never `Disarm`.
    Arm(ArmRequest),
    Disarm { raw_pin: String },
    CustomAction(CustomActionRequest),
}

/// Controller attribute that refines the main state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    ArmMode,
    NextState,
    BypassedSensors,
}

/// Per-mode readiness reported by the controller. `None` means the
/// controller did not report the flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessFlags {
    pub armed_away: Option<bool>,
    pub armed_home: Option<bool>,
    pub armed_night: Option<bool>,
    pub armed_vacation: Option<bool>,
    pub armed_custom_bypass: Option<bool>,
}

impl ReadinessFlags {
    /// Readiness for one armed mode. Flags that were never reported count
    /// as ready.
    #[must_use]
    pub fn is_ready(&self, mode: ArmedMode) -> bool {
        let flag = match mode {
            ArmedMode::Away => self.armed_away,
            ArmedMode::Home => self.armed_home,
            ArmedMode::Night => self.armed_night,
            ArmedMode::Vacation => self.armed_vacation,
            ArmedMode::CustomBypass => self.armed_custom_bypass,
        };
        flag.unwrap_or(true)
    }
}

/// Notification sent by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerNotification {
    /// Raw main state (`disarmed`, `armed_home`, `unavailable`, ...).
    State { state: String },
    Attribute { name: Attribute, value: String },
    SensorsChanged { open: bool },
    /// An arm request was refused (`invalid_code`, `not_allowed`,
    /// `open_sensors`, ...).
    FailedArm { reason: String },
    ReadyUpdate(ReadinessFlags),
    LinkChanged { connected: bool },
    Heartbeat,
}

/// Panel side of the controller channel pair.
#[derive(Debug)]
pub struct ControllerLink {
    requests: UnboundedSender<ControllerRequest>,
    notifications: UnboundedReceiver<ControllerNotification>,
}

impl ControllerLink {
    /// Create a connected link and controller handle.
    #[must_use]
    pub fn pair() -> (Self, ControllerHandle) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (notification_tx, notification_rx) = mpsc::unbounded_channel();

        let link = Self {
            requests: request_tx,
            notifications: notification_rx,
        };
        let handle = ControllerHandle {
            requests: request_rx,
            notifications: notification_tx,
        };
        (link, handle)
    }

    /// Send a request without waiting for the outcome.
    ///
    /// # Errors
    /// Returns `HardwareError::Disconnected` if the controller side is gone.
    pub fn request(&self, request: ControllerRequest) -> Result<()> {
        debug!(request = request_kind(&request), "Controller request");
        self.requests
            .send(request)
            .map_err(|_| HardwareError::disconnected("controller"))
    }

    /// Clonable sender for code that must request from inside callbacks.
    #[must_use]
    pub fn requester(&self) -> ControllerRequester {
        ControllerRequester {
            requests: self.requests.clone(),
        }
    }

    /// Take the next pending notification, if any.
    pub fn try_next_notification(&mut self) -> Option<ControllerNotification> {
        match self.notifications.try_recv() {
            Ok(notification) => Some(notification),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Controller notification channel closed");
                None
            }
        }
    }

    /// Returns `true` once the controller side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

/// Request-only half of a [`ControllerLink`].
#[derive(Debug, Clone)]
pub struct ControllerRequester {
    requests: UnboundedSender<ControllerRequest>,
}

impl ControllerRequester {
    /// # Errors
    /// Returns `HardwareError::Disconnected` if the controller side is gone.
    pub fn request(&self, request: ControllerRequest) -> Result<()> {
        debug!(request = request_kind(&request), "Controller request");
        self.requests
            .send(request)
            .map_err(|_| HardwareError::disconnected("controller"))
    }
}

fn request_kind(request: &ControllerRequest) -> &'static str {
    match request {
        ControllerRequest::Arm(r) => r.mode.as_str(),
        ControllerRequest::Disarm { .. } => "disarm",
        ControllerRequest::CustomAction(_) => "custom_action",
    }
}

/// Controller side of the channel pair.
#[derive(Debug)]
pub struct ControllerHandle {
    requests: UnboundedReceiver<ControllerRequest>,
    notifications: UnboundedSender<ControllerNotification>,
}

impl ControllerHandle {
    /// Wait for the next request. Returns `None` once the panel is gone.
    pub async fn recv_request(&mut self) -> Option<ControllerRequest> {
        self.requests.recv().await
    }

    /// Take the next pending request without waiting.
    pub fn try_recv_request(&mut self) -> Option<ControllerRequest> {
        self.requests.try_recv().ok()
    }

    /// Drain every pending request.
    pub fn drain_requests(&mut self) -> Vec<ControllerRequest> {
        std::iter::from_fn(|| self.try_recv_request()).collect()
    }

    /// Send a notification to the panel.
    ///
    /// # Errors
    /// Returns `HardwareError::Disconnected` if the panel side is gone.
    pub fn notify(&self, notification: ControllerNotification) -> Result<()> {
        self.notifications
            .send(notification)
            .map_err(|_| HardwareError::disconnected("panel"))
    }

    /// Sender usable from other tasks to push notifications.
    #[must_use]
    pub fn notifier(&self) -> UnboundedSender<ControllerNotification> {
        self.notifications.clone()
    }
}

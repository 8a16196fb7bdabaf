//! Replay a captured keypad byte stream through a panel.
//!
//! The capture is decoded with [`KeypadCodec`] and each event is fed on a
//! simulated clock that advances `tick_ms` per event, so timeouts behave as
//! they would on the device without waiting in real time. Controller
//! notifications can be scripted from a JSON Lines file:
//!
//! ```text
//! {"at_ms": 0, "notification": {"type": "state", "state": "disarmed"}}
//! {"at_ms": 1500, "notification": {"type": "failed_arm", "reason": "open_sensors"}}
//! ```
//!
//! LED frames and buzzer levels go to the log; controller requests are
//! collected into the summary.

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use hexapad_hardware::{
    ControllerHandle, ControllerLink, ControllerNotification, ControllerRequest,
    JsonFilePreferences, PreferenceStore, TraceLedStrip, TraceTone, mock::MemoryPreferences,
};
use hexapad_panel::{Panel, PanelDevices};
use hexapad_protocol::KeypadCodec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio_util::codec::FramedRead;
use tracing::{debug, info};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON configuration file.
    #[arg(short, long, env = "HEXAPAD_CONFIG")]
    pub config: PathBuf,

    /// Raw keypad bytes as captured from the UART.
    #[arg(long)]
    pub capture: PathBuf,

    /// Controller notifications, one JSON object per line.
    #[arg(long)]
    pub notifications: Option<PathBuf>,

    /// Simulated milliseconds between decoded events.
    #[arg(long, default_value_t = 100)]
    pub tick_ms: u64,

    /// Simulated milliseconds to keep ticking after the capture ends.
    #[arg(long, default_value_t = 0)]
    pub settle_ms: u64,

    /// Preference file. An in-memory store is used when absent.
    #[arg(long)]
    pub preferences: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct TimedNotification {
    #[serde(default)]
    at_ms: u64,
    notification: ControllerNotification,
}

/// Outcome of a replay.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub events: u64,
    pub requests: Vec<ControllerRequest>,
    pub status: String,
    pub ready: bool,
    pub frames: u64,
    pub decode_errors: u64,
    pub resyncs: u64,
    pub discarded_bytes: u64,
}

pub async fn run(args: &ReplayArgs) -> Result<ReplaySummary> {
    let config = crate::load_config(&args.config)?;
    let mut pending = match &args.notifications {
        Some(path) => load_notifications(path)?,
        None => VecDeque::new(),
    };

    let store: Box<dyn PreferenceStore> = match &args.preferences {
        Some(path) => Box::new(
            JsonFilePreferences::open(path)
                .with_context(|| format!("opening preferences {}", path.display()))?,
        ),
        None => Box::new(MemoryPreferences::new()),
    };
    let devices = PanelDevices {
        strip: Box::new(TraceLedStrip::new(config.strip.led_count)),
        tone: Box::new(TraceTone::new()),
        store,
    };

    let (link, mut controller) = ControllerLink::pair();
    let start = Instant::now();
    let mut panel = Panel::new(&config, devices, link, start)?;

    let file = File::open(&args.capture)
        .await
        .with_context(|| format!("opening capture {}", args.capture.display()))?;
    let mut events = FramedRead::new(file, KeypadCodec::new());

    let step = Duration::from_millis(args.tick_ms.max(1));
    let mut elapsed = Duration::ZERO;
    let mut count = 0u64;
    let mut requests = Vec::new();

    while let Some(event) = events.next().await {
        let event = event.context("reading capture")?;
        elapsed += step;
        let now = start + elapsed;

        deliver(&controller, &mut pending, elapsed)?;
        panel.tick(now);

        debug!(at_ms = elapsed.as_millis() as u64, %event, "Replaying event");
        panel.handle_event(&event, now);
        count += 1;
        requests.extend(controller.drain_requests());
    }

    let end = elapsed + Duration::from_millis(args.settle_ms);
    while elapsed < end {
        elapsed = (elapsed + step).min(end);
        deliver(&controller, &mut pending, elapsed)?;
        panel.tick(start + elapsed);
        requests.extend(controller.drain_requests());
    }

    let stats = events.decoder().stats();
    info!(
        events = count,
        requests = requests.len(),
        errors = stats.errors,
        status = %panel.status(),
        "Replay finished"
    );

    Ok(ReplaySummary {
        events: count,
        requests,
        status: panel.status().to_string(),
        ready: panel.is_ready(),
        frames: stats.frames,
        decode_errors: stats.errors,
        resyncs: stats.resyncs,
        discarded_bytes: stats.discarded_bytes,
    })
}

fn load_notifications(path: &Path) -> Result<VecDeque<TimedNotification>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading notifications {}", path.display()))?;
    let mut notifications = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str::<TimedNotification>(line)
                .with_context(|| format!("{}:{}", path.display(), number + 1))
        })
        .collect::<Result<Vec<_>>>()?;
    notifications.sort_by_key(|n| n.at_ms);
    Ok(notifications.into())
}

/// Send every scripted notification that is due at `elapsed`.
fn deliver(
    controller: &ControllerHandle,
    pending: &mut VecDeque<TimedNotification>,
    elapsed: Duration,
) -> Result<()> {
    while pending
        .front()
        .is_some_and(|n| Duration::from_millis(n.at_ms) <= elapsed)
    {
        if let Some(timed) = pending.pop_front() {
            controller.notify(timed.notification)?;
        }
    }
    Ok(())
}

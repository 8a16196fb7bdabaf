//! LED group feedback engine.
//!
//! The strip is split into named groups of LED indices. Each group has a
//! base color and an optional timed flash overlay. Rendering turns every
//! group into pixels in declaration order, so where groups overlap the
//! group declared last wins. LEDs outside every group keep their last value.
//!
//! Channel value written for an LED:
//!
//! ```text
//! v = clamp(global_brightness * group.max_brightness * channel, 0, 1)
//! v = v ^ gamma                     (only when gamma is enabled)
//! byte = round(v * 255)
//! ```
//!
//! The driver is only written when the computed frame differs from the last
//! frame it accepted.

use hexapad_core::{
    ColorChannel, Error, Result, Rgb,
    config::{LedGroupConfig, StripConfig},
};
use hexapad_hardware::LedDriver;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

#[derive(Debug)]
struct LedGroup {
    name: String,
    leds: Vec<usize>,
    max_brightness: f32,
    color: Rgb,
    flash: Option<(Rgb, Instant)>,
}

impl LedGroup {
    fn visible_color(&self) -> Rgb {
        self.flash.map_or(self.color, |(color, _)| color)
    }
}

#[derive(Debug, Clone, Copy)]
struct ChannelOutput {
    group: usize,
    channel: ColorChannel,
}

/// Renders LED groups onto one [`LedDriver`].
pub struct LedEngine {
    driver: Box<dyn LedDriver>,
    groups: Vec<LedGroup>,
    by_name: HashMap<String, usize>,
    outputs: HashMap<String, ChannelOutput>,
    global_brightness: f32,
    gamma_enabled: bool,
    gamma: f32,
    frame: Vec<[u8; 3]>,
    shown: bool,
    writes: u64,
}

impl LedEngine {
    /// Build the engine from the strip section of the configuration.
    ///
    /// # Errors
    /// Returns a configuration error when the driver size differs from
    /// `led_count`, a group name is repeated, an index is out of range, or
    /// an output names an unknown group.
    pub fn new(config: &StripConfig, driver: Box<dyn LedDriver>) -> Result<Self> {
        if driver.led_count() != config.led_count {
            return Err(Error::config(
                "strip.led_count",
                format!(
                    "driver has {} LEDs, configuration declares {}",
                    driver.led_count(),
                    config.led_count
                ),
            ));
        }

        let mut groups = Vec::with_capacity(config.groups.len());
        let mut by_name = HashMap::new();
        for LedGroupConfig {
            name,
            leds,
            max_brightness,
        } in &config.groups
        {
            if let Some(&index) = leds.iter().find(|&&i| i >= config.led_count) {
                return Err(Error::LedIndexOutOfRange {
                    group: name.clone(),
                    index,
                    led_count: config.led_count,
                });
            }
            if by_name.insert(name.clone(), groups.len()).is_some() {
                return Err(Error::DuplicateGroup(name.clone()));
            }
            groups.push(LedGroup {
                name: name.clone(),
                leds: leds.clone(),
                max_brightness: max_brightness.clamp(0.0, 1.0),
                color: Rgb::OFF,
                flash: None,
            });
        }

        let mut outputs = HashMap::new();
        for output in &config.outputs {
            let group = *by_name
                .get(&output.group)
                .ok_or_else(|| Error::UnknownGroup(output.group.clone()))?;
            outputs.insert(
                output.id.clone(),
                ChannelOutput {
                    group,
                    channel: output.channel,
                },
            );
        }

        debug!(
            leds = config.led_count,
            groups = groups.len(),
            outputs = outputs.len(),
            "LED engine configured"
        );

        Ok(Self {
            driver,
            groups,
            by_name,
            outputs,
            global_brightness: config.global_brightness.clamp(0.0, 1.0),
            gamma_enabled: config.gamma_enabled,
            gamma: config.gamma,
            frame: vec![[0; 3]; config.led_count],
            shown: false,
            writes: 0,
        })
    }

    pub fn led_count(&self) -> usize {
        self.frame.len()
    }

    /// Group names in declaration order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    /// # Errors
    /// Returns `Error::UnknownGroup` for an undeclared group.
    pub fn set_group_color(&mut self, name: &str, color: Rgb) -> Result<()> {
        let group = self.group_mut(name)?;
        group.color = color.clamped();
        trace!(group = name, ?color, "Group color set");
        Ok(())
    }

    pub fn group_color(&self, name: &str) -> Option<Rgb> {
        self.by_name.get(name).map(|&i| self.groups[i].color)
    }

    /// Set one channel of a group through a declared output.
    ///
    /// # Errors
    /// Returns `Error::UnknownOutput` for an undeclared output id.
    pub fn set_output(&mut self, id: &str, value: f32) -> Result<()> {
        let output = *self
            .outputs
            .get(id)
            .ok_or_else(|| Error::UnknownOutput(id.to_string()))?;
        self.groups[output.group]
            .color
            .set_channel(output.channel, value.clamp(0.0, 1.0));
        Ok(())
    }

    /// Show `color` on a group for `duration`, then return to its base color.
    ///
    /// # Errors
    /// Returns `Error::UnknownGroup` for an undeclared group.
    pub fn flash(&mut self, name: &str, color: Rgb, duration: Duration, now: Instant) -> Result<()> {
        let group = self.group_mut(name)?;
        group.flash = Some((color.clamped(), now + duration));
        Ok(())
    }

    pub fn global_brightness(&self) -> f32 {
        self.global_brightness
    }

    /// Values outside `0.0..=1.0` are clamped.
    pub fn set_global_brightness(&mut self, value: f32) {
        self.global_brightness = value.clamp(0.0, 1.0);
    }

    pub fn gamma_enabled(&self) -> bool {
        self.gamma_enabled
    }

    pub fn set_gamma_enabled(&mut self, enabled: bool) {
        self.gamma_enabled = enabled;
    }

    /// Frame last accepted by the driver.
    pub fn pixels(&self) -> &[[u8; 3]] {
        &self.frame
    }

    /// Number of frames written to the driver.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Expire flashes and push the frame to the driver if it changed.
    ///
    /// Returns `Ok(true)` when the driver was written.
    ///
    /// # Errors
    /// Returns the driver error when the write fails. The frame is kept
    /// dirty and retried on the next render.
    pub fn render(&mut self, now: Instant) -> Result<bool> {
        for group in &mut self.groups {
            if let Some((_, until)) = group.flash
                && now >= until
            {
                trace!(group = %group.name, "Flash ended");
                group.flash = None;
            }
        }

        let mut frame = self.frame.clone();
        for group in &self.groups {
            let pixel = self.pixel(group);
            for &index in &group.leds {
                frame[index] = pixel;
            }
        }

        if self.shown && frame == self.frame {
            return Ok(false);
        }

        if let Err(e) = self.driver.write(&frame) {
            warn!(error = %e, "LED frame write failed");
            return Err(e.into());
        }
        self.frame = frame;
        self.shown = true;
        self.writes += 1;
        Ok(true)
    }

    fn pixel(&self, group: &LedGroup) -> [u8; 3] {
        let color = group.visible_color();
        let scale = self.global_brightness * group.max_brightness;
        let mut pixel = [0u8; 3];
        for channel in [ColorChannel::Red, ColorChannel::Green, ColorChannel::Blue] {
            pixel[channel.index()] = self.to_byte(scale * color.channel(channel));
        }
        pixel
    }

    fn to_byte(&self, value: f32) -> u8 {
        let mut v = value.clamp(0.0, 1.0);
        if self.gamma_enabled {
            v = v.powf(self.gamma);
        }
        (v * 255.0).round() as u8
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut LedGroup> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::UnknownGroup(name.to_string()))?;
        Ok(&mut self.groups[index])
    }
}

impl std::fmt::Debug for LedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedEngine")
            .field("groups", &self.groups)
            .field("global_brightness", &self.global_brightness)
            .field("gamma_enabled", &self.gamma_enabled)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

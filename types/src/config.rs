//! Persisted overlay configuration
//!
//! One flat struct, serialized as a JSON object. Every field has a default so
//! files written by older versions keep loading as new keys are added.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Rgb;

// ─────────────────────────────────────────────────────────────────────────────
// Value ranges
// ─────────────────────────────────────────────────────────────────────────────

pub const DOT_SIZE_MIN: u32 = 5;
pub const DOT_SIZE_MAX: u32 = 64;
pub const DOT_SIZE_DEFAULT: u32 = 16;
pub const PULSE_SPEED_DEFAULT_MS: u64 = 50;

/// Language value meaning "follow the system locale"
pub const LANGUAGE_AUTO: &str = "auto";

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub dot_color: Rgb,
    pub dot_size: u32,
    pub opacity_max: f64,
    pub opacity_min: f64,
    pub pulse_speed_ms: u64,
    pub always_on_top: bool,
    /// Saved screen position; `None` means bottom-right of the work area
    pub window_x: Option<i32>,
    pub window_y: Option<i32>,
    pub language: String,
    pub auto_start: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            dot_color: Rgb::CYAN,
            dot_size: DOT_SIZE_DEFAULT,
            opacity_max: 1.0,
            opacity_min: 0.3,
            pulse_speed_ms: PULSE_SPEED_DEFAULT_MS,
            always_on_top: true,
            window_x: None,
            window_y: None,
            language: LANGUAGE_AUTO.to_string(),
            auto_start: false,
        }
    }
}

impl HeartbeatConfig {
    /// Dot edge length clamped to the supported range.
    pub fn effective_dot_size(&self) -> u32 {
        self.dot_size.clamp(DOT_SIZE_MIN, DOT_SIZE_MAX)
    }

    /// `(min, max)` opacity, both clamped to `[0, 1]`.
    ///
    /// The store does not enforce `opacity_min <= opacity_max`; an inverted
    /// pair collapses to a flat pulse at `max`.
    pub fn opacity_bounds(&self) -> (f64, f64) {
        let unit = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        let max = unit(self.opacity_max);
        let min = unit(self.opacity_min).min(max);
        (min, max)
    }

    /// Animation tick period, never shorter than one millisecond.
    pub fn pulse_period(&self) -> Duration {
        Duration::from_millis(self.pulse_speed_ms.max(1))
    }

    /// Saved position, only when both coordinates are present.
    pub fn custom_position(&self) -> Option<(i32, i32)> {
        self.window_x.zip(self.window_y)
    }

    /// Read one setting by key.
    pub fn get(&self, key: SettingKey) -> Setting {
        match key {
            SettingKey::DotColor => Setting::DotColor(self.dot_color),
            SettingKey::DotSize => Setting::DotSize(self.dot_size),
            SettingKey::OpacityMax => Setting::OpacityMax(self.opacity_max),
            SettingKey::OpacityMin => Setting::OpacityMin(self.opacity_min),
            SettingKey::PulseSpeedMs => Setting::PulseSpeedMs(self.pulse_speed_ms),
            SettingKey::AlwaysOnTop => Setting::AlwaysOnTop(self.always_on_top),
            SettingKey::WindowX => Setting::WindowX(self.window_x),
            SettingKey::WindowY => Setting::WindowY(self.window_y),
            SettingKey::Language => Setting::Language(self.language.clone()),
            SettingKey::AutoStart => Setting::AutoStart(self.auto_start),
        }
    }

    /// Write one setting.
    pub fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::DotColor(v) => self.dot_color = v,
            Setting::DotSize(v) => self.dot_size = v,
            Setting::OpacityMax(v) => self.opacity_max = v,
            Setting::OpacityMin(v) => self.opacity_min = v,
            Setting::PulseSpeedMs(v) => self.pulse_speed_ms = v,
            Setting::AlwaysOnTop(v) => self.always_on_top = v,
            Setting::WindowX(v) => self.window_x = v,
            Setting::WindowY(v) => self.window_y = v,
            Setting::Language(v) => self.language = v,
            Setting::AutoStart(v) => self.auto_start = v,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyed access
// ─────────────────────────────────────────────────────────────────────────────

/// Name of a single setting, matching the JSON key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    DotColor,
    DotSize,
    OpacityMax,
    OpacityMin,
    PulseSpeedMs,
    AlwaysOnTop,
    WindowX,
    WindowY,
    Language,
    AutoStart,
}

impl SettingKey {
    pub const ALL: [SettingKey; 10] = [
        SettingKey::DotColor,
        SettingKey::DotSize,
        SettingKey::OpacityMax,
        SettingKey::OpacityMin,
        SettingKey::PulseSpeedMs,
        SettingKey::AlwaysOnTop,
        SettingKey::WindowX,
        SettingKey::WindowY,
        SettingKey::Language,
        SettingKey::AutoStart,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::DotColor => "dot_color",
            SettingKey::DotSize => "dot_size",
            SettingKey::OpacityMax => "opacity_max",
            SettingKey::OpacityMin => "opacity_min",
            SettingKey::PulseSpeedMs => "pulse_speed_ms",
            SettingKey::AlwaysOnTop => "always_on_top",
            SettingKey::WindowX => "window_x",
            SettingKey::WindowY => "window_y",
            SettingKey::Language => "language",
            SettingKey::AutoStart => "auto_start",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// A setting together with its value
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    DotColor(Rgb),
    DotSize(u32),
    OpacityMax(f64),
    OpacityMin(f64),
    PulseSpeedMs(u64),
    AlwaysOnTop(bool),
    WindowX(Option<i32>),
    WindowY(Option<i32>),
    Language(String),
    AutoStart(bool),
}

impl Setting {
    pub fn key(&self) -> SettingKey {
        match self {
            Setting::DotColor(_) => SettingKey::DotColor,
            Setting::DotSize(_) => SettingKey::DotSize,
            Setting::OpacityMax(_) => SettingKey::OpacityMax,
            Setting::OpacityMin(_) => SettingKey::OpacityMin,
            Setting::PulseSpeedMs(_) => SettingKey::PulseSpeedMs,
            Setting::AlwaysOnTop(_) => SettingKey::AlwaysOnTop,
            Setting::WindowX(_) => SettingKey::WindowX,
            Setting::WindowY(_) => SettingKey::WindowY,
            Setting::Language(_) => SettingKey::Language,
            Setting::AutoStart(_) => SettingKey::AutoStart,
        }
    }
}

//! Configuration types shared by the heartbeat crates.

mod color;
pub mod config;

pub use color::{ParseRgbError, Rgb};
pub use config::{
    DOT_SIZE_DEFAULT, DOT_SIZE_MAX, DOT_SIZE_MIN, HeartbeatConfig, LANGUAGE_AUTO,
    PULSE_SPEED_DEFAULT_MS, Setting, SettingKey,
};

//! Heartbeat overlay
//!
//! A small pulsing dot pinned above all windows, with a tray menu for control.
//! The [`controller`] owns the animation and reconciles the window with the
//! live configuration; [`platform`] hides the native window behind
//! [`platform::OverlayPlatform`]; [`app`] is the GUI-thread loop tying the
//! controller to the tray and the config store.

pub mod about;
pub mod app;
pub mod controller;
pub mod platform;
pub mod render;
pub mod tray;

// Re-export main types
pub use app::{App, WINDOW_TITLE};
pub use controller::{FadeDirection, InteractionMode, OverlayController, Visibility};
pub use platform::{NativeOverlay, OverlayPlatform, PlatformError, WindowConfig};
pub use tray::{TrayCommand, TrayHandle, TrayLabels, spawn_tray};

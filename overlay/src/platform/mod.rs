//! Platform abstraction for the overlay window
//!
//! The controller talks to the window only through [`OverlayPlatform`]. On
//! Windows this is a layered Win32 popup; everywhere else a headless stand-in
//! accepts every call and does nothing.
//!
//! Style operations take a [`NativeHandle`] that the caller resolves through a
//! [`HandleCache`]. The OS can invalidate a window handle across show/hide
//! cycles, so a [`PlatformError::StaleHandle`] result tells the caller to drop
//! its cached handle and resolve again on the next attempt.

pub mod autostart;
mod instance;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(target_os = "windows"))]
mod headless;

use std::fmt;

use heartbeat_types::Rgb;
use tiny_skia::Pixmap;

pub use instance::{InstanceGuard, acquire_single_instance};

#[cfg(target_os = "windows")]
pub use self::windows::{WindowsOverlay as NativeOverlay, set_dpi_awareness};
#[cfg(target_os = "windows")]
pub(crate) use self::windows::wide_string;

#[cfg(not(target_os = "windows"))]
pub use headless::{HeadlessOverlay as NativeOverlay, set_dpi_awareness};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque native window handle token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub isize);

/// Usable screen bounds, excluding the taskbar and docked bars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkArea {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WorkArea {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Position a square of edge `size` in the bottom-right corner, `margin`
    /// pixels in from both edges.
    pub fn bottom_right(&self, size: u32, margin: i32) -> (i32, i32) {
        let size = size as i32;
        (self.right - size - margin, self.bottom - size - margin)
    }

    /// Move a square of edge `size` at `(x, y)` so it lies inside the area.
    ///
    /// Only a violated edge moves the square. When the square is larger than
    /// the area the left/top edge wins.
    pub fn clamp_square(&self, x: i32, y: i32, size: u32) -> (i32, i32) {
        let size = size as i32;
        let x = x.min(self.right - size).max(self.left);
        let y = y.min(self.bottom - size).max(self.top);
        (x, y)
    }
}

/// Pointer input in screen coordinates, delivered only while the window
/// accepts input (move mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Pressed { x: i32, y: i32 },
    Moved { x: i32, y: i32 },
    Released,
}

/// Initial window parameters
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub size: u32,
    pub topmost: bool,
    pub click_through: bool,
}

#[derive(Debug)]
pub enum PlatformError {
    /// The handle no longer names a live window
    StaleHandle,
    /// The operation has no meaning on this platform
    Unsupported,
    Other(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::StaleHandle => write!(f, "window handle is no longer valid"),
            PlatformError::Unsupported => write!(f, "operation not supported on this platform"),
            PlatformError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PlatformError {}

// ─────────────────────────────────────────────────────────────────────────────
// Platform trait
// ─────────────────────────────────────────────────────────────────────────────

pub trait OverlayPlatform {
    /// Find the live handle of the overlay window, by title first and then
    /// by the window this platform object created.
    fn resolve_handle(&mut self, title_hint: &str) -> Option<NativeHandle>;

    /// Add the layered and input-transparent styles.
    fn enable_click_through(&mut self, handle: NativeHandle) -> Result<(), PlatformError>;

    /// Remove input transparency while keeping the layered style.
    fn disable_click_through(&mut self, handle: NativeHandle) -> Result<(), PlatformError>;

    /// Set the chroma key and the whole-window alpha in one call.
    fn apply_transparency(
        &mut self,
        handle: NativeHandle,
        key: Rgb,
        alpha: f64,
    ) -> Result<(), PlatformError>;

    /// Pin the window above all others, or release it.
    fn set_topmost(&mut self, topmost: bool) -> Result<(), PlatformError>;

    /// Usable screen bounds; the full screen when the work area is unknown.
    fn work_area(&self) -> WorkArea;

    /// Move and resize the (square) window.
    fn set_geometry(&mut self, x: i32, y: i32, size: u32);

    /// Replace the window contents.
    fn present(&mut self, frame: &Pixmap);

    fn show(&mut self);

    fn hide(&mut self);

    /// Pump pending native messages, appending pointer input to `pointer`.
    /// Returns false once the window has been closed.
    fn poll_events(&mut self, pointer: &mut Vec<PointerEvent>) -> bool;
}

/// Scale an alpha in `[0, 1]` to a byte, truncating like the native API
/// expects and clamping anything out of range.
#[inline]
pub fn alpha_to_byte(alpha: f64) -> u8 {
    ((alpha * 255.0) as i64).clamp(0, 255) as u8
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle cache
// ─────────────────────────────────────────────────────────────────────────────

/// Cached native handle, re-derived lazily after an operation reports it stale
#[derive(Debug, Default)]
pub struct HandleCache {
    cached: Option<NativeHandle>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle, resolving it first if needed.
    pub fn get<P: OverlayPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        title_hint: &str,
    ) -> Option<NativeHandle> {
        if self.cached.is_none() {
            self.cached = platform.resolve_handle(title_hint);
            match self.cached {
                Some(handle) => tracing::debug!(?handle, "resolved overlay handle"),
                None => tracing::debug!(title = title_hint, "could not resolve overlay handle"),
            }
        }
        self.cached
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: WorkArea = WorkArea::new(0, 0, 1920, 1040);

    #[test]
    fn bottom_right_leaves_margin() {
        assert_eq!(AREA.bottom_right(16, 8), (1920 - 16 - 8, 1040 - 16 - 8));
    }

    #[test]
    fn clamp_only_moves_violated_edges() {
        assert_eq!(AREA.clamp_square(100, 200, 16), (100, 200));
        assert_eq!(AREA.clamp_square(5000, 200, 16), (1904, 200));
        assert_eq!(AREA.clamp_square(100, 5000, 16), (100, 1024));
        assert_eq!(AREA.clamp_square(-50, -50, 16), (0, 0));
    }

    #[test]
    fn clamp_respects_offset_work_area() {
        let area = WorkArea::new(-1280, 40, 0, 1024);
        assert_eq!(area.clamp_square(10, 10, 20), (-20, 40));
    }

    #[test]
    fn alpha_bytes_truncate_and_clamp() {
        assert_eq!(alpha_to_byte(1.0), 255);
        assert_eq!(alpha_to_byte(0.3), 76);
        assert_eq!(alpha_to_byte(0.0), 0);
        assert_eq!(alpha_to_byte(1.7), 255);
        assert_eq!(alpha_to_byte(-0.2), 0);
        assert_eq!(alpha_to_byte(f64::NAN), 0);
    }
}

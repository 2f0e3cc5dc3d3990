//! Stand-in platform for systems without layered-window support
//!
//! Keeps geometry bookkeeping so the controller behaves identically, but
//! nothing is drawn.

use heartbeat_types::Rgb;
use tiny_skia::Pixmap;

use super::{NativeHandle, OverlayPlatform, PlatformError, PointerEvent, WindowConfig, WorkArea};

/// Assumed screen when no display information is available
const FALLBACK_SCREEN: WorkArea = WorkArea::new(0, 0, 1920, 1080);

pub struct HeadlessOverlay {
    title: String,
    x: i32,
    y: i32,
    size: u32,
    visible: bool,
}

impl HeadlessOverlay {
    pub fn new(config: WindowConfig) -> Result<Self, PlatformError> {
        tracing::info!(
            title = %config.title,
            "no layered window support on this platform, running headless"
        );
        Ok(Self {
            title: config.title,
            x: config.x,
            y: config.y,
            size: config.size,
            visible: false,
        })
    }
}

impl OverlayPlatform for HeadlessOverlay {
    fn resolve_handle(&mut self, title_hint: &str) -> Option<NativeHandle> {
        (title_hint == self.title).then_some(NativeHandle(1))
    }

    fn enable_click_through(&mut self, _handle: NativeHandle) -> Result<(), PlatformError> {
        Ok(())
    }

    fn disable_click_through(&mut self, _handle: NativeHandle) -> Result<(), PlatformError> {
        Ok(())
    }

    fn apply_transparency(
        &mut self,
        _handle: NativeHandle,
        _key: Rgb,
        _alpha: f64,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    fn set_topmost(&mut self, _topmost: bool) -> Result<(), PlatformError> {
        Ok(())
    }

    fn work_area(&self) -> WorkArea {
        FALLBACK_SCREEN
    }

    fn set_geometry(&mut self, x: i32, y: i32, size: u32) {
        if (x, y, size) != (self.x, self.y, self.size) {
            tracing::debug!(x, y, size, visible = self.visible, "headless geometry");
        }
        self.x = x;
        self.y = y;
        self.size = size;
    }

    fn present(&mut self, _frame: &Pixmap) {}

    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn poll_events(&mut self, _pointer: &mut Vec<PointerEvent>) -> bool {
        true
    }
}

pub fn set_dpi_awareness() {}

//! Overlay animation controller
//!
//! Owns the dot window and reconciles it with the live configuration once per
//! pulse tick. All methods run on the GUI thread; the tray and the config file
//! reach it only through the run loop.

mod pulse;

#[cfg(test)]
pub(crate) mod tests;

use std::time::{Duration, Instant};

use heartbeat_core::ConfigStore;
use heartbeat_types::{HeartbeatConfig, Rgb};

use crate::platform::{HandleCache, OverlayPlatform, PlatformError, PointerEvent, alpha_to_byte};
use crate::render::{TRANSPARENT_KEY, render_dot, visible_dot_color};

pub use pulse::{FadeDirection, INITIAL_ALPHA, PULSE_STEP, Pulse};

/// Gap between the dot and the work-area corner in default placement
pub const EDGE_MARGIN: i32 = 8;

/// Delay between showing the window and re-applying its native styles
pub const SHOW_RESTYLE_DELAY: Duration = Duration::from_millis(10);

/// Drawable color for a configured dot color.
fn dot_color(configured: Rgb) -> Rgb {
    let color = visible_dot_color(configured);
    if color != configured {
        tracing::warn!(
            configured = %configured,
            drawn = %color,
            "dot color matches the transparency key"
        );
    }
    color
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Pointer input passes through to whatever is below
    ClickThrough,
    /// The dot can be dragged
    Movable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Hidden,
}

/// Last pointer position seen during a drag
#[derive(Debug, Clone, Copy)]
struct DragAnchor {
    x: i32,
    y: i32,
}

pub struct OverlayController<P: OverlayPlatform> {
    platform: P,
    handle: HandleCache,
    title: String,

    // Geometry and appearance as last applied
    x: i32,
    y: i32,
    size: u32,
    color: Rgb,
    topmost: bool,
    /// `(window_x, window_y)` as of the previous tick
    last_position: (Option<i32>, Option<i32>),

    pulse: Pulse,
    /// Byte alpha most recently accepted by the platform
    last_sent_alpha: Option<u8>,

    mode: InteractionMode,
    visibility: Visibility,
    drag: Option<DragAnchor>,
    /// A full style pass failed and must be retried
    styles_pending: bool,

    next_tick: Instant,
    restyle_at: Option<Instant>,
    pointer_buf: Vec<PointerEvent>,
}

impl<P: OverlayPlatform> OverlayController<P> {
    /// Take over `platform`'s window: place it, draw the dot, apply the native
    /// styles and show it. The first pulse tick is due at `now`.
    pub fn new(
        platform: P,
        config: &HeartbeatConfig,
        title: impl Into<String>,
        now: Instant,
    ) -> Self {
        let mut controller = Self {
            platform,
            handle: HandleCache::new(),
            title: title.into(),
            x: 0,
            y: 0,
            size: config.effective_dot_size(),
            color: dot_color(config.dot_color),
            topmost: config.always_on_top,
            last_position: (config.window_x, config.window_y),
            pulse: Pulse::new(),
            last_sent_alpha: None,
            mode: InteractionMode::ClickThrough,
            visibility: Visibility::Hidden,
            drag: None,
            styles_pending: false,
            next_tick: now,
            restyle_at: None,
            pointer_buf: Vec::new(),
        };

        controller.place(config);
        controller.redraw();
        controller.apply_styles();
        controller.show(now);

        tracing::info!(
            x = controller.x,
            y = controller.y,
            size = controller.size,
            topmost = controller.topmost,
            "overlay started"
        );
        controller
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn alpha(&self) -> f64 {
        self.pulse.alpha()
    }

    pub fn direction(&self) -> FadeDirection {
        self.pulse.direction()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn next_tick(&self) -> Instant {
        self.next_tick
    }

    /// Earliest instant at which [`run_due`](Self::run_due) has work to do.
    pub fn next_deadline(&self) -> Instant {
        match self.restyle_at {
            Some(at) => at.min(self.next_tick),
            None => self.next_tick,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the deferred restyle and the pulse tick if their time has come.
    pub fn run_due(&mut self, store: &ConfigStore, now: Instant) {
        if let Some(at) = self.restyle_at
            && now >= at
        {
            self.restyle_at = None;
            self.apply_styles();
        }
        if now >= self.next_tick {
            self.tick(store.config(), now);
        }
    }

    /// One reconciliation pass against the current configuration.
    fn tick(&mut self, config: &HeartbeatConfig, now: Instant) {
        let mut redraw = false;

        if visible_dot_color(config.dot_color) != self.color {
            tracing::debug!(color = %config.dot_color, "dot color changed");
            self.color = dot_color(config.dot_color);
            redraw = true;
        }

        let position = (config.window_x, config.window_y);
        let position_changed = position != self.last_position;
        self.last_position = position;

        let size = config.effective_dot_size();
        if size != self.size || position_changed {
            tracing::debug!(size, ?position, "re-placing overlay");
            self.size = size;
            self.place(config);
            redraw = true;
        }

        if redraw {
            self.redraw();
        }

        if config.always_on_top != self.topmost {
            // Changing the z-order can drop the layered attributes
            self.apply_topmost(config.always_on_top);
            self.apply_styles();
        } else if self.styles_pending {
            self.apply_styles();
        }

        let (min, max) = config.opacity_bounds();
        self.pulse.advance(min, max);
        self.push_alpha();

        self.next_tick = now + config.pulse_period();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Geometry and drawing
    // ─────────────────────────────────────────────────────────────────────────

    fn place(&mut self, config: &HeartbeatConfig) {
        let area = self.platform.work_area();
        let (x, y) = match config.custom_position() {
            Some((x, y)) => area.clamp_square(x, y, self.size),
            None => area.bottom_right(self.size, EDGE_MARGIN),
        };
        self.x = x;
        self.y = y;
        self.platform.set_geometry(x, y, self.size);
    }

    fn redraw(&mut self) {
        let outlined = self.mode == InteractionMode::Movable;
        match render_dot(self.size, self.color, outlined) {
            Some(frame) => self.platform.present(&frame),
            None => tracing::warn!(size = self.size, "could not allocate dot frame"),
        }
    }

    fn apply_topmost(&mut self, topmost: bool) {
        if let Err(e) = self.platform.set_topmost(topmost) {
            tracing::warn!(error = %e, topmost, "failed to change topmost state");
        }
        self.topmost = topmost;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Native styles
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve the handle, set click-through for the current mode and apply
    /// the key color with the current alpha. Returns true when every step
    /// succeeded; otherwise the pass is retried on the next tick.
    pub fn apply_styles(&mut self) -> bool {
        let Some(handle) = self.handle.get(&mut self.platform, &self.title) else {
            self.styles_pending = true;
            return false;
        };

        let click_through = match self.mode {
            InteractionMode::ClickThrough => self.platform.enable_click_through(handle),
            InteractionMode::Movable => self.platform.disable_click_through(handle),
        };
        if let Err(e) = click_through {
            self.style_failed(&e, "click-through");
            return false;
        }

        let alpha = self.pulse.alpha();
        match self.platform.apply_transparency(handle, TRANSPARENT_KEY, alpha) {
            Ok(()) => {
                self.last_sent_alpha = Some(alpha_to_byte(alpha));
                self.styles_pending = false;
                true
            }
            Err(e) => {
                self.last_sent_alpha = None;
                self.style_failed(&e, "transparency");
                false
            }
        }
    }

    fn style_failed(&mut self, error: &PlatformError, step: &str) {
        if matches!(error, PlatformError::StaleHandle) {
            self.handle.invalidate();
        }
        self.styles_pending = true;
        tracing::warn!(error = %error, step, "failed to apply overlay styles");
    }

    /// Send the current alpha unless the platform already has the same byte.
    /// Failures are dropped; the next tick tries again.
    fn push_alpha(&mut self) {
        let byte = alpha_to_byte(self.pulse.alpha());
        if self.last_sent_alpha == Some(byte) {
            return;
        }
        let Some(handle) = self.handle.get(&mut self.platform, &self.title) else {
            return;
        };
        match self
            .platform
            .apply_transparency(handle, TRANSPARENT_KEY, self.pulse.alpha())
        {
            Ok(()) => self.last_sent_alpha = Some(byte),
            Err(PlatformError::StaleHandle) => self.handle.invalidate(),
            Err(_) => {}
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Visibility
    // ─────────────────────────────────────────────────────────────────────────

    /// Show the window and schedule a style pass once it has been mapped.
    pub fn show(&mut self, now: Instant) {
        self.platform.show();
        self.visibility = Visibility::Shown;
        self.restyle_at = Some(now + SHOW_RESTYLE_DELAY);
    }

    /// Hide the window. The pulse keeps ticking.
    pub fn hide(&mut self) {
        self.platform.hide();
        self.visibility = Visibility::Hidden;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Interaction mode and dragging
    // ─────────────────────────────────────────────────────────────────────────

    pub fn toggle_move_mode(&mut self, store: &mut ConfigStore) -> InteractionMode {
        let next = match self.mode {
            InteractionMode::ClickThrough => InteractionMode::Movable,
            InteractionMode::Movable => InteractionMode::ClickThrough,
        };
        self.set_mode(next, store);
        next
    }

    pub fn set_mode(&mut self, mode: InteractionMode, store: &mut ConfigStore) {
        if mode == self.mode {
            return;
        }
        if mode == InteractionMode::ClickThrough && self.drag.is_some() {
            self.end_drag(store);
        }
        self.mode = mode;

        match self.handle.get(&mut self.platform, &self.title) {
            Some(handle) => {
                let result = match mode {
                    InteractionMode::ClickThrough => self.platform.enable_click_through(handle),
                    InteractionMode::Movable => self.platform.disable_click_through(handle),
                };
                if let Err(e) = result {
                    self.style_failed(&e, "click-through");
                }
            }
            None => self.styles_pending = true,
        }

        self.redraw();
        tracing::info!(?mode, "interaction mode changed");
    }

    /// Begin a drag at screen position `(x, y)`. Ignored unless movable.
    pub fn start_drag(&mut self, x: i32, y: i32) {
        if self.mode != InteractionMode::Movable {
            return;
        }
        self.drag = Some(DragAnchor { x, y });
    }

    /// Follow the pointer. The window is not clamped while dragging.
    pub fn on_drag(&mut self, x: i32, y: i32) {
        let Some(anchor) = self.drag.as_mut() else {
            return;
        };
        let (dx, dy) = (x - anchor.x, y - anchor.y);
        if dx == 0 && dy == 0 {
            return;
        }
        anchor.x = x;
        anchor.y = y;
        self.x += dx;
        self.y += dy;
        self.platform.set_geometry(self.x, self.y, self.size);
    }

    /// Finish a drag and persist the final position.
    pub fn end_drag(&mut self, store: &mut ConfigStore) {
        if self.drag.take().is_none() {
            return;
        }
        let (x, y) = (self.x, self.y);
        store.update(|config| {
            config.window_x = Some(x);
            config.window_y = Some(y);
        });
        self.last_position = (Some(x), Some(y));
        tracing::info!(x, y, "overlay position saved");
    }

    pub fn handle_pointer(&mut self, event: PointerEvent, store: &mut ConfigStore) {
        match event {
            PointerEvent::Pressed { x, y } => self.start_drag(x, y),
            PointerEvent::Moved { x, y } => self.on_drag(x, y),
            PointerEvent::Released => self.end_drag(store),
        }
    }

    /// Pump native messages and feed pointer input to the drag handlers.
    /// Returns false once the window is gone.
    pub fn pump(&mut self, store: &mut ConfigStore) -> bool {
        let mut events = std::mem::take(&mut self.pointer_buf);
        let running = self.platform.poll_events(&mut events);
        for event in events.drain(..) {
            self.handle_pointer(event, store);
        }
        self.pointer_buf = events;
        running
    }
}

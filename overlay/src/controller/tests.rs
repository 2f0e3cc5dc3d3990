use std::time::Instant;

use heartbeat_core::{CONFIG_FILE_NAME, ConfigStore};
use heartbeat_types::{Rgb, Setting};
use tempfile::TempDir;
use tiny_skia::Pixmap;

use super::*;
use crate::platform::{NativeHandle, WorkArea};

const AREA: WorkArea = WorkArea::new(0, 0, 1920, 1040);
const TITLE: &str = "Heartbeat Test";

// ─────────────────────────────────────────────────────────────────────────────
// Recording platform
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Calls {
    resolve: usize,
    enable_click_through: usize,
    disable_click_through: usize,
    /// Byte alphas accepted by `apply_transparency`
    transparency: Vec<u8>,
    topmost: Vec<bool>,
    geometry: Vec<(i32, i32, u32)>,
    /// Edge length of each presented frame
    frames: Vec<u32>,
    /// Center pixel of each presented frame
    centers: Vec<Rgb>,
    show: usize,
    hide: usize,
}

pub(crate) struct MockPlatform {
    calls: Calls,
    resolvable: bool,
    /// Number of upcoming `apply_transparency` calls that report a stale handle
    stale_transparency: usize,
    pointer: Vec<PointerEvent>,
}

impl MockPlatform {
    pub(crate) fn new() -> Self {
        Self {
            calls: Calls::default(),
            resolvable: true,
            stale_transparency: 0,
            pointer: Vec::new(),
        }
    }
}

impl OverlayPlatform for MockPlatform {
    fn resolve_handle(&mut self, _title_hint: &str) -> Option<NativeHandle> {
        self.calls.resolve += 1;
        self.resolvable.then_some(NativeHandle(42))
    }

    fn enable_click_through(&mut self, _handle: NativeHandle) -> Result<(), PlatformError> {
        self.calls.enable_click_through += 1;
        Ok(())
    }

    fn disable_click_through(&mut self, _handle: NativeHandle) -> Result<(), PlatformError> {
        self.calls.disable_click_through += 1;
        Ok(())
    }

    fn apply_transparency(
        &mut self,
        _handle: NativeHandle,
        key: Rgb,
        alpha: f64,
    ) -> Result<(), PlatformError> {
        assert_eq!(key, TRANSPARENT_KEY);
        if self.stale_transparency > 0 {
            self.stale_transparency -= 1;
            return Err(PlatformError::StaleHandle);
        }
        self.calls.transparency.push(alpha_to_byte(alpha));
        Ok(())
    }

    fn set_topmost(&mut self, topmost: bool) -> Result<(), PlatformError> {
        self.calls.topmost.push(topmost);
        Ok(())
    }

    fn work_area(&self) -> WorkArea {
        AREA
    }

    fn set_geometry(&mut self, x: i32, y: i32, size: u32) {
        self.calls.geometry.push((x, y, size));
    }

    fn present(&mut self, frame: &Pixmap) {
        self.calls.frames.push(frame.width());
        let mid = frame.width() / 2;
        if let Some(px) = frame.pixel(mid, mid) {
            self.calls.centers.push(Rgb::new(px.red(), px.green(), px.blue()));
        }
    }

    fn show(&mut self) {
        self.calls.show += 1;
    }

    fn hide(&mut self) {
        self.calls.hide += 1;
    }

    fn poll_events(&mut self, pointer: &mut Vec<PointerEvent>) -> bool {
        pointer.append(&mut self.pointer);
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn temp_store() -> (TempDir, ConfigStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open(dir.path().join(CONFIG_FILE_NAME));
    (dir, store)
}

fn start(
    store: &ConfigStore,
    platform: MockPlatform,
) -> (OverlayController<MockPlatform>, Instant) {
    let t0 = Instant::now();
    (OverlayController::new(platform, store.config(), TITLE, t0), t0)
}

/// Run the controller at its next pulse tick and return that instant.
fn step(controller: &mut OverlayController<MockPlatform>, store: &ConfigStore) -> Instant {
    let at = controller.next_tick();
    controller.run_due(store, at);
    at
}

fn calls(controller: &OverlayController<MockPlatform>) -> &Calls {
    &controller.platform.calls
}

fn default_corner(size: u32) -> (i32, i32) {
    let size = size as i32;
    (1920 - size - EDGE_MARGIN, 1040 - size - EDGE_MARGIN)
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn default_config_starts_bottom_right_falling_from_initial_alpha() {
    let (_dir, store) = temp_store();
    let (controller, t0) = start(&store, MockPlatform::new());

    assert_eq!(controller.position(), default_corner(16));
    assert_eq!(controller.alpha(), INITIAL_ALPHA);
    assert_eq!(controller.direction(), FadeDirection::Falling);
    assert_eq!(controller.mode(), InteractionMode::ClickThrough);
    assert_eq!(controller.visibility(), Visibility::Shown);
    assert_eq!(controller.next_tick(), t0);

    let calls = calls(&controller);
    assert_eq!(calls.geometry, vec![(1896, 1016, 16)]);
    assert_eq!(calls.frames, vec![16]);
    assert_eq!(calls.enable_click_through, 1);
    assert_eq!(calls.transparency, vec![alpha_to_byte(INITIAL_ALPHA)]);
    assert_eq!(calls.show, 1);
}

#[test]
fn saved_position_is_used_at_startup() {
    let (_dir, mut store) = temp_store();
    store.update(|c| {
        c.window_x = Some(100);
        c.window_y = Some(200);
    });
    let (controller, _) = start(&store, MockPlatform::new());
    assert_eq!(controller.position(), (100, 200));
}

#[test]
fn one_saved_coordinate_is_not_a_position() {
    let (_dir, mut store) = temp_store();
    store.set(Setting::WindowX(Some(100)));
    let (controller, _) = start(&store, MockPlatform::new());
    assert_eq!(controller.position(), default_corner(16));
}

// ─────────────────────────────────────────────────────────────────────────────
// Pulse ticks
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn each_tick_steps_alpha_and_sends_it() {
    let (_dir, store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());

    step(&mut controller, &store);
    assert!((controller.alpha() - 0.75).abs() < 1e-12);
    assert_eq!(
        calls(&controller).transparency.last(),
        Some(&alpha_to_byte(controller.alpha()))
    );
}

#[test]
fn repeated_config_produces_no_extra_native_calls() {
    let (_dir, mut store) = temp_store();
    store.update(|c| {
        c.opacity_min = 0.5;
        c.opacity_max = 0.5;
    });
    let (mut controller, _) = start(&store, MockPlatform::new());

    for _ in 0..3 {
        step(&mut controller, &store);
    }
    let transparency = calls(&controller).transparency.len();
    let geometry = calls(&controller).geometry.len();
    let frames = calls(&controller).frames.len();

    for _ in 0..5 {
        step(&mut controller, &store);
        assert_eq!(controller.alpha(), 0.5);
    }
    assert_eq!(calls(&controller).transparency.len(), transparency);
    assert_eq!(calls(&controller).geometry.len(), geometry);
    assert_eq!(calls(&controller).frames.len(), frames);
}

#[test]
fn pulse_speed_change_applies_from_the_following_tick() {
    let (_dir, mut store) = temp_store();
    let (mut controller, t0) = start(&store, MockPlatform::new());

    step(&mut controller, &store);
    assert_eq!(controller.next_tick(), t0 + Duration::from_millis(50));

    store.set(Setting::PulseSpeedMs(500));
    assert_eq!(controller.next_tick(), t0 + Duration::from_millis(50));

    let fired = step(&mut controller, &store);
    assert_eq!(fired, t0 + Duration::from_millis(50));
    assert_eq!(controller.next_tick(), fired + Duration::from_millis(500));
}

#[test]
fn tick_before_deadline_does_nothing() {
    let (_dir, store) = temp_store();
    let (mut controller, t0) = start(&store, MockPlatform::new());
    step(&mut controller, &store);
    let alpha = controller.alpha();

    controller.run_due(&store, t0 + Duration::from_millis(20));
    assert_eq!(controller.alpha(), alpha);
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconciliation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn out_of_bounds_position_is_clamped_on_next_tick() {
    let (_dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());

    store.update(|c| {
        c.window_x = Some(5000);
        c.window_y = Some(200);
    });
    step(&mut controller, &store);
    assert_eq!(controller.position(), (1920 - 16, 200));

    store.update(|c| {
        c.window_x = Some(-50);
        c.window_y = Some(2000);
    });
    step(&mut controller, &store);
    assert_eq!(controller.position(), (0, 1040 - 16));
    assert_eq!(calls(&controller).geometry.last(), Some(&(0, 1024, 16)));
}

#[test]
fn clearing_saved_position_returns_to_default_corner() {
    let (_dir, mut store) = temp_store();
    store.update(|c| {
        c.window_x = Some(300);
        c.window_y = Some(300);
    });
    let (mut controller, _) = start(&store, MockPlatform::new());
    step(&mut controller, &store);
    assert_eq!(controller.position(), (300, 300));

    store.set(Setting::WindowX(None));
    step(&mut controller, &store);
    assert_eq!(controller.position(), default_corner(16));
}

#[test]
fn size_change_re_places_and_redraws() {
    let (_dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());

    store.set(Setting::DotSize(32));
    step(&mut controller, &store);
    assert_eq!(controller.size(), 32);
    assert_eq!(calls(&controller).geometry.last(), Some(&(1880, 1000, 32)));
    assert_eq!(calls(&controller).frames.last(), Some(&32));

    store.set(Setting::DotSize(500));
    step(&mut controller, &store);
    assert_eq!(controller.size(), 64);
}

#[test]
fn color_change_redraws_without_moving() {
    let (_dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());
    step(&mut controller, &store);
    let geometry = calls(&controller).geometry.len();
    let frames = calls(&controller).frames.len();

    store.set(Setting::DotColor(Rgb::new(255, 0, 0)));
    step(&mut controller, &store);
    assert_eq!(calls(&controller).geometry.len(), geometry);
    assert_eq!(calls(&controller).frames.len(), frames + 1);
}

#[test]
fn key_colored_dot_is_drawn_black_once() {
    let (_dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());
    step(&mut controller, &store);
    assert_eq!(calls(&controller).centers.last(), Some(&Rgb::CYAN));

    store.set(Setting::DotColor(TRANSPARENT_KEY));
    step(&mut controller, &store);
    assert_eq!(calls(&controller).centers.last(), Some(&Rgb::BLACK));

    let frames = calls(&controller).frames.len();
    step(&mut controller, &store);
    assert_eq!(calls(&controller).frames.len(), frames);
}

#[test]
fn topmost_change_reapplies_styles_once() {
    let (_dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());
    // First two ticks, the second also running the deferred restyle
    step(&mut controller, &store);
    step(&mut controller, &store);

    let click_through = calls(&controller).enable_click_through;
    let transparency = calls(&controller).transparency.len();

    store.set(Setting::AlwaysOnTop(false));
    step(&mut controller, &store);
    assert_eq!(calls(&controller).topmost, vec![false]);
    assert_eq!(calls(&controller).enable_click_through, click_through + 1);
    // Restyle plus the regular alpha update
    assert_eq!(calls(&controller).transparency.len(), transparency + 2);

    step(&mut controller, &store);
    assert_eq!(calls(&controller).topmost, vec![false]);
    assert_eq!(calls(&controller).enable_click_through, click_through + 1);
    assert_eq!(calls(&controller).transparency.len(), transparency + 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle recovery
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stale_handle_is_re_resolved_on_next_tick() {
    let (_dir, store) = temp_store();
    let mut platform = MockPlatform::new();
    platform.stale_transparency = 1;
    let (mut controller, _) = start(&store, platform);

    assert_eq!(calls(&controller).resolve, 1);
    assert!(calls(&controller).transparency.is_empty());

    step(&mut controller, &store);
    assert_eq!(calls(&controller).resolve, 2);
    assert_eq!(calls(&controller).enable_click_through, 2);
    assert!(!calls(&controller).transparency.is_empty());

    // The handle stays cached once healed
    step(&mut controller, &store);
    step(&mut controller, &store);
    assert_eq!(calls(&controller).resolve, 2);
    assert_eq!(calls(&controller).enable_click_through, 3);
}

#[test]
fn unresolvable_handle_skips_styles_until_it_appears() {
    let (_dir, store) = temp_store();
    let mut platform = MockPlatform::new();
    platform.resolvable = false;
    let (mut controller, _) = start(&store, platform);

    step(&mut controller, &store);
    assert_eq!(calls(&controller).enable_click_through, 0);
    assert!(calls(&controller).transparency.is_empty());

    controller.platform.resolvable = true;
    step(&mut controller, &store);
    assert_eq!(calls(&controller).enable_click_through, 1);
    assert!(!calls(&controller).transparency.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Visibility
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn hidden_overlay_keeps_pulsing() {
    let (_dir, store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());
    controller.hide();
    assert_eq!(controller.visibility(), Visibility::Hidden);
    assert_eq!(calls(&controller).hide, 1);

    let before = controller.alpha();
    step(&mut controller, &store);
    assert_ne!(controller.alpha(), before);
}

#[test]
fn show_schedules_a_deferred_restyle() {
    let (_dir, store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());
    let shown_at = step(&mut controller, &store);
    step(&mut controller, &store);
    controller.hide();

    let now = shown_at + Duration::from_millis(60);
    controller.show(now);
    assert_eq!(controller.next_deadline(), now + SHOW_RESTYLE_DELAY);

    let click_through = calls(&controller).enable_click_through;
    controller.run_due(&store, now + Duration::from_millis(5));
    assert_eq!(calls(&controller).enable_click_through, click_through);

    controller.run_due(&store, now + SHOW_RESTYLE_DELAY);
    assert_eq!(calls(&controller).enable_click_through, click_through + 1);
    assert_eq!(calls(&controller).show, 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Move mode and dragging
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn drag_is_ignored_in_click_through_mode() {
    let (_dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());

    controller.handle_pointer(PointerEvent::Pressed { x: 10, y: 10 }, &mut store);
    controller.handle_pointer(PointerEvent::Moved { x: 50, y: 50 }, &mut store);
    assert!(!controller.is_dragging());
    assert_eq!(controller.position(), default_corner(16));
}

#[test]
fn drag_moves_window_and_persists_on_release() {
    let (dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());

    assert_eq!(controller.toggle_move_mode(&mut store), InteractionMode::Movable);
    assert_eq!(calls(&controller).disable_click_through, 1);
    assert_eq!(calls(&controller).frames.len(), 2);

    controller.platform.pointer = vec![
        PointerEvent::Pressed { x: 500, y: 500 },
        PointerEvent::Moved { x: 510, y: 495 },
        PointerEvent::Moved { x: 530, y: 480 },
    ];
    assert!(controller.pump(&mut store));
    assert!(controller.is_dragging());
    assert_eq!(controller.position(), (1896 + 30, 1016 - 20));
    // Not clamped while dragging
    assert_eq!(calls(&controller).geometry.last(), Some(&(1926, 996, 16)));
    assert_eq!(store.config().window_x, None);

    controller.platform.pointer = vec![PointerEvent::Released];
    controller.pump(&mut store);
    assert!(!controller.is_dragging());
    assert_eq!(store.config().window_x, Some(1926));
    assert_eq!(store.config().window_y, Some(996));

    let reopened = ConfigStore::open(dir.path().join(CONFIG_FILE_NAME));
    assert_eq!(reopened.config().custom_position(), Some((1926, 996)));

    // Our own write does not count as an external move
    let geometry = calls(&controller).geometry.len();
    step(&mut controller, &store);
    assert_eq!(calls(&controller).geometry.len(), geometry);
}

#[test]
fn leaving_move_mode_mid_drag_saves_position() {
    let (_dir, mut store) = temp_store();
    let (mut controller, _) = start(&store, MockPlatform::new());
    controller.toggle_move_mode(&mut store);
    controller.start_drag(0, 0);
    controller.on_drag(-100, -100);

    assert_eq!(controller.toggle_move_mode(&mut store), InteractionMode::ClickThrough);
    assert!(!controller.is_dragging());
    assert_eq!(store.config().custom_position(), Some((1796, 916)));
    assert_eq!(calls(&controller).enable_click_through, 2);
    assert_eq!(calls(&controller).frames.len(), 3);
}

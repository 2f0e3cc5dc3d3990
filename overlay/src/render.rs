//! Dot rendering
//!
//! The overlay frame is a square filled with [`TRANSPARENT_KEY`], which the
//! platform layer turns fully transparent, with the dot drawn on top. Edges are
//! not anti-aliased: blended edge pixels would miss the key and show up as a
//! dark fringe.

use heartbeat_types::Rgb;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Background color rendered fully transparent by the window
pub const TRANSPARENT_KEY: Rgb = Rgb::new(0x00, 0x00, 0x01);

/// Outline drawn around the window in move mode
pub const MOVE_OUTLINE: Rgb = Rgb::new(0xC8, 0xC8, 0xC8);

const DOT_PADDING: f32 = 1.0;
const TRAY_ICON_PADDING: f32 = 8.0;

/// Color the dot is drawn in. A dot in the key color would vanish, so it is
/// drawn black instead.
pub fn visible_dot_color(dot: Rgb) -> Rgb {
    if dot == TRANSPARENT_KEY { Rgb::BLACK } else { dot }
}

#[inline]
fn color(rgb: Rgb) -> Color {
    Color::from_rgba8(rgb.r, rgb.g, rgb.b, 255)
}

fn solid_paint(rgb: Rgb, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color(rgb));
    paint.anti_alias = anti_alias;
    paint
}

fn fill_circle(pixmap: &mut Pixmap, padding: f32, rgb: Rgb, anti_alias: bool) {
    let half = pixmap.width() as f32 / 2.0;
    let radius = half - padding;
    if radius <= 0.0 {
        return;
    }
    if let Some(path) = PathBuilder::from_circle(half, half, radius) {
        pixmap.fill_path(
            &path,
            &solid_paint(rgb, anti_alias),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

/// Render the overlay frame: a `size`×`size` keyed square with the dot, and
/// a visible border when `outlined`.
pub fn render_dot(size: u32, dot: Rgb, outlined: bool) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(size, size)?;
    pixmap.fill(color(TRANSPARENT_KEY));
    fill_circle(&mut pixmap, DOT_PADDING, dot, false);

    if outlined {
        let edge = size as f32;
        if let Some(rect) = Rect::from_xywh(0.5, 0.5, edge - 1.0, edge - 1.0) {
            let path = PathBuilder::from_rect(rect);
            let stroke = Stroke {
                width: 1.0,
                ..Default::default()
            };
            pixmap.stroke_path(
                &path,
                &solid_paint(MOVE_OUTLINE, false),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    Some(pixmap)
}

/// Tray icon image: the dot on a black square.
pub fn render_tray_icon(size: u32, dot: Rgb) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(size, size)?;
    pixmap.fill(color(Rgb::BLACK));
    fill_circle(&mut pixmap, TRAY_ICON_PADDING, dot, true);
    Some(pixmap)
}

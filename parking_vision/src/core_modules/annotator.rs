// THEORY:
// The annotator paints the verdict for a single region onto the working copy
// of the image: a translucent fill, a solid outline and a short text label, red
// for occupied and green for free. It never reads pixels back for analysis;
// sampling always happens on the untouched source image, so drawing order
// cannot influence classification.

use crate::core_modules::glyphs;
use crate::core_modules::region::RegionBounds;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{Blend, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

pub const OCCUPIED_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const FREE_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const LABEL_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Tunable look of the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStyle {
    /// Outline width in pixels.
    pub outline_thickness: u32,
    /// Opacity of the fill, 0.0..=1.0.
    pub fill_alpha: f32,
    /// Pixel size of one glyph cell.
    pub label_scale: u32,
    /// Prefix labels with the 1-based region index.
    pub show_index: bool,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            outline_thickness: 3,
            fill_alpha: 0.3,
            label_scale: 1,
            show_index: false,
        }
    }
}

impl AnnotationStyle {
    fn fill_color(&self, base: Rgba<u8>) -> Rgba<u8> {
        let alpha = (self.fill_alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([base[0], base[1], base[2], alpha])
    }

    pub fn label(&self, occupied: bool, index: usize) -> String {
        let verdict = verdict_text(occupied);
        if self.show_index {
            format!("#{} {}", index + 1, verdict)
        } else {
            verdict.to_string()
        }
    }
}

fn verdict_text(occupied: bool) -> &'static str {
    if occupied { "OCCUPIED" } else { "FREE" }
}

fn to_rect(left: i64, top: i64, width: u32, height: u32) -> Option<Rect> {
    if width == 0 || height == 0 {
        return None;
    }
    Some(Rect::at(left as i32, top as i32).of_size(width, height))
}

/// Draws fill, outline and label for one classified region.
pub fn annotate_region(
    canvas: &mut RgbaImage,
    bounds: &RegionBounds,
    occupied: bool,
    index: usize,
    style: &AnnotationStyle,
) {
    let base = if occupied { OCCUPIED_COLOR } else { FREE_COLOR };
    let Some(area) = to_rect(bounds.left, bounds.top, bounds.width, bounds.height) else {
        return;
    };

    // Translucent fill is alpha-composited over the photo.
    let mut blend = Blend(std::mem::take(canvas));
    draw_filled_rect_mut(&mut blend, area, style.fill_color(base));
    *canvas = blend.0;

    for inset in 0..style.outline_thickness {
        let width = bounds.width.saturating_sub(2 * inset);
        let height = bounds.height.saturating_sub(2 * inset);
        let Some(ring) = to_rect(
            bounds.left + inset as i64,
            bounds.top + inset as i64,
            width,
            height,
        ) else {
            break;
        };
        draw_hollow_rect_mut(canvas, ring, base);
    }

    let padding = style.outline_thickness as i64 + 2;
    let room = (bounds.width as i64 - 2 * padding).max(0) as u32;
    let mut label = style.label(occupied, index);
    if glyphs::text_width(&label, style.label_scale) > room {
        // Indexed labels fall back to the bare verdict when they would spill out.
        label = verdict_text(occupied).to_string();
    }
    glyphs::draw_text(
        canvas,
        &label,
        (bounds.left + padding) as i32,
        (bounds.top + padding) as i32,
        style.label_scale,
        LABEL_COLOR,
    );
}

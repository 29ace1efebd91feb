// THEORY:
// Region labels ("FREE", "OCCUPIED", "#12 ...") are drawn from the 8x8 bitmap
// glyphs of `font8x8`. Every lit bit becomes a filled square of `scale` pixels,
// so labels stay crisp at any integer scale and need no font file at runtime.
// Characters the font does not cover advance the cursor but draw nothing.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

/// Side of one glyph cell in font pixels; the glyphs carry their own spacing.
pub const GLYPH_SIZE: u32 = 8;

/// Horizontal space `text` occupies when drawn at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale.max(1)
}

/// Draws `text` with its top-left corner at `(x, y)`. Cells falling outside the
/// canvas are clipped.
pub fn draw_text(canvas: &mut RgbaImage, text: &str, x: i32, y: i32, scale: u32, color: Rgba<u8>) {
    let scale = scale.max(1);
    let advance = (GLYPH_SIZE * scale) as i32;

    for (position, ch) in text.chars().enumerate() {
        let Some(rows) = BASIC_FONTS.get(ch) else { continue };
        let origin_x = x + position as i32 * advance;

        for (row, bits) in rows.iter().enumerate() {
            // Least significant bit is the leftmost pixel.
            for column in 0..GLYPH_SIZE {
                if bits & (1 << column) == 0 {
                    continue;
                }
                let cell = Rect::at(
                    origin_x + (column * scale) as i32,
                    y + (row as u32 * scale) as i32,
                )
                .of_size(scale, scale);
                draw_filled_rect_mut(canvas, cell, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn width_scales_with_length() {
        assert_eq!(text_width("FREE", 1), 32);
        assert_eq!(text_width("FREE", 2), 64);
        assert_eq!(text_width("", 3), 0);
    }

    #[test]
    fn every_label_character_is_covered() {
        for ch in "OCCUPIED FREE #0123456789".chars() {
            let glyph = BASIC_FONTS.get(ch);
            assert!(glyph.is_some(), "missing glyph for {ch:?}");
            assert_eq!(glyph.unwrap().iter().any(|row| *row != 0), ch != ' ');
        }
    }

    #[test]
    fn drawing_marks_pixels_inside_the_text_box_only() {
        let mut canvas = RgbaImage::from_pixel(48, 20, WHITE);
        draw_text(&mut canvas, "FREE", 2, 2, 1, BLACK);

        // Top-left cell of 'F' is lit.
        assert_eq!(canvas.get_pixel(2, 2), &BLACK);
        let width = text_width("FREE", 1);
        let mut inked = 0;
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let inside = x >= 2 && x < 2 + width && y >= 2 && y < 2 + GLYPH_SIZE;
            if !inside {
                assert_eq!(pixel, &WHITE, "stray ink at ({x}, {y})");
            } else if pixel == &BLACK {
                inked += 1;
            }
        }
        assert!(inked > 20);
    }

    #[test]
    fn scale_enlarges_each_cell() {
        let mut canvas = RgbaImage::from_pixel(40, 20, WHITE);
        draw_text(&mut canvas, "F", 0, 0, 2, BLACK);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(canvas.get_pixel(x, y), &BLACK);
        }
    }

    #[test]
    fn text_past_the_edge_is_clipped() {
        let mut canvas = RgbaImage::from_pixel(4, 4, WHITE);
        draw_text(&mut canvas, "OCCUPIED", -3, -3, 2, BLACK);
    }
}

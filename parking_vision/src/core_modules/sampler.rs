// THEORY:
// The sampler is the bridge between the raw RGBA frame and a `Patch`. It walks
// the rectangle of a region row by row, computes the byte offset of every
// pixel in the flat frame buffer and copies the pixels out.
//
// Rectangles are not guaranteed to fit inside the image: a user may click near
// an edge. How such a rectangle is read is governed by an explicit `EdgePolicy`
// rather than left to chance.

use crate::core_modules::patch::patch::Patch;
use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::core_modules::region::RegionBounds;
use crate::error::SampleError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// How to read a rectangle that crosses the image border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Average only the pixels inside the image. A rectangle with none is an error.
    #[default]
    Clamp,
    /// Out-of-bounds pixels are read as transparent black.
    ZeroPad,
    /// Any rectangle not fully inside the image is an error.
    Reject,
}

/// Extracts the pixels of `bounds` from `image` under the given policy.
pub fn sample_patch(
    image: &RgbaImage,
    bounds: &RegionBounds,
    policy: EdgePolicy,
) -> Result<Patch, SampleError> {
    let (image_width, image_height) = image.dimensions();

    match policy {
        EdgePolicy::Reject if !bounds.is_within(image_width, image_height) => {
            return Err(SampleError::PartiallyOutside);
        }
        EdgePolicy::Clamp if !bounds.intersects(image_width, image_height) => {
            return Err(SampleError::FullyOutside);
        }
        _ => {}
    }

    let frame_buffer = image.as_raw();
    let num_pixels = bounds.width as usize * bounds.height as usize;
    let mut pixels = Vec::with_capacity(num_pixels);
    let mut in_bounds = 0usize;

    for i in 0..num_pixels {
        let y_offset = (i / bounds.width as usize) as i64;
        let x_offset = (i % bounds.width as usize) as i64;
        let (Some(pixel_x), Some(pixel_y)) = (
            bounds.left.checked_add(x_offset),
            bounds.top.checked_add(y_offset),
        ) else {
            return Err(SampleError::CoordinatesOutOfRange);
        };

        let inside = pixel_x >= 0
            && pixel_y >= 0
            && pixel_x < image_width as i64
            && pixel_y < image_height as i64;

        if inside {
            let byte_index = (pixel_y as usize * image_width as usize + pixel_x as usize) * CHANNELS;
            pixels.push(Pixel::new(
                frame_buffer[byte_index],
                frame_buffer[byte_index + 1],
                frame_buffer[byte_index + 2],
                frame_buffer[byte_index + 3],
            ));
            in_bounds += 1;
        } else if policy == EdgePolicy::ZeroPad {
            pixels.push(Pixel::TRANSPARENT_BLACK);
        }
    }

    Ok(Patch::new(bounds.width, bounds.height, pixels, in_bounds))
}

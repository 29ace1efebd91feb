// THEORY:
// A `Region` is one user-marked parking space: the point the user clicked plus
// the last classification computed for it. The rectangle itself is implicit,
// a fixed-size box centred on the click, and is only materialised as
// `RegionBounds` when the estimator needs to read or draw pixels.
//
// Regions are plain data. They serialise as `{ "x": .., "y": .., "occupied": .. }`
// so a whole list can be written to and restored from storage verbatim.

use crate::error::SampleError;
use serde::{Deserialize, Serialize};

/// Default width of a parking-space rectangle in pixels.
pub const REGION_WIDTH: u32 = 100;
/// Default height of a parking-space rectangle in pixels.
pub const REGION_HEIGHT: u32 = 50;

/// A user-defined parking space centred at `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    /// Last computed classification; `false` until analysed.
    #[serde(default)]
    pub occupied: bool,
}

impl Region {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            occupied: false,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// The pixel rectangle of a `width` x `height` box centred on this region.
    /// Both edges of the rectangle must fit in `i32` pixel coordinates.
    pub fn bounds(&self, width: u32, height: u32) -> Result<RegionBounds, SampleError> {
        if !self.is_finite() {
            return Err(SampleError::NonFiniteCentre);
        }
        Ok(RegionBounds {
            left: edge(self.x, width)?,
            top: edge(self.y, height)?,
            width,
            height,
        })
    }
}

/// Leading edge of a `size`-pixel span centred on `centre`.
fn edge(centre: f64, size: u32) -> Result<i64, SampleError> {
    let start = (centre - size as f64 / 2.0).floor();
    if start < i32::MIN as f64 || start + size as f64 > i32::MAX as f64 {
        return Err(SampleError::CoordinatesOutOfRange);
    }
    Ok(start as i64)
}

/// Half-open integer rectangle `[left, left + width) x [top, top + height)`.
/// May extend past the image in any direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionBounds {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

impl RegionBounds {
    pub fn right(&self) -> i64 {
        self.left.saturating_add(self.width as i64)
    }

    pub fn bottom(&self) -> i64 {
        self.top.saturating_add(self.height as i64)
    }

    /// True when every pixel of the rectangle lies inside the image.
    pub fn is_within(&self, image_width: u32, image_height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right() <= image_width as i64
            && self.bottom() <= image_height as i64
    }

    /// True when at least one pixel of the rectangle lies inside the image.
    pub fn intersects(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.left < image_width as i64
            && self.top < image_height as i64
            && self.right() > 0
            && self.bottom() > 0
    }
}

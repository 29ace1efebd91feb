// THEORY:
// A `Patch` is the block of pixels sampled for one parking space. Like the
// `Pixel` it is built from, it is a "dumb" data container: it holds the pixels
// and knows how to summarise them, but it knows nothing about thresholds or
// where in the image it came from.
//
// The single summary that matters for occupancy is `average_luma`: the mean of
// each pixel's unweighted luma across every pixel in the patch. The sum is
// accumulated in integers so a uniformly painted patch of value `v` averages to
// exactly `v`, which keeps the strict `< threshold` comparison exact at the
// boundary.

pub mod patch {
    use crate::core_modules::pixel::pixel::{Luma, Pixel};

    /// A rectangular block of pixels sampled for a single region.
    #[derive(Debug, Clone)]
    pub struct Patch {
        /// The width of the sampled rectangle in pixels.
        pub width: u32,
        /// The height of the sampled rectangle in pixels.
        pub height: u32,
        /// The pixels that take part in the average, row-major.
        pub pixels: Vec<Pixel>,
        /// How many of `pixels` were read from inside the source image.
        pub in_bounds: usize,
    }

    impl Patch {
        pub fn new(width: u32, height: u32, pixels: Vec<Pixel>, in_bounds: usize) -> Self {
            Self {
                width,
                height,
                pixels,
                in_bounds,
            }
        }

        /// Mean unweighted luma over every pixel of the patch.
        /// An empty patch averages to 0.0.
        pub fn average_luma(&self) -> Luma {
            let num_pixels = self.pixels.len();
            if num_pixels == 0 {
                return 0.0;
            }

            let channel_total: u64 = self.pixels.iter().map(|pixel| pixel.sum() as u64).sum();
            channel_total as Luma / (3 * num_pixels as u64) as Luma
        }
    }
}

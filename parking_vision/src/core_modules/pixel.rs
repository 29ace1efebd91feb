// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the occupancy estimator. It
// is a "dumb" data container for a single RGBA pixel plus the single-pixel
// brightness heuristic the classifier relies on.
//
// Brightness here is *luma* in its simplest form: the unweighted mean of the
// red, green and blue channels on the 0..255 scale. Alpha never contributes.
// Perceptual weightings (Rec. 601 etc.) are deliberately not used so that a
// patch painted with a uniform grey value `v` averages to exactly `v`.
//
// Anything that needs more than one pixel (averaging over a rectangle,
// thresholding) belongs in `Patch` or the estimator.

pub mod pixel {
    pub type Byte = u8;
    pub type Bytes = Vec<Byte>;
    pub type Channel = Byte;
    pub type Luma = f64;
    pub type Sum = u16;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        /// What a canvas hands back when it is read outside its bounds.
        pub const TRANSPARENT_BLACK: Pixel = Pixel {
            red: 0,
            green: 0,
            blue: 0,
            alpha: 0,
        };

        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// Sum of the colour channels (0..=765). Alpha is excluded.
        pub fn sum(&self) -> Sum {
            self.red as Sum + self.green as Sum + self.blue as Sum
        }

        /// Unweighted luma: `(R + G + B) / 3`.
        pub fn luma(&self) -> Luma {
            self.sum() as Luma / 3.0
        }
    }

    impl From<[Byte; CHANNELS]> for Pixel {
        fn from(bytes: [Byte; CHANNELS]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
        }
    }

    impl From<image::Rgba<Byte>> for Pixel {
        fn from(rgba: image::Rgba<Byte>) -> Self {
            Pixel::from(rgba.0)
        }
    }

    impl From<Pixel> for Bytes {
        fn from(pixel: Pixel) -> Self {
            vec![pixel.red, pixel.green, pixel.blue, pixel.alpha]
        }
    }
}

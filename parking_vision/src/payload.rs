// THEORY:
// The `payload` module defines the result shape shared by local analysis and
// the remote detection backend:
// `{ image: <base64 JPEG>, free_spaces, occupied_spaces, total_spaces }`, or
// `{ error }` on failure.

use crate::error::PayloadError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionPayload {
    /// Annotated frame, base64-encoded JPEG.
    pub image: String,
    pub free_spaces: u32,
    pub occupied_spaces: u32,
    pub total_spaces: u32,
}

/// Either a result or the backend's error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadResponse {
    Error { error: String },
    Result(DetectionPayload),
}

impl DetectionPayload {
    /// Encodes `image` as JPEG and wraps it with the given counts.
    pub fn encode(
        image: &RgbaImage,
        free_spaces: u32,
        occupied_spaces: u32,
        jpeg_quality: u8,
    ) -> Result<Self, PayloadError> {
        Ok(Self {
            image: encode_jpeg_base64(image, jpeg_quality)?,
            free_spaces,
            occupied_spaces,
            total_spaces: free_spaces + occupied_spaces,
        })
    }

    /// Decodes the embedded JPEG back into an RGBA buffer.
    pub fn decode_image(&self) -> Result<RgbaImage, PayloadError> {
        let bytes = STANDARD.decode(self.image.as_bytes())?;
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)?;
        Ok(image.to_rgba8())
    }

    /// Raw JPEG bytes of the embedded image.
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(STANDARD.decode(self.image.as_bytes())?)
    }
}

/// JPEG has no alpha channel, so the image is flattened to RGB first.
pub fn encode_jpeg_base64(image: &RgbaImage, quality: u8) -> Result<String, PayloadError> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)?;
    Ok(STANDARD.encode(&buffer))
}

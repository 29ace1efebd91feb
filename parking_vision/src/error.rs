use crate::media::MediaKind;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with user input, detected before any work starts. The `Display`
/// text is the message shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please upload an image first.")]
    NoImage,
    #[error("Please mark some parking spaces first by clicking on the image.")]
    NoRegions,
    #[error("Parking space coordinates must be finite numbers.")]
    NonFiniteCoordinates,
    #[error("Please select a valid {expected} file.")]
    UnsupportedMediaType { expected: MediaKind, declared: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleError {
    #[error("rectangle extends past the image border")]
    PartiallyOutside,
    #[error("rectangle lies entirely outside the image")]
    FullyOutside,
    #[error("centre is not a finite number")]
    NonFiniteCentre,
    #[error("rectangle lies beyond the addressable pixel range")]
    CoordinatesOutOfRange,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("parking space #{} cannot be sampled: {source}", .index + 1)]
    RegionOutOfBounds {
        index: usize,
        #[source]
        source: SampleError,
    },
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("failed to encode annotated image")]
    Encode(#[from] image::ImageError),
    #[error("payload image is not valid base64")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("region store I/O failed at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored regions are not valid JSON")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error("failed to decode image")]
    Decode(#[from] image::ImageError),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

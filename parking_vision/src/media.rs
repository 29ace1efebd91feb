// THEORY:
// The `media` module decides whether an upload is the right kind of file. An
// upload is accepted or rejected purely on the media type it declares; file
// contents are never sniffed. It also formats byte counts for display.

use crate::error::ValidationError;
use std::fmt;
use std::path::Path;

/// The family of media an entry point accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/",
            MediaKind::Video => "video/",
        }
    }

    pub fn accepts(&self, declared_type: &str) -> bool {
        declared_type.starts_with(self.prefix())
    }

    pub fn check(&self, declared_type: &str) -> Result<(), ValidationError> {
        if self.accepts(declared_type) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedMediaType {
                expected: *self,
                declared: declared_type.to_string(),
            })
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// The media type a browser would declare for `path`, judged by extension.
pub fn declared_media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => UNKNOWN_MEDIA_TYPE,
    }
}

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size with base-1024 units and at most two decimals,
/// e.g. `1536 -> "1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

// THEORY:
// The `Session` is the explicit owner of everything the user is working on:
// the currently loaded image, the ordered list of marked regions, whether a
// remote detection run is active, and the notice board used to talk back to the
// user. Handlers receive the session rather than reaching for globals.
//
// Loading a new image keeps the marked regions only when the new image has the
// same dimensions as the old one. A different size means a different view, and
// coordinates marked on the old view would point at arbitrary pixels.

use crate::config::AppConfig;
use crate::core_modules::region::Region;
use crate::error::{SessionError, ValidationError};
use crate::estimator::{Analysis, OccupancyEstimator};
use crate::media::{MediaKind, declared_media_type, format_file_size};
use crate::notice::NoticeBoard;
use crate::store::RegionStore;
use image::RgbaImage;
use log::{info, warn};
use std::path::Path;

/// The decoded image regions are measured against.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub byte_size: u64,
    pub pixels: RgbaImage,
}

impl SourceImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn size_label(&self) -> String {
        format_file_size(self.byte_size)
    }
}

pub struct Session {
    image: Option<SourceImage>,
    regions: Vec<Region>,
    running: bool,
    estimator: OccupancyEstimator,
    store: RegionStore,
    notices: NoticeBoard,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_parts(
            OccupancyEstimator::new(config.estimator.clone(), config.annotation.clone()),
            config.region_store(),
            config.notice_board(),
        )
    }

    pub fn with_parts(estimator: OccupancyEstimator, store: RegionStore, notices: NoticeBoard) -> Self {
        Self {
            image: None,
            regions: Vec::new(),
            running: false,
            estimator,
            store,
            notices,
        }
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    pub fn estimator(&self) -> &OccupancyEstimator {
        &self.estimator
    }

    /// Reads and decodes an image file, declaring its type from the extension.
    pub fn load_image_file(&mut self, path: &Path) -> Result<&SourceImage, SessionError> {
        let declared = declared_media_type(path);
        if let Err(err) = MediaKind::Image.check(declared) {
            self.notices.error(err.to_string());
            return Err(err.into());
        }
        let bytes = std::fs::read(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_image_bytes(&name, declared, &bytes)
    }

    /// Accepts an upload whose declared media type must be `image/*`.
    pub fn load_image_bytes(
        &mut self,
        name: &str,
        declared_type: &str,
        bytes: &[u8],
    ) -> Result<&SourceImage, SessionError> {
        if let Err(err) = MediaKind::Image.check(declared_type) {
            self.notices.error(err.to_string());
            return Err(err.into());
        }
        let pixels = match image::load_from_memory(bytes) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(err) => {
                self.notices.error("Failed to decode image.");
                return Err(err.into());
            }
        };
        Ok(self.replace_image(SourceImage {
            name: name.to_string(),
            byte_size: bytes.len() as u64,
            pixels,
        }))
    }

    /// Makes `image` the active image, clearing regions if its size changed.
    pub fn replace_image(&mut self, image: SourceImage) -> &SourceImage {
        let mut cleared = 0;
        if let Some(previous) = &self.image {
            if previous.dimensions() != image.dimensions() && !self.regions.is_empty() {
                cleared = self.regions.len();
                warn!(
                    "image size changed from {:?} to {:?}; dropping {} marked parking spaces",
                    previous.dimensions(),
                    image.dimensions(),
                    cleared
                );
                self.regions.clear();
            }
        }

        info!(
            "loaded {} ({}, {}x{})",
            image.name,
            image.size_label(),
            image.pixels.width(),
            image.pixels.height()
        );
        if cleared > 0 {
            self.notices.success(format!(
                "Image uploaded successfully! Cleared {cleared} parking spaces marked on the previous image."
            ));
        } else {
            self.notices.success("Image uploaded successfully!");
        }
        self.image.insert(image)
    }

    /// Appends a region centred at `(x, y)` and returns the new total.
    pub fn mark_region(&mut self, x: f64, y: f64) -> Result<usize, SessionError> {
        let region = Region::new(x, y);
        if !region.is_finite() {
            let err = ValidationError::NonFiniteCoordinates;
            self.notices.error(err.to_string());
            return Err(err.into());
        }
        self.regions.push(region);
        self.notices.success(format!(
            "Parking space added at ({}, {})",
            x.round(),
            y.round()
        ));
        Ok(self.regions.len())
    }

    /// Runs the estimator over the current image and regions.
    pub fn analyze(&mut self) -> Result<Analysis, SessionError> {
        let image = self.image.as_ref().map(|source| &source.pixels);
        match self.estimator.estimate(image, &mut self.regions) {
            Ok(analysis) => {
                self.notices.success(format!(
                    "Analysis complete! Found {} free and {} occupied spaces.",
                    analysis.free, analysis.occupied
                ));
                Ok(analysis)
            }
            Err(err) => {
                self.notices.error(err.to_string());
                Err(err.into())
            }
        }
    }

    pub fn save_regions(&mut self) -> Result<(), SessionError> {
        if let Err(err) = self.store.save(&self.regions) {
            self.notices.error("Failed to save parking spaces.");
            return Err(err.into());
        }
        Ok(())
    }

    /// Replaces the in-memory regions with the stored ones, if any exist.
    /// Returns the number of regions held afterwards.
    pub fn restore_regions(&mut self) -> Result<usize, SessionError> {
        match self.store.load() {
            Ok(Some(regions)) => self.regions = regions,
            Ok(None) => {}
            Err(err) => {
                self.notices.error("Failed to restore parking spaces.");
                return Err(err.into());
            }
        }
        Ok(self.regions.len())
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

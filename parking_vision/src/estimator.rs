// THEORY:
// The `estimator` module is the top-level API of the occupancy engine. It turns
// one decoded image plus an ordered list of marked regions into a verdict per
// region, two counts and an annotated copy of the image.
//
// The flow is a single shot with no memory between calls:
// 1. Preconditions: an image must be loaded and at least one region marked.
// 2. Sampling: each region's rectangle is read from the *source* image.
// 3. Classification: mean luma below the threshold means occupied.
// 4. Commit and draw: verdicts are written onto the regions, tallied, and
//    painted onto a working copy of the image.
//
// Sampling for every region happens before any region is touched, so an error
// on region N leaves regions 0..N exactly as they were.

use crate::core_modules::annotator::{AnnotationStyle, annotate_region};
use crate::core_modules::region::{REGION_HEIGHT, REGION_WIDTH, Region, RegionBounds};
use crate::core_modules::sampler::{EdgePolicy, sample_patch};
use crate::error::{EstimateError, PayloadError, ValidationError};
use crate::payload::DetectionPayload;
use image::RgbaImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Mean luma strictly below this value classifies a region as occupied.
pub const DEFAULT_LUMA_THRESHOLD: f64 = 100.0;

/// Configuration for the OccupancyEstimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub luma_threshold: f64,
    pub region_width: u32,
    pub region_height: u32,
    pub edge_policy: EdgePolicy,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            luma_threshold: DEFAULT_LUMA_THRESHOLD,
            region_width: REGION_WIDTH,
            region_height: REGION_HEIGHT,
            edge_policy: EdgePolicy::default(),
        }
    }
}

/// Output of one estimator run.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Copy of the source image with every region outlined and labelled.
    pub annotated: RgbaImage,
    pub free: usize,
    pub occupied: usize,
}

impl Analysis {
    pub fn total(&self) -> usize {
        self.free + self.occupied
    }

    /// Packs the overlay and counts into the backend's result shape.
    pub fn to_payload(&self, jpeg_quality: u8) -> Result<DetectionPayload, PayloadError> {
        DetectionPayload::encode(
            &self.annotated,
            self.free as u32,
            self.occupied as u32,
            jpeg_quality,
        )
    }
}

/// The verdict for one region before it is committed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub bounds: RegionBounds,
    pub mean_luma: f64,
    pub occupied: bool,
}

pub struct OccupancyEstimator {
    config: EstimatorConfig,
    style: AnnotationStyle,
}

impl OccupancyEstimator {
    pub fn new(config: EstimatorConfig, style: AnnotationStyle) -> Self {
        Self { config, style }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Samples and classifies a single region without mutating it.
    pub fn classify(
        &self,
        image: &RgbaImage,
        index: usize,
        region: &Region,
    ) -> Result<Verdict, EstimateError> {
        let out_of_bounds = |source| EstimateError::RegionOutOfBounds { index, source };
        let bounds = region
            .bounds(self.config.region_width, self.config.region_height)
            .map_err(out_of_bounds)?;
        let patch = sample_patch(image, &bounds, self.config.edge_policy).map_err(out_of_bounds)?;
        let mean_luma = patch.average_luma();
        Ok(Verdict {
            bounds,
            mean_luma,
            occupied: mean_luma < self.config.luma_threshold,
        })
    }

    /// Classifies every region in order, updates their `occupied` flags and
    /// returns the annotated image with the counts.
    pub fn estimate(
        &self,
        image: Option<&RgbaImage>,
        regions: &mut [Region],
    ) -> Result<Analysis, EstimateError> {
        let image = image.ok_or(ValidationError::NoImage)?;
        if regions.is_empty() {
            return Err(ValidationError::NoRegions.into());
        }

        let verdicts = regions
            .iter()
            .enumerate()
            .map(|(index, region)| self.classify(image, index, region))
            .collect::<Result<Vec<_>, _>>()?;

        let mut annotated = image.clone();
        let mut free = 0;
        let mut occupied = 0;

        for (index, (region, verdict)) in regions.iter_mut().zip(verdicts).enumerate() {
            debug!(
                "region #{} at ({:.0}, {:.0}): mean luma {:.1} -> {}",
                index + 1,
                region.x,
                region.y,
                verdict.mean_luma,
                if verdict.occupied { "occupied" } else { "free" }
            );
            region.occupied = verdict.occupied;
            if verdict.occupied {
                occupied += 1;
            } else {
                free += 1;
            }
            annotate_region(&mut annotated, &verdict.bounds, verdict.occupied, index, &self.style);
        }

        Ok(Analysis {
            annotated,
            free,
            occupied,
        })
    }
}

impl Default for OccupancyEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default(), AnnotationStyle::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SampleError;
    use image::Rgba;

    /// 600x100 canvas split into three 200px columns painted with `values`.
    fn striped(values: [u8; 3]) -> RgbaImage {
        RgbaImage::from_fn(600, 100, |x, _| {
            let v = values[(x / 200) as usize];
            Rgba([v, v, v, 255])
        })
    }

    fn column_regions() -> Vec<Region> {
        vec![
            Region::new(100.0, 50.0),
            Region::new(300.0, 50.0),
            Region::new(500.0, 50.0),
        ]
    }

    #[test]
    fn threshold_is_strict() {
        let estimator = OccupancyEstimator::default();
        for (value, expected) in [(0u8, true), (99, true), (100, false), (101, false), (255, false)] {
            let image = RgbaImage::from_pixel(200, 100, Rgba([value, value, value, 255]));
            let mut regions = vec![Region::new(100.0, 50.0)];
            estimator.estimate(Some(&image), &mut regions).unwrap();
            assert_eq!(regions[0].occupied, expected, "luma {value}");
        }
    }

    #[test]
    fn black_white_black_counts() {
        let estimator = OccupancyEstimator::default();
        let image = striped([0, 255, 0]);
        let mut regions = column_regions();

        let analysis = estimator.estimate(Some(&image), &mut regions).unwrap();

        assert_eq!((analysis.free, analysis.occupied), (1, 2));
        assert_eq!(analysis.total(), regions.len());
        let flags: Vec<bool> = regions.iter().map(|r| r.occupied).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let estimator = OccupancyEstimator::default();
        let image = striped([30, 220, 99]);
        let mut regions = column_regions();

        let first = estimator.estimate(Some(&image), &mut regions).unwrap();
        let first_flags = regions.clone();
        let second = estimator.estimate(Some(&image), &mut regions).unwrap();

        assert_eq!((first.free, first.occupied), (second.free, second.occupied));
        assert_eq!(first_flags, regions);
        assert_eq!(first.annotated, second.annotated);
    }

    #[test]
    fn source_image_is_left_untouched() {
        let estimator = OccupancyEstimator::default();
        let image = striped([0, 255, 0]);
        let original = image.clone();
        let mut regions = column_regions();
        let analysis = estimator.estimate(Some(&image), &mut regions).unwrap();
        assert_eq!(image, original);
        assert_ne!(analysis.annotated, original);
    }

    #[test]
    fn missing_image_short_circuits() {
        let estimator = OccupancyEstimator::default();
        let mut regions = vec![Region {
            x: 10.0,
            y: 10.0,
            occupied: true,
        }];
        let err = estimator.estimate(None, &mut regions).unwrap_err();
        assert_eq!(err, EstimateError::Validation(ValidationError::NoImage));
        assert!(regions[0].occupied);
    }

    #[test]
    fn empty_region_list_short_circuits() {
        let estimator = OccupancyEstimator::default();
        let image = striped([0, 0, 0]);
        let err = estimator.estimate(Some(&image), &mut []).unwrap_err();
        assert_eq!(err, EstimateError::Validation(ValidationError::NoRegions));
    }

    #[test]
    fn failed_sampling_mutates_nothing() {
        let estimator = OccupancyEstimator::new(
            EstimatorConfig {
                edge_policy: EdgePolicy::Reject,
                ..EstimatorConfig::default()
            },
            AnnotationStyle::default(),
        );
        let image = striped([0, 0, 0]);
        let mut regions = vec![Region::new(100.0, 50.0), Region::new(5.0, 5.0)];

        let err = estimator.estimate(Some(&image), &mut regions).unwrap_err();

        assert_eq!(
            err,
            EstimateError::RegionOutOfBounds {
                index: 1,
                source: SampleError::PartiallyOutside
            }
        );
        assert_eq!(err.to_string(), "parking space #2 cannot be sampled: rectangle extends past the image border");
        assert!(regions.iter().all(|r| !r.occupied));
    }

    #[test]
    fn unaddressable_centres_are_reported_not_sampled() {
        let padded = OccupancyEstimator::new(
            EstimatorConfig {
                edge_policy: EdgePolicy::ZeroPad,
                ..EstimatorConfig::default()
            },
            AnnotationStyle::default(),
        );
        let image = striped([0, 0, 0]);

        let mut regions = vec![Region::new(100.0, 50.0), Region::new(1e300, 50.0)];
        let err = padded.estimate(Some(&image), &mut regions).unwrap_err();
        assert_eq!(
            err,
            EstimateError::RegionOutOfBounds {
                index: 1,
                source: SampleError::CoordinatesOutOfRange
            }
        );
        assert!(regions.iter().all(|r| !r.occupied));

        let mut regions = vec![Region::new(f64::NAN, f64::NAN)];
        let err = OccupancyEstimator::default()
            .estimate(Some(&image), &mut regions)
            .unwrap_err();
        assert_eq!(
            err,
            EstimateError::RegionOutOfBounds {
                index: 0,
                source: SampleError::NonFiniteCentre
            }
        );
        assert!(!regions[0].occupied);
    }

    #[test]
    fn zero_padding_can_flip_an_edge_region() {
        let image = RgbaImage::from_pixel(200, 100, Rgba([150, 150, 150, 255]));
        let corner = || vec![Region::new(0.0, 0.0)];

        let clamped = OccupancyEstimator::default();
        let mut regions = corner();
        clamped.estimate(Some(&image), &mut regions).unwrap();
        assert!(!regions[0].occupied);

        let padded = OccupancyEstimator::new(
            EstimatorConfig {
                edge_policy: EdgePolicy::ZeroPad,
                ..EstimatorConfig::default()
            },
            AnnotationStyle::default(),
        );
        let mut regions = corner();
        padded.estimate(Some(&image), &mut regions).unwrap();
        assert!(regions[0].occupied);
    }

    #[test]
    fn analysis_converts_to_backend_payload() {
        let estimator = OccupancyEstimator::default();
        let image = striped([0, 255, 0]);
        let mut regions = column_regions();
        let analysis = estimator.estimate(Some(&image), &mut regions).unwrap();

        let payload = analysis.to_payload(80).unwrap();
        assert_eq!(payload.free_spaces, 1);
        assert_eq!(payload.occupied_spaces, 2);
        assert_eq!(payload.total_spaces, 3);
        assert_eq!(payload.decode_image().unwrap().dimensions(), (600, 100));
    }
}

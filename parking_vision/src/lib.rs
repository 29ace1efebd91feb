// THEORY:
// This file is the main entry point for the `parking_vision` library crate.
// It exposes the public API consumed by the remote client crate and the
// `parking_tester` CLI.
//
// The high-level interface is the `OccupancyEstimator` (one-shot image ->
// classified regions + annotated overlay) and the `Session` that owns the
// current image, the ordered list of marked regions and the notice board.
// The pixel-level machinery lives in `core_modules` and is reachable but not
// required for ordinary use.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod estimator;
pub mod media;
pub mod notice;
pub mod payload;
pub mod session;
pub mod store;

pub use config::AppConfig;
pub use core_modules::region::Region;
pub use estimator::{Analysis, EstimatorConfig, OccupancyEstimator};
pub use payload::{DetectionPayload, PayloadResponse};
pub use session::{Session, SourceImage};

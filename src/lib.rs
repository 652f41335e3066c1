//! Fitting Room - Wasm Core
//!
//! Body pose tracking for virtual garment try-on: landmark geometry, body
//! measurements, garment placement and the session that drives an external
//! pose estimator from a video element.

pub mod config;
pub mod error;
pub mod geometry;
pub mod keypoints;
pub mod landmark;
pub mod measurements;
pub mod placement;
pub mod scene;
pub mod session;
pub mod smoothing;
pub mod stabilizer;
pub mod state;
pub mod tracker;

#[cfg(target_arch = "wasm32")]
pub mod web;

use wasm_bindgen::prelude::*;

pub use config::{EstimatorConfig, QualityPreset, TrackingConfig};
pub use error::{Result, TrackingError};
pub use glam::Vec3;
pub use keypoints::{extract_key_points, BodyPart, KeyPoints};
pub use landmark::{Landmark, LandmarkId, LandmarkSlice};
pub use measurements::{compute_measurements, BodyMeasurements};
pub use placement::{get_placement, GarmentCategory, PlacementTransform};
pub use scene::{GarmentEntry, GarmentRig, RenderScene, SceneProjection, SceneTransform};
pub use session::{
    EstimatorFactory, FrameOutcome, FrameTicket, PoseEstimator, PoseSnapshot, RawPoseResults,
    SessionState, Subscription, TrackingSession, VideoSource,
};
pub use stabilizer::MeasurementStabilizer;
pub use tracker::{PoseEvent, PoseTracker, TrackerOptions};

/// Route `log` output to the browser console and install the panic hook.
///
/// Safe to call more than once.
#[wasm_bindgen]
pub fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            console_error_panic_hook::set_once();
            console_log::init_with_level(log::Level::Info).ok();
        } else {
            // Native hosts install their own logger
        }
    }
}

/// Log to browser console
#[wasm_bindgen]
pub fn log(msg: &str) {
    log::info!("{}", msg);
}

//! Body landmarks as emitted by the pose estimator.
//!
//! Coordinates are normalized to the camera frame: `x`/`y` roughly in [0, 1]
//! with `y` pointing down, `z` relative depth (hips ≈ 0, smaller is closer).

pub mod id;

pub use id::LandmarkId;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A single tracked body point with its confidence
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    /// Estimator confidence in [0, 1]
    #[serde(default)]
    pub visibility: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn is_visible(&self, min_visibility: f32) -> bool {
        self.visibility >= min_visibility
    }
}

/// Named access into an ordered landmark sequence
pub trait LandmarkSlice {
    /// Landmark for a named body point, if the sequence is long enough
    fn landmark(&self, id: LandmarkId) -> Option<&Landmark>;

    /// True when the full estimator topology is present
    fn is_complete(&self) -> bool;

    /// Mean per-landmark visibility, 0 for an empty sequence
    fn mean_visibility(&self) -> f32;
}

impl LandmarkSlice for [Landmark] {
    #[inline]
    fn landmark(&self, id: LandmarkId) -> Option<&Landmark> {
        self.get(id.index())
    }

    fn is_complete(&self) -> bool {
        self.len() >= LandmarkId::COUNT
    }

    fn mean_visibility(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let total: f32 = self.iter().map(|l| l.visibility).sum();
        total / self.len() as f32
    }
}

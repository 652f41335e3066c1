//! Per-garment anchor transforms from key points.
//!
//! Garments are authored at roughly half their on-body width, hence the `×2`
//! scale factor. Rotation is about the camera viewing axis only.

use crate::geometry::{distance, image_plane_angle};
use crate::keypoints::{Hips, KeyPoints, Shoulders};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Ratio between on-body width and a garment mesh's authored width
pub const GARMENT_WIDTH_FACTOR: f32 = 2.0;

/// Closed set of garment categories that drive placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GarmentCategory {
    Shirt,
    Top,
    Pants,
    Jeans,
    Dress,
    /// Anything else falls back to a neutral chest anchor
    #[default]
    Other,
}

impl GarmentCategory {
    /// Parse a catalog category name; unknown names map to `Other`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "shirt" => Self::Shirt,
            "top" => Self::Top,
            "pants" => Self::Pants,
            "jeans" => Self::Jeans,
            "dress" => Self::Dress,
            _ => Self::Other,
        }
    }
}

/// Where to draw a garment, in normalized camera space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementTransform {
    #[serde(with = "crate::geometry::xyz")]
    pub position: Vec3,
    /// Uniform scale
    pub scale: f32,
    /// Radians about the viewing axis
    pub rotation: f32,
}

impl PlacementTransform {
    pub const fn new(position: Vec3, scale: f32, rotation: f32) -> Self {
        Self {
            position,
            scale,
            rotation,
        }
    }
}

fn shoulder_width(shoulders: &Shoulders) -> f32 {
    distance(Some(&shoulders.left), Some(&shoulders.right))
}

fn hip_width(hips: &Hips) -> f32 {
    distance(Some(&hips.left), Some(&hips.right))
}

fn shoulder_rotation(shoulders: &Shoulders) -> f32 {
    image_plane_angle(&shoulders.left, &shoulders.right)
}

fn hip_rotation(hips: &Hips) -> f32 {
    image_plane_angle(&hips.left, &hips.right)
}

/// Mean of shoulder and hip angles
pub fn torso_rotation(key_points: &KeyPoints) -> f32 {
    (shoulder_rotation(&key_points.shoulders) + hip_rotation(&key_points.hips)) / 2.0
}

/// Resolve the placement for a garment category.
///
/// Returns `None` when there is no detected pose.
pub fn get_placement(
    key_points: Option<&KeyPoints>,
    category: GarmentCategory,
) -> Option<PlacementTransform> {
    let kp = key_points?;

    let placement = match category {
        GarmentCategory::Shirt | GarmentCategory::Top => PlacementTransform::new(
            kp.chest.center,
            shoulder_width(&kp.shoulders) * GARMENT_WIDTH_FACTOR,
            shoulder_rotation(&kp.shoulders),
        ),
        GarmentCategory::Pants | GarmentCategory::Jeans => PlacementTransform::new(
            kp.hips.center,
            hip_width(&kp.hips) * GARMENT_WIDTH_FACTOR,
            hip_rotation(&kp.hips),
        ),
        GarmentCategory::Dress => PlacementTransform::new(
            (kp.chest.center + kp.hips.center) * 0.5,
            shoulder_width(&kp.shoulders).max(hip_width(&kp.hips)) * GARMENT_WIDTH_FACTOR,
            torso_rotation(kp),
        ),
        GarmentCategory::Other => PlacementTransform::new(kp.chest.center, 1.0, 0.0),
    };

    Some(placement)
}

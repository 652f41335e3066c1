//! Semantic grouping of landmarks into the zones garment placement anchors to.

use crate::geometry::midpoint;
use crate::landmark::{Landmark, LandmarkId, LandmarkSlice};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Downward offset (normalized image units) from the shoulder line to the chest anchor
pub const CHEST_OFFSET_Y: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shoulders {
    pub left: Landmark,
    pub right: Landmark,
    #[serde(with = "crate::geometry::xyz")]
    pub center: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chest {
    #[serde(with = "crate::geometry::xyz")]
    pub center: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hips {
    pub left: Landmark,
    pub right: Landmark,
    #[serde(with = "crate::geometry::xyz")]
    pub center: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arms {
    pub left_elbow: Landmark,
    pub right_elbow: Landmark,
    pub left_wrist: Landmark,
    pub right_wrist: Landmark,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legs {
    pub left_knee: Landmark,
    pub right_knee: Landmark,
    pub left_ankle: Landmark,
    pub right_ankle: Landmark,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoints {
    pub shoulders: Shoulders,
    pub chest: Chest,
    pub hips: Hips,
    pub arms: Arms,
    pub legs: Legs,
}

/// Body regions that can be checked for visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Shoulders,
    Hips,
    /// Checked at the wrists
    Arms,
    /// Checked at the knees
    Legs,
}

impl BodyPart {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "shoulders" => Some(Self::Shoulders),
            "hips" => Some(Self::Hips),
            "arms" => Some(Self::Arms),
            "legs" => Some(Self::Legs),
            _ => None,
        }
    }
}

impl KeyPoints {
    /// Both sides of the body part meet the visibility threshold
    pub fn is_body_part_visible(&self, part: BodyPart, min_visibility: f32) -> bool {
        let (left, right) = match part {
            BodyPart::Shoulders => (&self.shoulders.left, &self.shoulders.right),
            BodyPart::Hips => (&self.hips.left, &self.hips.right),
            BodyPart::Arms => (&self.arms.left_wrist, &self.arms.right_wrist),
            BodyPart::Legs => (&self.legs.left_knee, &self.legs.right_knee),
        };
        left.is_visible(min_visibility) && right.is_visible(min_visibility)
    }
}

/// Group a landmark set into key points.
///
/// Returns `None` when the set is shorter than the estimator topology.
pub fn extract_key_points(landmarks: &[Landmark]) -> Option<KeyPoints> {
    if !landmarks.is_complete() {
        return None;
    }
    let get = |id: LandmarkId| landmarks.landmark(id).copied();

    let left_shoulder = get(LandmarkId::LeftShoulder)?;
    let right_shoulder = get(LandmarkId::RightShoulder)?;
    let shoulder_center = midpoint(&left_shoulder, &right_shoulder);

    let left_hip = get(LandmarkId::LeftHip)?;
    let right_hip = get(LandmarkId::RightHip)?;

    Some(KeyPoints {
        shoulders: Shoulders {
            left: left_shoulder,
            right: right_shoulder,
            center: shoulder_center,
        },
        chest: Chest {
            center: shoulder_center + Vec3::new(0.0, CHEST_OFFSET_Y, 0.0),
        },
        hips: Hips {
            left: left_hip,
            right: right_hip,
            center: midpoint(&left_hip, &right_hip),
        },
        arms: Arms {
            left_elbow: get(LandmarkId::LeftElbow)?,
            right_elbow: get(LandmarkId::RightElbow)?,
            left_wrist: get(LandmarkId::LeftWrist)?,
            right_wrist: get(LandmarkId::RightWrist)?,
        },
        legs: Legs {
            left_knee: get(LandmarkId::LeftKnee)?,
            right_knee: get(LandmarkId::RightKnee)?,
            left_ankle: get(LandmarkId::LeftAnkle)?,
            right_ankle: get(LandmarkId::RightAnkle)?,
        },
    })
}

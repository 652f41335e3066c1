//! Body measurements derived from a full landmark set.
//!
//! Values are in the estimator's normalized units, not physical units.

use crate::geometry::{distance, planar_midpoint, ratio};
use crate::landmark::{Landmark, LandmarkId, LandmarkSlice};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMeasurements {
    pub shoulder_width: f32,
    pub hip_width: f32,
    pub torso_height: f32,
    pub arm_span: f32,
    pub height: f32,
    /// `shoulder_width / hip_width`, unguarded
    pub shoulder_to_hip_ratio: f32,
    /// `arm_span / height`, unguarded
    pub arm_span_to_height_ratio: f32,
}

impl BodyMeasurements {
    pub const FIELD_COUNT: usize = 7;

    /// Named field values in declaration order
    pub fn fields(&self) -> [(&'static str, f32); Self::FIELD_COUNT] {
        [
            ("shoulderWidth", self.shoulder_width),
            ("hipWidth", self.hip_width),
            ("torsoHeight", self.torso_height),
            ("armSpan", self.arm_span),
            ("height", self.height),
            ("shoulderToHipRatio", self.shoulder_to_hip_ratio),
            ("armSpanToHeightRatio", self.arm_span_to_height_ratio),
        ]
    }

    /// Inverse of [`BodyMeasurements::fields`]
    pub fn from_values(values: [f32; Self::FIELD_COUNT]) -> Self {
        let [shoulder_width, hip_width, torso_height, arm_span, height, shoulder_to_hip_ratio, arm_span_to_height_ratio] =
            values;
        Self {
            shoulder_width,
            hip_width,
            torso_height,
            arm_span,
            height,
            shoulder_to_hip_ratio,
            arm_span_to_height_ratio,
        }
    }
}

/// Compute measurements from a landmark set.
///
/// Returns `None` when the set is shorter than the estimator topology.
pub fn compute_measurements(landmarks: &[Landmark]) -> Option<BodyMeasurements> {
    if !landmarks.is_complete() {
        return None;
    }

    let nose = landmarks.landmark(LandmarkId::Nose)?;
    let left_shoulder = landmarks.landmark(LandmarkId::LeftShoulder)?;
    let right_shoulder = landmarks.landmark(LandmarkId::RightShoulder)?;
    let left_hip = landmarks.landmark(LandmarkId::LeftHip)?;
    let right_hip = landmarks.landmark(LandmarkId::RightHip)?;
    let left_wrist = landmarks.landmark(LandmarkId::LeftWrist)?;
    let right_wrist = landmarks.landmark(LandmarkId::RightWrist)?;
    let left_ankle = landmarks.landmark(LandmarkId::LeftAnkle)?;
    let right_ankle = landmarks.landmark(LandmarkId::RightAnkle)?;

    let shoulder_width = distance(Some(left_shoulder), Some(right_shoulder));
    let hip_width = distance(Some(left_hip), Some(right_hip));

    // Torso and height use image-plane midpoints
    let shoulder_mid = planar_midpoint(left_shoulder, right_shoulder);
    let hip_mid = planar_midpoint(left_hip, right_hip);
    let torso_height = distance(Some(&shoulder_mid), Some(&hip_mid));

    let arm_span = distance(Some(left_wrist), Some(right_wrist));

    let ankle_mid = planar_midpoint(left_ankle, right_ankle);
    let height = distance(Some(nose), Some(&ankle_mid));

    Some(BodyMeasurements {
        shoulder_width,
        hip_width,
        torso_height,
        arm_span,
        height,
        shoulder_to_hip_ratio: ratio(shoulder_width, hip_width),
        arm_span_to_height_ratio: ratio(arm_span, height),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::standing_body;
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_standing_body_measurements() {
        let m = compute_measurements(&standing_body()).unwrap();

        assert!(approx_eq(m.shoulder_width, 0.2));
        assert!(approx_eq(m.hip_width, 0.1));
        assert!(approx_eq(m.torso_height, 0.3));
        assert!(approx_eq(m.arm_span, 0.4));
        assert!(approx_eq(m.height, 0.8));
        assert!(approx_eq(m.shoulder_to_hip_ratio, 2.0));
        assert!(approx_eq(m.arm_span_to_height_ratio, 0.5));
    }

    #[test]
    fn test_too_few_landmarks() {
        assert!(compute_measurements(&[]).is_none());
        assert!(compute_measurements(&vec![Landmark::default(); 10]).is_none());
        assert!(compute_measurements(&vec![Landmark::default(); 32]).is_none());
    }

    #[test]
    fn test_random_sets_are_non_negative() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let landmarks: Vec<Landmark> = (0..LandmarkId::COUNT)
                .map(|_| {
                    Landmark::new(
                        rng.random_range(0.0..1.0),
                        rng.random_range(0.0..1.0),
                        rng.random_range(-0.5..0.5),
                        rng.random_range(0.0..1.0),
                    )
                })
                .collect();
            let m = compute_measurements(&landmarks).unwrap();
            assert!(m.shoulder_width >= 0.0);
            assert!(m.hip_width >= 0.0);
            assert!(m.torso_height >= 0.0);
            assert!(m.arm_span >= 0.0);
            assert!(m.height >= 0.0);
        }
    }

    #[test]
    fn test_coincident_shoulders() {
        let mut landmarks = standing_body();
        landmarks[LandmarkId::RightShoulder.index()] = landmarks[LandmarkId::LeftShoulder.index()];
        let m = compute_measurements(&landmarks).unwrap();
        assert_eq!(m.shoulder_width, 0.0);
    }

    #[test]
    fn test_degenerate_ratios_are_preserved() {
        let mut landmarks = standing_body();
        landmarks[LandmarkId::RightHip.index()] = landmarks[LandmarkId::LeftHip.index()];
        let m = compute_measurements(&landmarks).unwrap();
        assert_eq!(m.hip_width, 0.0);
        assert!(m.shoulder_to_hip_ratio.is_infinite());
    }

    #[test]
    fn test_fields_roundtrip_order() {
        let m = compute_measurements(&standing_body()).unwrap();
        let values = m.fields().map(|(_, v)| v);
        assert_eq!(BodyMeasurements::from_values(values), m);
        assert_eq!(m.fields()[0].0, "shoulderWidth");
    }
}

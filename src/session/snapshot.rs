use serde::{Deserialize, Serialize};

use crate::keypoints::{extract_key_points, KeyPoints};
use crate::landmark::{Landmark, LandmarkSlice};
use crate::measurements::{compute_measurements, BodyMeasurements};

/// Raw per-frame output of the external pose estimator
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoseResults {
    #[serde(default)]
    pub pose_landmarks: Option<Vec<Landmark>>,
    #[serde(default)]
    pub pose_world_landmarks: Option<Vec<Landmark>>,
}

impl RawPoseResults {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            pose_landmarks: Some(landmarks),
            pose_world_landmarks: None,
        }
    }

    /// Results for a frame in which no body was found
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One processed frame of pose tracking output.
///
/// Built fresh for every estimator result and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseSnapshot {
    pub landmarks: Vec<Landmark>,
    pub world_landmarks: Vec<Landmark>,
    /// Mean per-landmark visibility, 0 when nothing was detected
    pub visibility: f32,
    pub is_detected: bool,
    /// Capture time in milliseconds
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<BodyMeasurements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_points: Option<KeyPoints>,
}

impl PoseSnapshot {
    pub fn from_results(raw: RawPoseResults, timestamp: f64) -> Self {
        let landmarks = raw.pose_landmarks.unwrap_or_default();
        let world_landmarks = raw.pose_world_landmarks.unwrap_or_default();
        let is_detected = !landmarks.is_empty();

        let (measurements, key_points) = if is_detected {
            (
                compute_measurements(&landmarks),
                extract_key_points(&landmarks),
            )
        } else {
            (None, None)
        };

        Self {
            visibility: landmarks.mean_visibility(),
            landmarks,
            world_landmarks,
            is_detected,
            timestamp,
            measurements,
            key_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::LandmarkId;
    use crate::measurements::fixtures::standing_body;

    #[test]
    fn test_empty_results() {
        let snapshot = PoseSnapshot::from_results(RawPoseResults::empty(), 10.0);
        assert!(!snapshot.is_detected);
        assert_eq!(snapshot.visibility, 0.0);
        assert!(snapshot.measurements.is_none());
        assert!(snapshot.key_points.is_none());
        assert_eq!(snapshot.timestamp, 10.0);
    }

    #[test]
    fn test_partial_landmarks_detected_without_derivations() {
        let landmarks = vec![Landmark::new(0.5, 0.5, 0.0, 0.8); 10];
        let snapshot = PoseSnapshot::from_results(RawPoseResults::new(landmarks), 0.0);
        assert!(snapshot.is_detected);
        assert!((snapshot.visibility - 0.8).abs() < 1e-6);
        assert!(snapshot.measurements.is_none());
        assert!(snapshot.key_points.is_none());
    }

    #[test]
    fn test_full_body() {
        let snapshot = PoseSnapshot::from_results(RawPoseResults::new(standing_body()), 0.0);
        assert!(snapshot.is_detected);
        assert_eq!(snapshot.visibility, 1.0);
        assert_eq!(snapshot.landmarks.len(), LandmarkId::COUNT);
        assert!(snapshot.measurements.is_some());
        assert!(snapshot.key_points.is_some());
    }

    #[test]
    fn test_deserialize_estimator_output() {
        let json = r#"{
            "poseLandmarks": [{"x": 0.1, "y": 0.2, "z": -0.1, "visibility": 0.9}],
            "poseWorldLandmarks": [{"x": 0.0, "y": 0.5}]
        }"#;
        let raw: RawPoseResults = serde_json::from_str(json).unwrap();
        assert_eq!(raw.pose_landmarks.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            raw.pose_world_landmarks.unwrap()[0],
            Landmark::new(0.0, 0.5, 0.0, 0.0)
        );

        let raw: RawPoseResults = serde_json::from_str("{}").unwrap();
        assert_eq!(raw, RawPoseResults::empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let snapshot = PoseSnapshot::from_results(RawPoseResults::new(standing_body()), 1.0);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["isDetected"], true);
        assert!(value.get("worldLandmarks").is_some());
        assert!(value.get("keyPoints").is_some());
        assert!(value["measurements"].get("shoulderWidth").is_some());
    }

    #[test]
    fn test_key_point_centers_are_objects() {
        let snapshot = PoseSnapshot::from_results(RawPoseResults::new(standing_body()), 1.0);
        let value = serde_json::to_value(&snapshot).unwrap();
        let center = &value["keyPoints"]["shoulders"]["center"];
        assert!((center["x"].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert!(center["y"].is_number());
        assert!(value["keyPoints"]["chest"]["center"]["x"].is_number());
        assert!(value["keyPoints"]["hips"]["center"]["x"].is_number());
    }
}

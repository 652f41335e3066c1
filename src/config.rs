//! Tracking configuration.
//!
//! Every field has a default, so a partial JSON object (or an empty one) is a
//! valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::stabilizer::DEFAULT_WINDOW;

/// Options handed to the external pose estimator on construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimatorConfig {
    /// 0, 1 or 2; higher is more accurate and slower
    pub model_complexity: u8,
    pub smooth_landmarks: bool,
    pub enable_segmentation: bool,
    pub smooth_segmentation: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            model_complexity: 1,
            smooth_landmarks: true,
            enable_segmentation: false,
            smooth_segmentation: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model_complexity > 2 {
            return Err(TrackingError::Config(format!(
                "modelComplexity must be 0, 1 or 2, got {}",
                self.model_complexity
            )));
        }
        check_unit("minDetectionConfidence", self.min_detection_confidence)?;
        check_unit("minTrackingConfidence", self.min_tracking_confidence)?;
        Ok(())
    }
}

/// Performance presets trading accuracy for frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    Medium,
    High,
}

impl QualityPreset {
    pub fn model_complexity(self) -> u8 {
        match self {
            QualityPreset::Low => 0,
            QualityPreset::Medium => 1,
            QualityPreset::High => 2,
        }
    }

    pub fn frame_rate(self) -> f32 {
        match self {
            QualityPreset::Low => 24.0,
            QualityPreset::Medium => 30.0,
            QualityPreset::High => 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingConfig {
    pub estimator: EstimatorConfig,
    /// Cap on frames forwarded to the estimator per second; `None` is uncapped
    pub max_frame_rate: Option<f32>,
    /// Aggregate visibility required to report a pose as detected
    pub min_confidence: f32,
    /// Measurement stabilizer window in samples
    pub stabilizer_window: usize,
    /// EMA weight of the newest placement; `None` disables smoothing
    pub placement_smoothing: Option<f32>,
    /// Mirror placements horizontally (front-facing camera)
    pub mirror_x: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            max_frame_rate: None,
            min_confidence: 0.5,
            stabilizer_window: DEFAULT_WINDOW,
            placement_smoothing: None,
            mirror_x: false,
        }
    }
}

impl TrackingConfig {
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self::default().with_preset(preset)
    }

    /// Apply a quality preset's model complexity and frame-rate cap
    pub fn with_preset(self, preset: QualityPreset) -> Self {
        Self {
            estimator: EstimatorConfig {
                model_complexity: preset.model_complexity(),
                ..self.estimator
            },
            max_frame_rate: Some(preset.frame_rate()),
            ..self
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrackingConfig = serde_json::from_str(json)
            .map_err(|e| TrackingError::Config(format!("Failed to parse JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TrackingError::Config(format!("Failed to serialize: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.estimator.validate()?;
        check_unit("minConfidence", self.min_confidence)?;
        if let Some(rate) = self.max_frame_rate {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(TrackingError::Config(format!(
                    "maxFrameRate must be positive, got {}",
                    rate
                )));
            }
        }
        if self.stabilizer_window == 0 {
            return Err(TrackingError::Config(
                "stabilizerWindow must be at least 1".to_string(),
            ));
        }
        if let Some(alpha) = self.placement_smoothing {
            check_unit("placementSmoothing", alpha)?;
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TrackingError::Config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = TrackingConfig::from_json("{}").unwrap();
        assert_eq!(config, TrackingConfig::default());
        assert_eq!(config.estimator.model_complexity, 1);
        assert!(config.estimator.smooth_landmarks);
        assert_eq!(config.estimator.min_detection_confidence, 0.5);
        assert_eq!(config.estimator.min_tracking_confidence, 0.5);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "minConfidence": 0.6,
            "estimator": { "modelComplexity": 2 },
            "placementSmoothing": 0.4
        }"#;
        let config = TrackingConfig::from_json(json).unwrap();
        assert_eq!(config.min_confidence, 0.6);
        assert_eq!(config.estimator.model_complexity, 2);
        assert!(config.estimator.smooth_landmarks);
        assert_eq!(config.placement_smoothing, Some(0.4));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = TrackingConfig::from_json(r#"{"estimator": {"modelComplexity": 3}}"#);
        assert!(matches!(err, Err(TrackingError::Config(_))));

        let err = TrackingConfig::from_json(r#"{"minConfidence": 1.5}"#);
        assert!(matches!(err, Err(TrackingError::Config(_))));

        let err = TrackingConfig::from_json(r#"{"maxFrameRate": 0}"#);
        assert!(matches!(err, Err(TrackingError::Config(_))));

        let err = TrackingConfig::from_json("not json");
        assert!(matches!(err, Err(TrackingError::Config(_))));
    }

    #[test]
    fn test_presets() {
        let low = TrackingConfig::from_preset(QualityPreset::Low);
        assert_eq!(low.estimator.model_complexity, 0);
        assert_eq!(low.max_frame_rate, Some(24.0));

        let high = TrackingConfig::from_preset(QualityPreset::High);
        assert_eq!(high.estimator.model_complexity, 2);
        assert_eq!(high.max_frame_rate, Some(60.0));
        assert!(high.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = TrackingConfig::from_preset(QualityPreset::Medium);
        let json = config.to_json_string().unwrap();
        assert!(json.contains("modelComplexity"));
        assert_eq!(TrackingConfig::from_json(&json).unwrap(), config);
    }
}

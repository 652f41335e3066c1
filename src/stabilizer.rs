//! Sliding-window averaging of body measurements for jitter-free display.

use std::collections::VecDeque;

use crate::measurements::BodyMeasurements;
use crate::session::PoseSnapshot;

/// About one second of samples at 30 fps
pub const DEFAULT_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSample {
    pub measurements: BodyMeasurements,
    /// Capture time in milliseconds
    pub timestamp: f64,
}

/// Fixed-size window of recent measurement samples, oldest evicted first
#[derive(Debug, Clone)]
pub struct MeasurementStabilizer {
    window: usize,
    samples: VecDeque<MeasurementSample>,
}

impl Default for MeasurementStabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl MeasurementStabilizer {
    /// A window of zero is treated as one
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, measurements: BodyMeasurements, timestamp: f64) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(MeasurementSample {
            measurements,
            timestamp,
        });
    }

    /// Record a snapshot's measurements, if it carries any
    pub fn observe(&mut self, snapshot: &PoseSnapshot) -> bool {
        match snapshot.measurements {
            Some(measurements) => {
                self.push(measurements, snapshot.timestamp);
                true
            }
            None => false,
        }
    }

    pub fn latest_timestamp(&self) -> Option<f64> {
        self.samples.back().map(|s| s.timestamp)
    }

    pub fn samples(&self) -> impl Iterator<Item = &MeasurementSample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Field-wise arithmetic mean over the window, `None` when empty
    pub fn averaged(&self) -> Option<BodyMeasurements> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sums = [0.0f64; BodyMeasurements::FIELD_COUNT];
        for sample in &self.samples {
            for (sum, (_, value)) in sums.iter_mut().zip(sample.measurements.fields()) {
                *sum += f64::from(value);
            }
        }

        let n = self.samples.len() as f64;
        Some(BodyMeasurements::from_values(sums.map(|s| (s / n) as f32)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(shoulder_width: f32) -> BodyMeasurements {
        BodyMeasurements {
            shoulder_width,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_has_no_average() {
        let stabilizer = MeasurementStabilizer::default();
        assert!(stabilizer.averaged().is_none());
        assert!(stabilizer.latest_timestamp().is_none());
    }

    #[test]
    fn test_sliding_window_eviction() {
        let mut stabilizer = MeasurementStabilizer::new(30);
        for i in 1..=35 {
            stabilizer.push(sample(i as f32), i as f64 * 33.0);
        }

        assert_eq!(stabilizer.len(), 30);
        let avg = stabilizer.averaged().unwrap();
        // mean of 6..=35
        assert!((avg.shoulder_width - 20.5).abs() < 1e-5);
        assert_eq!(stabilizer.samples().next().unwrap().measurements.shoulder_width, 6.0);
        assert_eq!(stabilizer.latest_timestamp(), Some(35.0 * 33.0));
    }

    #[test]
    fn test_fieldwise_mean() {
        let mut stabilizer = MeasurementStabilizer::new(4);
        stabilizer.push(
            BodyMeasurements {
                hip_width: 1.0,
                height: 2.0,
                ..Default::default()
            },
            0.0,
        );
        stabilizer.push(
            BodyMeasurements {
                hip_width: 3.0,
                height: 4.0,
                ..Default::default()
            },
            1.0,
        );

        let avg = stabilizer.averaged().unwrap();
        assert_eq!(avg.hip_width, 2.0);
        assert_eq!(avg.height, 3.0);
        assert_eq!(avg.shoulder_width, 0.0);
    }

    #[test]
    fn test_clear_and_zero_window() {
        let mut stabilizer = MeasurementStabilizer::new(0);
        assert_eq!(stabilizer.window(), 1);
        stabilizer.push(sample(1.0), 0.0);
        stabilizer.push(sample(2.0), 1.0);
        assert_eq!(stabilizer.averaged().unwrap().shoulder_width, 2.0);

        stabilizer.clear();
        assert!(stabilizer.is_empty());
    }
}

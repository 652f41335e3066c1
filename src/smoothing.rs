use std::f32::consts::{PI, TAU};

use crate::placement::PlacementTransform;

/// EMA filter for placement transforms.
///
/// Position and scale: componentwise EMA.
/// Rotation: EMA along the shortest arc.
#[derive(Debug, Clone)]
pub struct TransformSmoother {
    alpha: f32,
    prev: Option<PlacementTransform>,
}

impl TransformSmoother {
    /// `alpha` is the weight of the newest sample, clamped to [0, 1]
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            prev: None,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn apply(&mut self, transform: PlacementTransform) -> PlacementTransform {
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(transform);
                return transform;
            }
        };

        let a = self.alpha;
        let position = prev.position.lerp(transform.position, a);
        let scale = a * transform.scale + (1.0 - a) * prev.scale;
        let rotation = prev.rotation + a * shortest_arc(prev.rotation, transform.rotation);

        let result = PlacementTransform::new(position, scale, wrap_angle(rotation));
        self.prev = Some(result);
        result
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

/// Signed difference `to - from` wrapped into (-π, π]
fn shortest_arc(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut s = TransformSmoother::new(0.5);
        let t = PlacementTransform::new(Vec3::new(0.5, 0.4, 0.0), 0.4, 0.1);
        assert_eq!(s.apply(t), t);
    }

    #[test]
    fn test_no_smoothing() {
        let mut s = TransformSmoother::new(1.0);
        s.apply(PlacementTransform::new(Vec3::ZERO, 1.0, 0.0));
        let t = PlacementTransform::new(Vec3::new(1.0, 2.0, 3.0), 2.0, 0.5);
        let result = s.apply(t);
        assert!((result.position - t.position).length() < 1e-6);
        assert!(approx_eq_f32(result.scale, 2.0, 1e-6));
        assert!(approx_eq_f32(result.rotation, 0.5, 1e-5));
    }

    #[test]
    fn test_half_smoothing() {
        let mut s = TransformSmoother::new(0.5);
        s.apply(PlacementTransform::new(Vec3::ZERO, 1.0, 0.0));
        let result = s.apply(PlacementTransform::new(Vec3::new(2.0, 4.0, 6.0), 3.0, 0.4));
        assert!((result.position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
        assert!(approx_eq_f32(result.scale, 2.0, 1e-6));
        assert!(approx_eq_f32(result.rotation, 0.2, 1e-5));
    }

    #[test]
    fn test_rotation_takes_shortest_arc() {
        let mut s = TransformSmoother::new(0.5);
        s.apply(PlacementTransform::new(Vec3::ZERO, 1.0, PI - 0.1));
        let result = s.apply(PlacementTransform::new(Vec3::ZERO, 1.0, -PI + 0.1));
        // Halfway across the ±π seam, not back through zero
        assert!(approx_eq_f32(result.rotation.abs(), PI, 1e-5));
    }

    #[test]
    fn test_reset() {
        let mut s = TransformSmoother::new(0.0);
        s.apply(PlacementTransform::new(Vec3::ONE, 1.0, 0.0));
        s.reset();
        let t = PlacementTransform::new(Vec3::new(4.0, 5.0, 6.0), 2.0, 0.3);
        assert_eq!(s.apply(t), t);
    }
}

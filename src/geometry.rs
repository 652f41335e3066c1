//! Landmark geometry helpers shared by the measurement, key-point and
//! placement stages.

use crate::landmark::Landmark;
use glam::Vec3;

/// Anything with a position in normalized camera space
pub trait Position {
    fn position(&self) -> Vec3;
}

impl Position for Landmark {
    #[inline]
    fn position(&self) -> Vec3 {
        Landmark::position(self)
    }
}

impl Position for Vec3 {
    #[inline]
    fn position(&self) -> Vec3 {
        *self
    }
}

/// Euclidean distance over x, y, z.
///
/// A missing point yields 0 rather than an error; downstream callers rely on
/// this for partially tracked bodies.
pub fn distance<A, B>(a: Option<&A>, b: Option<&B>) -> f32
where
    A: Position + ?Sized,
    B: Position + ?Sized,
{
    match (a, b) {
        (Some(a), Some(b)) => a.position().distance(b.position()),
        _ => 0.0,
    }
}

/// Componentwise midpoint over x, y, z
pub fn midpoint<A: Position, B: Position>(a: &A, b: &B) -> Vec3 {
    (a.position() + b.position()) * 0.5
}

/// Midpoint in the image plane only (z = 0)
pub fn planar_midpoint<A: Position, B: Position>(a: &A, b: &B) -> Vec3 {
    let m = midpoint(a, b);
    Vec3::new(m.x, m.y, 0.0)
}

/// Angle of the `from → to` vector in the image plane, radians
pub fn image_plane_angle<A: Position, B: Position>(from: &A, to: &B) -> f32 {
    let d = to.position() - from.position();
    d.y.atan2(d.x)
}

/// Plain IEEE division; a zero denominator gives `inf` or `NaN`
#[inline]
pub fn ratio(numerator: f32, denominator: f32) -> f32 {
    numerator / denominator
}

/// Serde adapter writing a `Vec3` as `{x, y, z}`, the shape landmarks have
/// on the JS side. Use with `#[serde(with = "crate::geometry::xyz")]`.
pub mod xyz {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xyz {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S: Serializer>(v: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
        Xyz {
            x: v.x,
            y: v.y,
            z: v.z,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
        let Xyz { x, y, z } = Xyz::deserialize(deserializer)?;
        Ok(Vec3::new(x, y, z))
    }
}

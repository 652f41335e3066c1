//! Garments worn in a try-on session and their render-scene transforms.
//!
//! The rig recomputes a placement per garment from each confident snapshot,
//! optionally smooths it, projects it from normalized camera space into scene
//! units and hands the result to a [`RenderScene`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::TrackingConfig;
use crate::placement::{get_placement, GarmentCategory, PlacementTransform};
use crate::session::PoseSnapshot;
use crate::smoothing::TransformSmoother;

/// Receives garment transforms, typically a 3D engine
pub trait RenderScene {
    fn apply_transform(&mut self, garment_id: &str, transform: &SceneTransform);
}

impl<F> RenderScene for F
where
    F: FnMut(&str, &SceneTransform),
{
    fn apply_transform(&mut self, garment_id: &str, transform: &SceneTransform) {
        self(garment_id, transform)
    }
}

/// Placement in scene units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneTransform {
    pub position: Vec3,
    /// Euler XYZ, radians
    pub rotation: Vec3,
    pub scale: Vec3,
}

/// Maps normalized image coordinates (origin top-left, y down) to a scene
/// centered on the camera axis with y up
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneProjection {
    pub width: f32,
    pub height: f32,
    pub mirror_x: bool,
}

impl Default for SceneProjection {
    fn default() -> Self {
        Self {
            width: 4.0,
            height: 3.0,
            mirror_x: false,
        }
    }
}

impl SceneProjection {
    pub fn project(&self, placement: &PlacementTransform) -> SceneTransform {
        let mut x = (placement.position.x - 0.5) * self.width;
        // Image y grows downward, scene y grows upward
        let y = -(placement.position.y - 0.5) * self.height;
        let mut rotation = -placement.rotation;
        if self.mirror_x {
            x = -x;
            rotation = -rotation;
        }

        SceneTransform {
            position: Vec3::new(x, y, placement.position.z),
            rotation: Vec3::new(0.0, 0.0, rotation),
            scale: Vec3::splat(placement.scale * self.width),
        }
    }
}

/// Catalog item worn in the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarmentEntry {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub texture_ref: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_visible() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

impl GarmentEntry {
    pub fn new(id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            name: String::new(),
            color: None,
            texture_ref: None,
            visible: true,
            opacity: 1.0,
        }
    }
}

struct WornGarment {
    entry: GarmentEntry,
    category: GarmentCategory,
    smoother: Option<TransformSmoother>,
    placement: Option<PlacementTransform>,
}

pub struct GarmentRig {
    garments: Vec<WornGarment>,
    projection: SceneProjection,
    smoothing: Option<f32>,
    min_confidence: f32,
}

impl GarmentRig {
    pub fn new(projection: SceneProjection, smoothing: Option<f32>, min_confidence: f32) -> Self {
        Self {
            garments: Vec::new(),
            projection,
            smoothing,
            min_confidence,
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        let projection = SceneProjection {
            mirror_x: config.mirror_x,
            ..SceneProjection::default()
        };
        Self::new(projection, config.placement_smoothing, config.min_confidence)
    }

    pub fn projection(&self) -> &SceneProjection {
        &self.projection
    }

    /// Add a garment, replacing one with the same id. Returns true if new.
    pub fn add(&mut self, entry: GarmentEntry) -> bool {
        let worn = WornGarment {
            category: GarmentCategory::parse(&entry.category),
            smoother: self.smoothing.map(TransformSmoother::new),
            placement: None,
            entry,
        };

        match self.garments.iter_mut().find(|g| g.entry.id == worn.entry.id) {
            Some(existing) => {
                *existing = worn;
                false
            }
            None => {
                self.garments.push(worn);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<GarmentEntry> {
        let index = self.garments.iter().position(|g| g.entry.id == id)?;
        Some(self.garments.remove(index).entry)
    }

    pub fn get(&self, id: &str) -> Option<&GarmentEntry> {
        self.find(id).map(|g| &g.entry)
    }

    pub fn garments(&self) -> impl Iterator<Item = &GarmentEntry> {
        self.garments.iter().map(|g| &g.entry)
    }

    pub fn len(&self) -> usize {
        self.garments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.garments.is_empty()
    }

    pub fn clear(&mut self) {
        self.garments.clear();
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) -> bool {
        match self.garments.iter_mut().find(|g| g.entry.id == id) {
            Some(garment) => {
                garment.entry.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Last (smoothed) placement of a garment in normalized camera space
    pub fn placement(&self, id: &str) -> Option<PlacementTransform> {
        self.find(id).and_then(|g| g.placement)
    }

    pub fn scene_transform(&self, id: &str) -> Option<SceneTransform> {
        self.placement(id).map(|p| self.projection.project(&p))
    }

    /// Recompute and push every visible garment's transform.
    ///
    /// Returns the number of garments pushed. A lost or low-confidence pose
    /// leaves every transform as it was.
    pub fn update(&mut self, snapshot: &PoseSnapshot, scene: &mut dyn RenderScene) -> usize {
        let key_points = match snapshot.key_points.as_ref() {
            Some(kp) if snapshot.is_detected && snapshot.visibility >= self.min_confidence => kp,
            _ => return 0,
        };

        let mut updated = 0;
        for garment in self.garments.iter_mut().filter(|g| g.entry.visible) {
            let Some(raw) = get_placement(Some(key_points), garment.category) else {
                continue;
            };
            let placement = match garment.smoother.as_mut() {
                Some(smoother) => smoother.apply(raw),
                None => raw,
            };
            garment.placement = Some(placement);
            scene.apply_transform(&garment.entry.id, &self.projection.project(&placement));
            updated += 1;
        }
        updated
    }

    /// Forget smoothing history, e.g. after tracking restarts
    pub fn reset_smoothing(&mut self) {
        for garment in &mut self.garments {
            if let Some(smoother) = garment.smoother.as_mut() {
                smoother.reset();
            }
        }
    }

    fn find(&self, id: &str) -> Option<&WornGarment> {
        self.garments.iter().find(|g| g.entry.id == id)
    }
}

/// Key light that follows the wearer horizontally
pub fn key_light_position(placement: &PlacementTransform) -> Vec3 {
    Vec3::new(placement.position.x * 5.0, 5.0, 5.0)
}

use std::cell::Cell;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in world space. Containment is inclusive on every face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn translated(&self, by: Vec3) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }

    /// Scales the box about its own center, then shifts the center by `offset`.
    pub fn scaled_about_center(&self, scale: Vec3, offset: Vec3) -> Self {
        Self::from_center_size(self.center() + offset, self.size() * scale)
    }
}

/// Minimal view of a scene-graph node the level logic needs.
pub trait SceneObject {
    fn name(&self) -> &str;
    fn world_bounds(&self) -> Aabb;
    fn position(&self) -> Vec3;
    fn set_position(&self, position: Vec3);
    fn is_visible(&self) -> bool;
    fn set_visible(&self, visible: bool);
}

/// Scene node with fixed extents around a movable origin.
#[derive(Debug)]
pub struct StaticObject {
    name: String,
    local_bounds: Aabb,
    position: Cell<Vec3>,
    visible: Cell<bool>,
}

impl StaticObject {
    pub fn new(name: impl Into<String>, position: Vec3, local_bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            local_bounds,
            position: Cell::new(position),
            visible: Cell::new(true),
        }
    }

    /// Places the origin at the center of `bounds`.
    pub fn from_world_bounds(name: impl Into<String>, bounds: Aabb) -> Self {
        let center = bounds.center();
        Self::new(name, center, bounds.translated(-center))
    }
}

impl SceneObject for StaticObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn world_bounds(&self) -> Aabb {
        self.local_bounds.translated(self.position.get())
    }

    fn position(&self) -> Vec3 {
        self.position.get()
    }

    fn set_position(&self, position: Vec3) {
        self.position.set(position);
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }
}

//! Named groups of axis-aligned trigger/walkable boxes.
//!
//! A zone never stores its own box: it keeps the reference object, a per-axis
//! scale and a center offset, and derives the world box from the reference's
//! current bounds on every query. Moving the reference moves the zone.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec3;
use log::debug;
use thiserror::Error;

use crate::geometry::{Aabb, SceneObject};
use crate::scene::{BoxHelper, HelperId, Scene};

pub const DEFAULT_HELPER_COLOR: u32 = 0xff0000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneError {
    #[error("zone index {index} out of range for {group} ({len} zones)")]
    OutOfRange {
        group: String,
        index: usize,
        len: usize,
    },
    #[error("zone group {0} was created without a live scene")]
    MissingScene(String),
}

pub struct Zone {
    reference: Rc<dyn SceneObject>,
    scale: Vec3,
    offset: Vec3,
    enabled: bool,
    helper: Option<HelperId>,
}

impl Zone {
    pub fn bounds(&self) -> Aabb {
        self.reference
            .world_bounds()
            .scaled_about_center(self.scale, self.offset)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn reference_name(&self) -> &str {
        self.reference.name()
    }

    fn contains_point(&self, point: Vec3) -> bool {
        self.enabled && self.bounds().contains_point(point)
    }
}

pub struct ZoneGroup {
    label: String,
    scene: Weak<Scene>,
    zones: Vec<Zone>,
    show_helpers: bool,
}

pub type ZoneGroupHandle = Rc<RefCell<ZoneGroup>>;

impl ZoneGroup {
    pub fn new(label: impl Into<String>, scene: Weak<Scene>) -> Result<Self, ZoneError> {
        let label = label.into();
        if scene.upgrade().is_none() {
            return Err(ZoneError::MissingScene(label));
        }
        Ok(Self {
            label,
            scene,
            zones: Vec::new(),
            show_helpers: false,
        })
    }

    pub fn into_handle(self) -> ZoneGroupHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Appends an enabled zone and returns its index.
    pub fn add_zone(&mut self, reference: Rc<dyn SceneObject>, scale: Vec3, offset: Vec3) -> usize {
        let mut zone = Zone {
            reference,
            scale,
            offset,
            enabled: true,
            helper: None,
        };
        if let Some(scene) = self.scene.upgrade() {
            let label = format!("{}[{}]", self.label, self.zones.len());
            let mut helper = BoxHelper::new(label, zone.bounds(), DEFAULT_HELPER_COLOR);
            helper.visible = self.show_helpers;
            zone.helper = Some(scene.add_helper(helper));
        }
        self.zones.push(zone);
        self.zones.len() - 1
    }

    /// Removes a zone; later indices shift down by one.
    pub fn remove_zone(&mut self, index: usize) -> bool {
        if index >= self.zones.len() {
            return false;
        }
        let zone = self.zones.remove(index);
        if let (Some(id), Some(scene)) = (zone.helper, self.scene.upgrade()) {
            scene.remove_helper(id);
        }
        true
    }

    pub fn zone(&self, index: usize) -> Result<&Zone, ZoneError> {
        self.zones.get(index).ok_or_else(|| self.out_of_range(index))
    }

    pub fn contains_point(&self, index: usize, point: Vec3) -> Result<bool, ZoneError> {
        Ok(self.zone(index)?.contains_point(point))
    }

    /// True when any enabled zone contains `point`.
    pub fn is_in_any_zone(&self, point: Vec3) -> bool {
        self.zones.iter().any(|zone| zone.contains_point(point))
    }

    pub fn enable(&mut self, index: usize) -> Result<(), ZoneError> {
        self.set_enabled(index, true)
    }

    pub fn disable(&mut self, index: usize) -> Result<(), ZoneError> {
        self.set_enabled(index, false)
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), ZoneError> {
        let len = self.zones.len();
        let label = self.label.clone();
        let zone = self.zones.get_mut(index).ok_or(ZoneError::OutOfRange {
            group: label,
            index,
            len,
        })?;
        if zone.enabled != enabled {
            debug!(
                "[eb_engine] zone {}[{index}] {}",
                self.label,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        zone.enabled = enabled;
        Ok(())
    }

    /// Moves the zone's reference object so the zone is centered on
    /// `new_center` (offset still applied). Disabled zones ignore the request.
    pub fn update_zone_position(&mut self, index: usize, new_center: Vec3) -> Result<(), ZoneError> {
        let zone = self.zone(index)?;
        if !zone.enabled {
            return Ok(());
        }
        zone.reference.set_position(new_center);
        self.refresh_helper(index);
        Ok(())
    }

    /// Re-derives helper boxes from the current reference bounds.
    pub fn refresh_helpers(&self) {
        for index in 0..self.zones.len() {
            self.refresh_helper(index);
        }
    }

    pub fn view_all_helpers(&mut self, show: bool) {
        self.show_helpers = show;
        self.refresh_helpers();
        self.each_helper(|helper| helper.visible = show);
    }

    pub fn helpers_shown(&self) -> bool {
        self.show_helpers
    }

    /// Out-of-range indices are ignored; helpers are debug-only.
    pub fn set_helper_color(&self, index: usize, color: u32) {
        let (Some(zone), Some(scene)) = (self.zones.get(index), self.scene.upgrade()) else {
            return;
        };
        if let Some(id) = zone.helper {
            scene.update_helper(id, |helper| helper.color = color);
        }
    }

    pub fn set_all_helper_colors(&self, color: u32) {
        self.each_helper(|helper| helper.color = color);
    }

    pub fn helper_id(&self, index: usize) -> Option<HelperId> {
        self.zones.get(index).and_then(|zone| zone.helper)
    }

    /// Drops every zone and its helper.
    pub fn dispose(&mut self) {
        if let Some(scene) = self.scene.upgrade() {
            for id in self.zones.iter().filter_map(|zone| zone.helper) {
                scene.remove_helper(id);
            }
        }
        self.zones.clear();
    }

    fn refresh_helper(&self, index: usize) {
        let (Some(zone), Some(scene)) = (self.zones.get(index), self.scene.upgrade()) else {
            return;
        };
        if let Some(id) = zone.helper {
            let bounds = zone.bounds();
            scene.update_helper(id, |helper| helper.bounds = bounds);
        }
    }

    fn each_helper(&self, mut update: impl FnMut(&mut BoxHelper)) {
        let Some(scene) = self.scene.upgrade() else {
            return;
        };
        for id in self.zones.iter().filter_map(|zone| zone.helper) {
            scene.update_helper(id, &mut update);
        }
    }

    fn out_of_range(&self, index: usize) -> ZoneError {
        ZoneError::OutOfRange {
            group: self.label.clone(),
            index,
            len: self.zones.len(),
        }
    }
}

/// OR-combination of several groups, used as the walkable area.
#[derive(Clone, Default)]
pub struct ZoneUnion {
    groups: Vec<ZoneGroupHandle>,
}

impl ZoneUnion {
    pub fn new(groups: Vec<ZoneGroupHandle>) -> Self {
        Self { groups }
    }

    pub fn push(&mut self, group: ZoneGroupHandle) {
        self.groups.push(group);
    }

    pub fn is_in_any_zone(&self, point: Vec3) -> bool {
        self.groups
            .iter()
            .any(|group| group.borrow().is_in_any_zone(point))
    }

    pub fn view_all_helpers(&self, show: bool) {
        for group in &self.groups {
            group.borrow_mut().view_all_helpers(show);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::StaticObject;

    fn unit_box(name: &str, center: Vec3) -> Rc<StaticObject> {
        Rc::new(StaticObject::from_world_bounds(
            name,
            Aabb::from_center_size(center, Vec3::splat(10.0)),
        ))
    }

    fn group(scene: &Rc<Scene>, label: &str) -> ZoneGroup {
        ZoneGroup::new(label, Rc::downgrade(scene)).expect("live scene")
    }

    #[test]
    fn disabled_zone_never_contains_points() {
        let scene = Scene::new();
        let mut zones = group(&scene, "door");
        let index = zones.add_zone(unit_box("door", Vec3::ZERO), Vec3::ONE, Vec3::ZERO);

        assert!(zones.is_in_any_zone(Vec3::ZERO));
        zones.disable(index).expect("disable");
        assert!(!zones.is_in_any_zone(Vec3::ZERO));
        assert!(!zones.contains_point(index, Vec3::ZERO).expect("index"));
        zones.enable(index).expect("enable");
        assert!(zones.contains_point(index, Vec3::ZERO).expect("index"));
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let scene = Scene::new();
        let mut zones = group(&scene, "hallway");
        zones.add_zone(unit_box("a", Vec3::ZERO), Vec3::ONE, Vec3::ZERO);

        let err = zones.enable(3).expect_err("index 3 is out of range");
        assert_eq!(
            err,
            ZoneError::OutOfRange {
                group: "hallway".to_string(),
                index: 3,
                len: 1
            }
        );
        assert!(zones.contains_point(1, Vec3::ZERO).is_err());
        assert!(zones.update_zone_position(1, Vec3::ZERO).is_err());
    }

    #[test]
    fn creating_without_scene_fails() {
        let scene = Scene::new();
        let weak = Rc::downgrade(&scene);
        drop(scene);
        assert_eq!(
            ZoneGroup::new("orphan", weak).err(),
            Some(ZoneError::MissingScene("orphan".to_string()))
        );
    }

    #[test]
    fn zone_follows_its_reference_object() {
        let scene = Scene::new();
        let mut zones = group(&scene, "npc");
        let npc = unit_box("npc", Vec3::ZERO);
        zones.add_zone(npc.clone(), Vec3::ONE, Vec3::new(20.0, 0.0, 0.0));

        assert!(zones.is_in_any_zone(Vec3::new(20.0, 0.0, 0.0)));
        npc.set_position(Vec3::new(100.0, 0.0, 0.0));
        assert!(!zones.is_in_any_zone(Vec3::new(20.0, 0.0, 0.0)));
        assert!(zones.is_in_any_zone(Vec3::new(120.0, 0.0, 0.0)));
    }

    #[test]
    fn scale_shrinks_the_reference_box() {
        let scene = Scene::new();
        let mut zones = group(&scene, "threshold");
        zones.add_zone(unit_box("shell", Vec3::ZERO), Vec3::splat(0.5), Vec3::ZERO);
        assert!(zones.is_in_any_zone(Vec3::splat(2.5)));
        assert!(!zones.is_in_any_zone(Vec3::splat(3.0)));
    }

    #[test]
    fn update_position_is_ignored_while_disabled() {
        let scene = Scene::new();
        let mut zones = group(&scene, "npc");
        let npc = unit_box("npc", Vec3::ZERO);
        zones.add_zone(npc.clone(), Vec3::ONE, Vec3::ZERO);

        zones.disable(0).expect("disable");
        zones
            .update_zone_position(0, Vec3::new(50.0, 0.0, 0.0))
            .expect("index");
        assert_eq!(npc.position(), Vec3::ZERO);

        zones.enable(0).expect("enable");
        zones
            .update_zone_position(0, Vec3::new(50.0, 0.0, 0.0))
            .expect("index");
        assert_eq!(npc.position(), Vec3::new(50.0, 0.0, 0.0));
        assert!(zones.is_in_any_zone(Vec3::new(50.0, 0.0, 0.0)));
    }

    #[test]
    fn remove_zone_shifts_indices_and_drops_helper() {
        let scene = Scene::new();
        let mut zones = group(&scene, "exit");
        zones.add_zone(unit_box("a", Vec3::ZERO), Vec3::ONE, Vec3::ZERO);
        zones.add_zone(unit_box("b", Vec3::splat(100.0)), Vec3::ONE, Vec3::ZERO);
        assert_eq!(scene.helper_count(), 2);

        assert!(zones.remove_zone(0));
        assert!(!zones.remove_zone(5));
        assert_eq!(zones.len(), 1);
        assert_eq!(scene.helper_count(), 1);
        assert_eq!(zones.zone(0).expect("index").reference_name(), "b");
    }

    #[test]
    fn helper_visibility_and_color_track_the_group() {
        let scene = Scene::new();
        let mut zones = group(&scene, "walkable");
        zones.add_zone(unit_box("a", Vec3::ZERO), Vec3::ONE, Vec3::ZERO);
        zones.view_all_helpers(true);
        let id = zones.helper_id(0).expect("helper");
        assert!(scene.helper(id).expect("helper").visible);

        zones.set_helper_color(0, 0x00ff00);
        zones.set_helper_color(9, 0x0000ff);
        assert_eq!(scene.helper(id).expect("helper").color, 0x00ff00);

        // Zones added while helpers are shown start visible.
        zones.add_zone(unit_box("b", Vec3::ONE), Vec3::ONE, Vec3::ZERO);
        let second = zones.helper_id(1).expect("helper");
        assert!(scene.helper(second).expect("helper").visible);

        zones.dispose();
        assert!(zones.is_empty());
        assert_eq!(scene.helper_count(), 0);
    }

    #[test]
    fn union_is_logical_or() {
        let scene = Scene::new();
        let mut left = group(&scene, "left");
        left.add_zone(unit_box("l", Vec3::ZERO), Vec3::ONE, Vec3::ZERO);
        let mut right = group(&scene, "right");
        right.add_zone(unit_box("r", Vec3::new(100.0, 0.0, 0.0)), Vec3::ONE, Vec3::ZERO);
        let right = right.into_handle();
        let union = ZoneUnion::new(vec![left.into_handle(), right.clone()]);

        assert!(union.is_in_any_zone(Vec3::ZERO));
        assert!(union.is_in_any_zone(Vec3::new(100.0, 0.0, 0.0)));
        assert!(!union.is_in_any_zone(Vec3::new(50.0, 0.0, 0.0)));

        right.borrow_mut().disable(0).expect("disable");
        assert!(!union.is_in_any_zone(Vec3::new(100.0, 0.0, 0.0)));
    }
}

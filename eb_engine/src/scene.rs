use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;

use crate::geometry::Aabb;

pub type HelperId = u32;

/// Wireframe box drawn over a zone or a variant's trigger area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxHelper {
    pub label: String,
    pub bounds: Aabb,
    pub color: u32,
    pub visible: bool,
}

impl BoxHelper {
    pub fn new(label: impl Into<String>, bounds: Aabb, color: u32) -> Self {
        Self {
            label: label.into(),
            bounds,
            color,
            visible: false,
        }
    }
}

/// Owner of the debug overlays. Zone groups hold it weakly so a group that
/// outlives the scene reports the missing owner instead of drawing into nothing.
#[derive(Debug, Default)]
pub struct Scene {
    helpers: RefCell<BTreeMap<HelperId, BoxHelper>>,
    next_helper: Cell<HelperId>,
}

impl Scene {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn add_helper(&self, helper: BoxHelper) -> HelperId {
        let id = self.next_helper.get();
        self.next_helper.set(id + 1);
        self.helpers.borrow_mut().insert(id, helper);
        id
    }

    pub fn remove_helper(&self, id: HelperId) -> bool {
        self.helpers.borrow_mut().remove(&id).is_some()
    }

    pub fn update_helper(&self, id: HelperId, update: impl FnOnce(&mut BoxHelper)) -> bool {
        match self.helpers.borrow_mut().get_mut(&id) {
            Some(helper) => {
                update(helper);
                true
            }
            None => false,
        }
    }

    pub fn helper(&self, id: HelperId) -> Option<BoxHelper> {
        self.helpers.borrow().get(&id).cloned()
    }

    pub fn helper_count(&self) -> usize {
        self.helpers.borrow().len()
    }

    pub fn visible_helpers(&self) -> Vec<BoxHelper> {
        self.helpers
            .borrow()
            .values()
            .filter(|helper| helper.visible)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn helpers_are_tracked_until_removed() {
        let scene = Scene::new();
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let first = scene.add_helper(BoxHelper::new("a", bounds, 0xff0000));
        let second = scene.add_helper(BoxHelper::new("b", bounds, 0x00ff00));
        assert_ne!(first, second);
        assert_eq!(scene.helper_count(), 2);

        assert!(scene.update_helper(second, |helper| helper.visible = true));
        assert_eq!(scene.visible_helpers().len(), 1);

        assert!(scene.remove_helper(first));
        assert!(!scene.remove_helper(first));
        assert_eq!(scene.helper_count(), 1);
        assert!(!scene.update_helper(first, |helper| helper.visible = true));
    }
}

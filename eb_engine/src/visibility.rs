use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;

use eb_formats::{variant_key, VisibilityConfig, DEFAULT_STATE};
use log::{debug, error};

/// Meshes of a loaded model whose visibility can be flipped by name.
pub trait MeshSet {
    fn mesh_names(&self) -> Vec<String>;
    fn set_mesh_visible(&self, name: &str, visible: bool);
}

#[derive(Debug, Default)]
pub struct MeshTable {
    meshes: RefCell<BTreeMap<String, bool>>,
}

impl MeshTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            meshes: RefCell::new(names.into_iter().map(|name| (name.into(), true)).collect()),
        }
    }

    pub fn is_visible(&self, name: &str) -> Option<bool> {
        self.meshes.borrow().get(name).copied()
    }

    pub fn visible_meshes(&self) -> BTreeSet<String> {
        self.meshes
            .borrow()
            .iter()
            .filter(|(_, visible)| **visible)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl MeshSet for MeshTable {
    fn mesh_names(&self) -> Vec<String> {
        self.meshes.borrow().keys().cloned().collect()
    }

    fn set_mesh_visible(&self, name: &str, visible: bool) {
        if let Some(slot) = self.meshes.borrow_mut().get_mut(name) {
            *slot = visible;
        }
    }
}

/// Reads a visibility config, logging and swallowing any failure.
pub fn load_config(path: &Path) -> Option<VisibilityConfig> {
    match VisibilityConfig::load(path) {
        Ok(config) => Some(config),
        Err(err) => {
            error!("[eb_engine] visibility config unavailable: {err:#}");
            None
        }
    }
}

/// Applies config states to the hallway model. Without a config every
/// request is logged and ignored.
pub struct VisibilityManager {
    model: Rc<dyn MeshSet>,
    config: Option<VisibilityConfig>,
    is_default: bool,
}

impl VisibilityManager {
    pub fn new(model: Rc<dyn MeshSet>, config: Option<VisibilityConfig>) -> Self {
        Self {
            model,
            config,
            is_default: false,
        }
    }

    /// Loads the config from disk; a failure is logged and leaves the
    /// manager without a config.
    pub fn load(model: Rc<dyn MeshSet>, path: &Path) -> Self {
        Self::new(model, load_config(path))
    }

    pub fn config(&self) -> Option<&VisibilityConfig> {
        self.config.as_ref()
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Shows exactly the meshes visible in `state`. Returns false when no
    /// config is loaded.
    pub fn apply_visibility(&mut self, state: &str) -> bool {
        let Some(config) = self.config.as_ref() else {
            error!("[eb_engine] visibility config not loaded; ignoring state {state}");
            return false;
        };
        self.is_default = state == DEFAULT_STATE;
        let resolved = config.resolve_state(state);
        if resolved != state {
            debug!("[eb_engine] visibility state {state} falls back to {resolved}");
        }
        let visible = config.visible_set(state);
        for name in self.model.mesh_names() {
            self.model.set_mesh_visible(&name, visible.contains(&name));
        }
        true
    }

    pub fn switch_by_index(&mut self, index: i32) -> bool {
        self.apply_visibility(&variant_key(index))
    }

    pub fn switch_to_default(&mut self) -> bool {
        self.apply_visibility(DEFAULT_STATE)
    }
}

//! Picks which hallway variant the next floor shows and applies it: mesh
//! visibility first, then the variant's optional hook.

use std::collections::BTreeMap;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::animation::ClipPlayer;
use crate::events::EventLog;
use crate::geometry::SceneObject;
use crate::scene::{BoxHelper, HelperId, Scene};
use crate::transitions::{TransitionBus, WatcherHandle};
use crate::visibility::VisibilityManager;
use crate::zones::{ZoneError, ZoneGroupHandle};

/// Index of the unaltered hallway.
pub const BASELINE: i32 = -1;

/// The hallway's NPC: model, its idle clip, and the zone group whose first
/// zone blocks the player.
pub struct Npc {
    pub model: Rc<dyn SceneObject>,
    pub animator: Rc<dyn ClipPlayer>,
    pub clip: String,
    pub zones: ZoneGroupHandle,
}

/// What a variant hook may touch while it installs itself.
pub struct VariantScope<'a> {
    index: i32,
    npc: Option<&'a Npc>,
    scene: &'a Rc<Scene>,
    watchers: &'a mut Vec<WatcherHandle>,
    visuals: &'a mut Vec<HelperId>,
    log: &'a EventLog,
}

impl VariantScope<'_> {
    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn npc(&self) -> Option<&Npc> {
        self.npc
    }

    pub fn scene(&self) -> &Rc<Scene> {
        self.scene
    }

    pub fn log(&self) -> &EventLog {
        self.log
    }

    /// Watchers added here are polled every frame and disposed on restore.
    pub fn add_watcher(&mut self, watcher: WatcherHandle) {
        self.watchers.push(watcher);
    }

    pub fn add_debug_visual(&mut self, helper: BoxHelper) -> HelperId {
        let id = self.scene.add_helper(helper);
        self.visuals.push(id);
        id
    }
}

pub type VariantHook = Box<dyn Fn(&mut VariantScope<'_>) -> Result<(), ZoneError>>;

pub struct VariantSelector {
    scene: Rc<Scene>,
    visibility: VisibilityManager,
    npc: Option<Npc>,
    hooks: BTreeMap<i32, VariantHook>,
    current: i32,
    watchers: Vec<WatcherHandle>,
    visuals: Vec<HelperId>,
    rng: ChaCha8Rng,
    start_level: u32,
    log: EventLog,
}

impl VariantSelector {
    pub fn new(
        scene: Rc<Scene>,
        visibility: VisibilityManager,
        npc: Option<Npc>,
        start_level: u32,
        seed: u64,
        log: EventLog,
    ) -> Self {
        let mut selector = Self {
            scene,
            visibility,
            npc,
            hooks: BTreeMap::new(),
            current: BASELINE,
            watchers: Vec::new(),
            visuals: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            start_level,
            log,
        };
        selector.register_hook(11, Box::new(npc_passable));
        selector.register_hook(12, Box::new(npc_missing));
        selector
    }

    /// Installs `hook` for `index`, returning the hook it replaces.
    pub fn register_hook(&mut self, index: i32, hook: VariantHook) -> Option<VariantHook> {
        self.hooks.insert(index, hook)
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn is_baseline(&self) -> bool {
        self.current == BASELINE
    }

    pub fn visibility(&self) -> &VisibilityManager {
        &self.visibility
    }

    pub fn npc(&self) -> Option<&Npc> {
        self.npc.as_ref()
    }

    pub fn debug_visual_count(&self) -> usize {
        self.visuals.len()
    }

    /// Bus over the active variant's watchers, for per-frame polling.
    pub fn active_watchers(&self) -> TransitionBus {
        TransitionBus::new(self.watchers.clone())
    }

    /// Puts the NPC back, tears down whatever the last hook installed and
    /// returns the hallway to the baseline meshes.
    pub fn restore(&mut self) -> Result<(), ZoneError> {
        if let Some(npc) = self.npc.as_ref() {
            npc.animator.stop(&npc.clip);
            npc.animator.reset(&npc.clip);
            npc.animator.stop_all();
            npc.model.set_visible(true);
            let mut zones = npc.zones.borrow_mut();
            zones.enable(0)?;
            zones.update_zone_position(0, npc.model.position())?;
        }
        for watcher in self.watchers.drain(..) {
            watcher.borrow_mut().dispose();
        }
        for id in self.visuals.drain(..) {
            self.scene.remove_helper(id);
        }
        if self.visibility.config().is_some() {
            self.visibility.switch_to_default();
        }
        self.current = BASELINE;
        Ok(())
    }

    pub fn set_variant(&mut self, index: i32) -> Result<(), ZoneError> {
        self.restore()?;
        self.visibility.switch_by_index(index);
        self.current = index;

        if let Some(hook) = self.hooks.get(&index) {
            let mut scope = VariantScope {
                index,
                npc: self.npc.as_ref(),
                scene: &self.scene,
                watchers: &mut self.watchers,
                visuals: &mut self.visuals,
                log: &self.log,
            };
            hook(&mut scope)?;
        }
        for watcher in &self.watchers {
            watcher.borrow_mut().enable();
        }
        self.log.record(format!("variant.set {index}"));
        Ok(())
    }

    /// The starting floor is always the baseline; any other floor draws an
    /// abnormal variant with `probability`, uniformly from `0..count`.
    pub fn set_variant_automatic(
        &mut self,
        floor: u32,
        probability: f64,
        count: u32,
    ) -> Result<i32, ZoneError> {
        let index = if floor == self.start_level {
            BASELINE
        } else {
            let draw: f64 = self.rng.gen();
            if probability > draw && count > 0 {
                self.rng.gen_range(0..count) as i32
            } else {
                BASELINE
            }
        };
        self.set_variant(index)?;
        Ok(index)
    }
}

/// The NPC stops blocking the player.
fn npc_passable(scope: &mut VariantScope<'_>) -> Result<(), ZoneError> {
    if let Some(npc) = scope.npc() {
        npc.zones.borrow_mut().disable(0)?;
    }
    Ok(())
}

/// The NPC is gone altogether.
fn npc_missing(scope: &mut VariantScope<'_>) -> Result<(), ZoneError> {
    if let Some(npc) = scope.npc() {
        npc.model.set_visible(false);
        npc.zones.borrow_mut().disable(0)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::animation::RecordingClipPlayer;
    use crate::geometry::{Aabb, StaticObject};
    use crate::transitions::{EventKind, TransitionWatcher};
    use crate::visibility::MeshTable;
    use crate::zones::ZoneGroup;
    use eb_formats::VisibilityConfig;
    use glam::Vec3;

    struct Fixture {
        scene: Rc<Scene>,
        meshes: Rc<MeshTable>,
        npc_model: Rc<StaticObject>,
        npc_zones: ZoneGroupHandle,
        animator: Rc<RecordingClipPlayer>,
        selector: VariantSelector,
    }

    fn fixture(seed: u64) -> Fixture {
        let scene = Scene::new();
        let meshes = Rc::new(MeshTable::new(["Wall", "Poster-h0", "Blood-s0"]));
        let config = VisibilityConfig::parse(
            r#"{
                "default": {"visible": ["Wall", "Poster-h0"]},
                "index0": {"add": ["Blood-s0"], "delete": ["Poster-h0"]}
            }"#,
        )
        .expect("parse");
        let npc_model = Rc::new(StaticObject::from_world_bounds(
            "npc",
            Aabb::from_center_size(Vec3::new(-3_000.0, 300.0, 1_180.0), Vec3::new(60.0, 600.0, 60.0)),
        ));
        let mut zones = ZoneGroup::new("npc", Rc::downgrade(&scene)).expect("scene");
        zones.add_zone(npc_model.clone(), Vec3::ONE, Vec3::ZERO);
        let npc_zones = zones.into_handle();
        let animator = Rc::new(RecordingClipPlayer::new());
        let selector = VariantSelector::new(
            scene.clone(),
            VisibilityManager::new(meshes.clone(), Some(config)),
            Some(Npc {
                model: npc_model.clone(),
                animator: animator.clone(),
                clip: "idle".to_string(),
                zones: npc_zones.clone(),
            }),
            5,
            seed,
            EventLog::new(),
        );
        Fixture {
            scene,
            meshes,
            npc_model,
            npc_zones,
            animator,
            selector,
        }
    }

    fn npc_blocking(fixture: &Fixture) -> bool {
        fixture
            .npc_zones
            .borrow()
            .zone(0)
            .expect("zone")
            .is_enabled()
    }

    #[test]
    fn variant_twelve_hides_npc_until_restored() {
        let mut fixture = fixture(1);
        fixture.animator.play("idle");
        fixture.selector.set_variant(12).expect("variant 12");
        assert!(!fixture.npc_model.is_visible());
        assert!(!npc_blocking(&fixture));
        assert!(!fixture.animator.is_running("idle"));

        fixture.selector.set_variant(BASELINE).expect("baseline");
        assert!(fixture.npc_model.is_visible());
        assert!(npc_blocking(&fixture));
        assert!(fixture.selector.is_baseline());
    }

    #[test]
    fn variant_eleven_only_disables_the_npc_zone() {
        let mut fixture = fixture(1);
        fixture.selector.set_variant(11).expect("variant 11");
        assert!(fixture.npc_model.is_visible());
        assert!(!npc_blocking(&fixture));
    }

    #[test]
    fn visibility_follows_the_selected_variant() {
        let mut fixture = fixture(1);
        fixture.selector.set_variant(0).expect("variant 0");
        let visible: Vec<String> = fixture.meshes.visible_meshes().into_iter().collect();
        assert_eq!(visible, vec!["Blood-s0", "Wall"]);
        assert!(!fixture.selector.is_baseline());
    }

    #[test]
    fn repeated_variant_then_restore_matches_a_fresh_restore() {
        let mut fresh = fixture(1);
        fresh.selector.restore().expect("restore");
        let baseline = fresh.meshes.visible_meshes();

        let mut fixture = fixture(1);
        fixture.selector.set_variant(0).expect("variant 0");
        fixture.selector.set_variant(0).expect("variant 0 again");
        fixture.selector.restore().expect("restore");
        assert_eq!(fixture.meshes.visible_meshes(), baseline);
        assert!(fixture.selector.is_baseline());
        assert!(fixture.selector.visibility().is_default());
    }

    #[test]
    fn restore_on_a_fresh_selector_keeps_the_baseline() {
        let mut fixture = fixture(1);
        fixture.selector.restore().expect("restore");
        let visible: Vec<String> = fixture.meshes.visible_meshes().into_iter().collect();
        assert_eq!(visible, vec!["Poster-h0", "Wall"]);
        assert!(fixture.selector.is_baseline());
        assert!(fixture.npc_model.is_visible());
        assert!(npc_blocking(&fixture));
        assert_eq!(fixture.selector.debug_visual_count(), 0);
    }

    #[test]
    fn restore_undoes_a_hooked_variant() {
        let mut fixture = fixture(1);
        fixture.selector.set_variant(12).expect("variant 12");
        fixture.selector.restore().expect("restore");
        assert_eq!(fixture.selector.current(), BASELINE);
        assert!(fixture.npc_model.is_visible());
        assert!(npc_blocking(&fixture));
    }

    #[test]
    fn start_level_is_always_baseline() {
        let mut fixture = fixture(7);
        for _ in 0..20 {
            assert_eq!(
                fixture.selector.set_variant_automatic(5, 1.0, 13).expect("set"),
                BASELINE
            );
        }
    }

    #[test]
    fn probability_bounds_are_respected() {
        let mut fixture = fixture(3);
        for _ in 0..50 {
            let index = fixture.selector.set_variant_automatic(3, 1.0, 13).expect("set");
            assert!((0..13).contains(&index));
        }
        for _ in 0..50 {
            assert_eq!(
                fixture.selector.set_variant_automatic(3, 0.0, 13).expect("set"),
                BASELINE
            );
        }
        assert_eq!(
            fixture.selector.set_variant_automatic(3, 1.0, 0).expect("set"),
            BASELINE
        );
    }

    #[test]
    fn same_seed_draws_the_same_sequence() {
        let mut first = fixture(99);
        let mut second = fixture(99);
        let a: Vec<i32> = (0..10)
            .map(|_| first.selector.set_variant_automatic(2, 0.7, 13).expect("set"))
            .collect();
        let b: Vec<i32> = (0..10)
            .map(|_| second.selector.set_variant_automatic(2, 0.7, 13).expect("set"))
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn hook_watchers_and_visuals_are_torn_down_on_restore() {
        let mut fixture = fixture(1);
        let fired = Rc::new(Cell::new(0));
        {
            let fired = fired.clone();
            fixture.selector.register_hook(
                4,
                Box::new(move |scope: &mut VariantScope<'_>| {
                    let mut zones = ZoneGroup::new("stain", Rc::downgrade(scope.scene()))?;
                    zones.add_zone(
                        Rc::new(StaticObject::from_world_bounds(
                            "stain",
                            Aabb::from_center_size(Vec3::ZERO, Vec3::splat(10.0)),
                        )),
                        Vec3::ONE,
                        Vec3::ZERO,
                    );
                    let mut watcher = TransitionWatcher::new("stain", zones.into_handle());
                    let fired = fired.clone();
                    watcher.add_callback(
                        Rc::new(move || fired.set(fired.get() + 1)),
                        EventKind::OnEnter,
                    );
                    scope.add_watcher(watcher.into_handle());
                    scope.add_debug_visual(BoxHelper::new(
                        "stain",
                        Aabb::from_center_size(Vec3::ZERO, Vec3::splat(10.0)),
                        0x00ff00,
                    ));
                    Ok(())
                }),
            );
        }
        let helpers_before = fixture.scene.helper_count();
        fixture.selector.set_variant(4).expect("variant 4");
        assert_eq!(fixture.selector.debug_visual_count(), 1);
        assert_eq!(fixture.scene.helper_count(), helpers_before + 2);

        let bus = fixture.selector.active_watchers();
        assert_eq!(bus.len(), 1);
        bus.handle_events(Vec3::ZERO);
        assert_eq!(fired.get(), 1);

        fixture.selector.set_variant(BASELINE).expect("baseline");
        assert_eq!(fixture.selector.active_watchers().len(), 0);
        assert_eq!(fixture.scene.helper_count(), helpers_before);
        bus.handle_events(Vec3::new(100.0, 0.0, 0.0));
        bus.handle_events(Vec3::ZERO);
        assert_eq!(fired.get(), 1);
    }
}

//! Assembles one playable level: both elevators, the hallway, its NPC and
//! every trigger, wired to a [`LevelPhaseController`].

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use eb_formats::VisibilityConfig;
use log::{info, warn};

use crate::animation::{ClipPlayer, RecordingClipPlayer};
use crate::audio::{AudioChannel, AudioRecorder, SimulatedAudio};
use crate::door::{DoorClips, DoorController, DoorParts};
use crate::elevator::{Elevator, ElevatorParts, FloorDisplays};
use crate::events::EventLog;
use crate::geometry::{SceneObject, StaticObject};
use crate::layout::{ElevatorLayout, LevelLayout, ZoneSpec};
use crate::lighting::{AmbientLight, Tubelight, TubelightSystem};
use crate::night_vision::NightVision;
use crate::phase::{LevelPhaseController, LevelRig};
use crate::player::{InputState, PlayerRig, StepOutcome};
use crate::scene::{BoxHelper, Scene};
use crate::settings::GameSettings;
use crate::transitions::{EventKind, TransitionBus, TransitionWatcher};
use crate::variant::{Npc, VariantHook, VariantScope, VariantSelector};
use crate::visibility::{MeshTable, VisibilityManager};
use crate::zones::{ZoneError, ZoneGroup, ZoneGroupHandle, ZoneUnion};

/// Mesh names of the bundled hallway model.
pub const BUNDLED_HALLWAY_MESHES: &str = include_str!("../assets/hallway_meshes.txt");
/// Visibility config generated from [`BUNDLED_HALLWAY_MESHES`].
pub const BUNDLED_VISIBILITY_CONFIG: &str = include_str!("../assets/hallwayVisibility.json");

/// Variant whose NPC disappears once the player gets close. The hook runs on
/// top of the variant's own mesh changes.
pub const VANISHING_NPC_VARIANT: i32 = 5;
const APPROACH_HELPER_COLOR: u32 = 0x00ff00;

/// Non-empty, non-comment lines of a mesh name list.
pub fn parse_mesh_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub struct LevelOptions {
    pub visibility: Option<VisibilityConfig>,
    pub hallway_meshes: Vec<String>,
    pub seed: u64,
    pub show_zones: bool,
}

struct ElevatorRig {
    elevator: Rc<Elevator>,
    body_zones: ZoneGroupHandle,
    enter_zones: ZoneGroupHandle,
    exit_zones: Option<ZoneGroupHandle>,
}

pub struct Level {
    scene: Rc<Scene>,
    settings: Rc<GameSettings>,
    log: EventLog,
    audio: AudioRecorder,
    meshes: Rc<MeshTable>,
    npc_model: Rc<StaticObject>,
    npc_animator: Rc<RecordingClipPlayer>,
    npc_zones: ZoneGroupHandle,
    walkable: ZoneUnion,
    bus: TransitionBus,
    controller: LevelPhaseController,
}

impl Level {
    /// Builds the level on the starting floor with the baseline hallway.
    /// Must run inside a `LocalSet`: the triggers launch local tasks.
    pub fn build(
        settings: GameSettings,
        layout: &LevelLayout,
        options: LevelOptions,
    ) -> Result<Self, ZoneError> {
        let settings = Rc::new(settings);
        let scene = Scene::new();
        let log = EventLog::new();
        let audio = AudioRecorder::new();

        let reference = build_elevator(0, &layout.reference, &settings, &scene, &audio, &log)?;
        let paired = build_elevator(1, &layout.paired, &settings, &scene, &audio, &log)?;

        let mut hallway = ZoneGroup::new("hallway", Rc::downgrade(&scene))?;
        for segment in &layout.hallway.segments {
            let floor = Rc::new(StaticObject::from_world_bounds(&segment.name, segment.bounds()));
            hallway.add_zone(floor, ZoneSpec::WHOLE.scale, ZoneSpec::WHOLE.offset);
        }
        let hallway = hallway.into_handle();

        let mut reveal = ZoneGroup::new("hallway.reveal", Rc::downgrade(&scene))?;
        reveal.add_zone(
            Rc::new(StaticObject::from_world_bounds(
                &layout.hallway.reveal.name,
                layout.hallway.reveal.bounds(),
            )),
            ZoneSpec::WHOLE.scale,
            ZoneSpec::WHOLE.offset,
        );
        let reveal = reveal.into_handle();

        let hallway_lights = TubelightSystem::new(
            (1..=3)
                .map(|index| Tubelight::new(&format!("hallway{index}"), settings.lights.hallway))
                .collect(),
        );
        let night_vision = Rc::new(NightVision::new(Rc::new(AmbientLight::new(
            settings.lights.ambient,
        ))));
        let hum = SimulatedAudio::new(
            "hallway.hum",
            Duration::from_millis(settings.audio.hum_ms),
            audio.clone(),
        );
        hum.set_looping(true);
        let breath = SimulatedAudio::new(
            "hallway.breath",
            Duration::from_millis(settings.audio.breath_ms),
            audio.clone(),
        );

        let npc_model = Rc::new(StaticObject::from_world_bounds(
            &layout.npc.body.name,
            layout.npc.body.bounds(),
        ));
        let npc_animator = Rc::new(RecordingClipPlayer::new());
        let mut npc_zones = ZoneGroup::new("npc", Rc::downgrade(&scene))?;
        npc_zones.add_zone(npc_model.clone(), layout.npc.blocker.scale, layout.npc.blocker.offset);
        let npc_zones = npc_zones.into_handle();

        let meshes = Rc::new(MeshTable::new(options.hallway_meshes));
        let visibility = VisibilityManager::new(meshes.clone(), options.visibility);
        let mut selector = VariantSelector::new(
            scene.clone(),
            visibility,
            Some(Npc {
                model: npc_model.clone(),
                animator: npc_animator.clone(),
                clip: layout.npc.clip.clone(),
                zones: npc_zones.clone(),
            }),
            settings.start_level,
            options.seed,
            log.clone(),
        );
        selector.register_hook(VANISHING_NPC_VARIANT, vanishing_npc(layout.npc.approach));
        let variants = Rc::new(RefCell::new(selector));

        let player = PlayerRig::new(layout.spawn, settings.player_speed);
        player.look_at(layout.look_at);

        let controller = LevelPhaseController::new(
            LevelRig {
                elevator: reference.elevator.clone(),
                paired: paired.elevator.clone(),
                player,
                variants: variants.clone(),
                hallway_lights,
                night_vision,
                hum: Rc::new(hum),
                breath: Rc::new(breath),
                spawn: layout.spawn,
                far_destination: layout.far_destination,
                look_at: layout.look_at,
            },
            settings.clone(),
            log.clone(),
        );

        let mut bus = TransitionBus::default();
        {
            let mut watcher = TransitionWatcher::new("elevator1.enter", reference.enter_zones.clone());
            let controller = controller.clone();
            watcher.add_callback(
                Rc::new(move || controller.launch_transition(true)),
                EventKind::OnEnter,
            );
            bus.push(watcher.into_handle());
        }
        if let Some(exit_zones) = reference.exit_zones.clone() {
            let mut watcher = TransitionWatcher::new("elevator1.exit", exit_zones);
            let controller = controller.clone();
            let animator = npc_animator.clone();
            let clip = layout.npc.clip.clone();
            watcher.add_callback(
                Rc::new(move || {
                    if controller.start_level() {
                        animator.play(&clip);
                    }
                }),
                EventKind::OnExit,
            );
            bus.push(watcher.into_handle());
        }
        {
            let mut watcher = TransitionWatcher::new("elevator2.enter", paired.enter_zones.clone());
            let controller = controller.clone();
            watcher.add_callback(
                Rc::new(move || controller.launch_transition(false)),
                EventKind::OnEnter,
            );
            bus.push(watcher.into_handle());
        }
        {
            let mut watcher = TransitionWatcher::new("hallway.reveal", reveal.clone());
            let controller = controller.clone();
            watcher.add_callback(
                Rc::new(move || {
                    let controller = controller.clone();
                    tokio::task::spawn_local(async move {
                        controller.trigger_reveal().await;
                    });
                }),
                EventKind::OnEnter,
            );
            bus.push(watcher.into_handle());
        }

        let walkable = ZoneUnion::new(vec![
            reference.body_zones.clone(),
            paired.body_zones.clone(),
            hallway.clone(),
        ]);

        if options.show_zones {
            walkable.view_all_helpers(true);
            for group in [&reference.enter_zones, &paired.enter_zones, &reveal, &npc_zones] {
                group.borrow_mut().view_all_helpers(true);
            }
            if let Some(exit_zones) = &reference.exit_zones {
                exit_zones.borrow_mut().view_all_helpers(true);
            }
        }

        variants.borrow_mut().set_variant_automatic(
            settings.start_level,
            settings.abnormal_probability,
            settings.variant_count,
        )?;
        info!(
            "[eb_engine] level built: {} zone helpers, {} hallway meshes visible",
            scene.helper_count(),
            meshes.visible_meshes().len()
        );

        Ok(Self {
            scene,
            settings,
            log,
            audio,
            meshes,
            npc_model,
            npc_animator,
            npc_zones,
            walkable,
            bus,
            controller,
        })
    }

    /// Level with the bundled hallway model and its visibility config.
    pub fn bundled(settings: GameSettings, seed: u64) -> Result<Self, ZoneError> {
        let visibility = match VisibilityConfig::parse(BUNDLED_VISIBILITY_CONFIG) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!("[eb_engine] bundled visibility config unusable: {err:#}");
                None
            }
        };
        Self::build(
            settings,
            &LevelLayout::default(),
            LevelOptions {
                visibility,
                hallway_meshes: parse_mesh_list(BUNDLED_HALLWAY_MESHES),
                seed,
                show_zones: false,
            },
        )
    }

    /// Ramps up both car lights, then opens both doors.
    pub async fn power_on(&self) -> Result<(), ZoneError> {
        let rig = self.controller.rig();
        let ramp = self.settings.power_on_ramp;
        let target = self.settings.lights.elevator;
        tokio::join!(
            rig.elevator.light().turn_on_gradually(ramp.ms, ramp.steps, target),
            rig.paired.light().turn_on_gradually(ramp.ms, ramp.steps, target)
        );
        self.log.record("level.power_on");
        rig.elevator.door().open()?;
        rig.paired.door().open()?;
        Ok(())
    }

    /// One frame: move the player, then dispatch triggers. The level
    /// triggers only see frames with movement input; variant watchers see
    /// every frame.
    pub fn tick(&self, dt: f32, input: &InputState) -> StepOutcome {
        let player = &self.controller.rig().player;
        let outcome = {
            let blockers = self.npc_zones.borrow();
            player.update(dt, input, Some(&self.walkable), Some(&blockers))
        };
        let position = player.position();
        if outcome.had_input() {
            self.bus.handle_events(position);
        }
        let watchers = self.controller.rig().variants.borrow().active_watchers();
        watchers.handle_events(position);
        outcome
    }

    pub fn controller(&self) -> &LevelPhaseController {
        &self.controller
    }

    pub fn player(&self) -> &PlayerRig {
        &self.controller.rig().player
    }

    pub fn elevator(&self) -> &Elevator {
        &self.controller.rig().elevator
    }

    pub fn paired(&self) -> &Elevator {
        &self.controller.rig().paired
    }

    pub fn variants(&self) -> &RefCell<VariantSelector> {
        &self.controller.rig().variants
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn scene(&self) -> &Rc<Scene> {
        &self.scene
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn audio(&self) -> &AudioRecorder {
        &self.audio
    }

    pub fn meshes(&self) -> &MeshTable {
        &self.meshes
    }

    pub fn npc_model(&self) -> &StaticObject {
        &self.npc_model
    }

    pub fn npc_animator(&self) -> &RecordingClipPlayer {
        &self.npc_animator
    }

    pub fn bus(&self) -> &TransitionBus {
        &self.bus
    }
}

fn build_elevator(
    index: usize,
    layout: &ElevatorLayout,
    settings: &GameSettings,
    scene: &Rc<Scene>,
    audio: &AudioRecorder,
    log: &EventLog,
) -> Result<ElevatorRig, ZoneError> {
    let name = layout.body.name.as_str();
    let body = Rc::new(StaticObject::from_world_bounds(name, layout.body.bounds()));
    let weak = Rc::downgrade(scene);

    let mut body_zones = ZoneGroup::new(name, weak.clone())?;
    body_zones.add_zone(body.clone(), layout.interior.scale, layout.interior.offset);
    let pass_through = body_zones.add_zone(body.clone(), layout.threshold.scale, layout.threshold.offset);
    let body_zones = body_zones.into_handle();

    let mut enter_zones = ZoneGroup::new(format!("{name}.enter"), weak.clone())?;
    enter_zones.add_zone(body.clone(), layout.enter.scale, layout.enter.offset);

    let exit_zones = if layout.exits.is_empty() {
        None
    } else {
        let mut exits = ZoneGroup::new(format!("{name}.exit"), weak)?;
        for exit in &layout.exits {
            exits.add_zone(body.clone(), exit.scale, exit.offset);
        }
        Some(exits.into_handle())
    };

    let cue = |suffix: &str, ms: u64| -> Rc<dyn AudioChannel> {
        Rc::new(SimulatedAudio::new(
            &format!("{name}.{suffix}"),
            Duration::from_millis(ms),
            audio.clone(),
        ))
    };
    let door = DoorController::new(DoorParts {
        label: name.to_string(),
        animator: Rc::new(RecordingClipPlayer::new()),
        clips: DoorClips::default(),
        open_audio: cue("door_open", settings.audio.door_open_ms),
        close_audio: cue("door_close", settings.audio.door_close_ms),
        zones: body_zones.clone(),
        pass_through,
        pass_through_delay: Duration::from_millis(settings.pass_through_delay_ms),
        log: log.clone(),
    })?;

    let light = Tubelight::new(name, settings.lights.elevator);
    light.turn_off();

    let elevator = Elevator::new(ElevatorParts {
        label: name.to_string(),
        door,
        light,
        floors: FloorDisplays::new(settings.start_level, settings.top_floor()),
        ride_audio: cue("ride", settings.audio.ride_ms),
        bell_audio: cue("bell", settings.audio.bell_ms),
        volume: settings.elevator_volumes.get(index).copied().unwrap_or(0.0),
        log: log.clone(),
    });

    Ok(ElevatorRig {
        elevator: Rc::new(elevator),
        body_zones,
        enter_zones: enter_zones.into_handle(),
        exit_zones,
    })
}

/// Watches the area around the NPC; walking into it makes the NPC vanish and
/// stop blocking. The watcher and its debug box live until the next restore.
fn vanishing_npc(approach: ZoneSpec) -> VariantHook {
    Box::new(move |scope: &mut VariantScope<'_>| {
        let (model, blockers) = match scope.npc() {
            Some(npc) => (npc.model.clone(), npc.zones.clone()),
            None => return Ok(()),
        };
        let mut zones = ZoneGroup::new("npc.approach", Rc::downgrade(scope.scene()))?;
        zones.add_zone(model.clone(), approach.scale, approach.offset);
        let bounds = zones.zone(0)?.bounds();

        let log = scope.log().clone();
        let mut watcher = TransitionWatcher::new("npc.approach", zones.into_handle());
        watcher.add_callback(
            Rc::new(move || {
                model.set_visible(false);
                if let Err(err) = blockers.borrow_mut().disable(0) {
                    warn!("[eb_engine] vanishing npc: {err}");
                }
                log.record("variant.npc_vanished");
            }),
            EventKind::OnEnter,
        );
        scope.add_watcher(watcher.into_handle());
        scope.add_debug_visual(BoxHelper::new("npc.approach", bounds, APPROACH_HELPER_COLOR));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_formats::generate_config;
    use glam::Vec3;
    use tokio::task::LocalSet;

    use crate::phase::LevelPhase;
    use crate::variant::BASELINE;

    fn level() -> Level {
        Level::bundled(GameSettings::default(), 11).expect("level")
    }

    #[test]
    fn bundled_config_matches_generator_output() {
        let names = parse_mesh_list(BUNDLED_HALLWAY_MESHES);
        let generated = generate_config(names.iter().map(String::as_str));
        let bundled = VisibilityConfig::parse(BUNDLED_VISIBILITY_CONFIG).expect("bundled config");
        assert_eq!(generated, bundled);
    }

    #[tokio::test(start_paused = true)]
    async fn starts_on_the_baseline_with_doors_shut() {
        LocalSet::new()
            .run_until(async {
                let level = level();
                assert_eq!(level.variants().borrow().current(), BASELINE);
                assert_eq!(level.controller().phase(), LevelPhase::ElevatorLoading);
                assert!(!level.elevator().door().is_open());
                assert_eq!(level.elevator().floors().inner(), 5);
                assert!(level.npc_model().is_visible());
                assert!(level.meshes().is_visible("Poster-h0").expect("mesh"));
                assert!(!level.meshes().is_visible("BloodStain-s0").expect("mesh"));
                assert_eq!(level.bus().len(), 4);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn closed_door_keeps_the_player_inside() {
        LocalSet::new()
            .run_until(async {
                let level = level();
                let start = level.player().position();
                let input = InputState {
                    intent: Vec3::new(0.0, 0.0, 1.0),
                    pointer_locked: true,
                };
                for _ in 0..60 {
                    level.tick(1.0 / 30.0, &input);
                }
                assert!(level.player().position().x >= -170.0);
                assert!(level.player().position().x < start.x);
                assert!(level.player().blocked_steps() > 0);
                assert_eq!(level.controller().phase(), LevelPhase::ElevatorLoading);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn stepping_out_starts_the_level() {
        LocalSet::new()
            .run_until(async {
                let level = level();
                level.power_on().await.expect("power on");
                level.elevator().door().wait_until_opened().await;
                tokio::time::sleep(Duration::from_millis(1_300)).await;
                assert!(level.elevator().door().is_open());

                let input = InputState {
                    intent: Vec3::new(0.0, 0.0, 1.0),
                    pointer_locked: true,
                };
                for _ in 0..60 {
                    level.tick(1.0 / 30.0, &input);
                }
                assert!(level.player().position().x < -320.0);
                assert_eq!(level.controller().phase(), LevelPhase::HallwayBeforeReveal);
                assert!(level.log().contains("phase.start_level"));
                assert!(level.npc_animator().is_running("idle"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn vanishing_npc_hides_on_approach_and_returns_on_restore() {
        LocalSet::new()
            .run_until(async {
                let level = level();
                level
                    .variants()
                    .borrow_mut()
                    .set_variant(VANISHING_NPC_VARIANT)
                    .expect("variant");
                assert_eq!(level.variants().borrow().debug_visual_count(), 1);
                assert_eq!(level.meshes().is_visible("Vent-h5"), Some(false));

                level.player().teleport(Vec3::new(-3_150.0, 300.0, 1_000.0));
                level.tick(1.0 / 30.0, &InputState::idle());
                assert!(!level.npc_model().is_visible());
                assert!(level.log().contains("variant.npc_vanished"));

                level.variants().borrow_mut().restore().expect("restore");
                assert!(level.npc_model().is_visible());
                assert_eq!(level.variants().borrow().debug_visual_count(), 0);
                assert_eq!(level.meshes().is_visible("Vent-h5"), Some(true));
                assert!(level.variants().borrow().is_baseline());
            })
            .await;
    }
}

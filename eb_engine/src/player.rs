//! First-person rig: camera position/yaw plus the movement gate.

use std::cell::RefCell;
use std::f32::consts::{PI, TAU};
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::timing::step_interval;
use crate::zones::{ZoneGroup, ZoneUnion};

/// Movement intent for one frame. `intent.x` strafes right, `intent.z` walks
/// forward, both relative to the camera yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    pub intent: Vec3,
    pub pointer_locked: bool,
}

impl InputState {
    pub fn idle() -> Self {
        Self {
            intent: Vec3::ZERO,
            pointer_locked: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterParams {
    pub amplitude: Vec3,
    /// Angular speed per axis, in radians per millisecond.
    pub speed: Vec3,
    pub duration_ms: u64,
    pub steps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Gate closed, rig disabled or no input.
    Idle,
    Moved,
    /// Input present but the step left the walkable area or hit a blocker.
    Blocked,
}

impl StepOutcome {
    pub fn had_input(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

#[derive(Debug)]
struct RigState {
    position: Vec3,
    yaw: f32,
    can_move: bool,
    enabled: bool,
    speed: f32,
    blocked_steps: u64,
}

#[derive(Debug, Clone)]
pub struct PlayerRig {
    state: Rc<RefCell<RigState>>,
}

impl PlayerRig {
    pub fn new(position: Vec3, speed: f32) -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState {
                position,
                yaw: 0.0,
                can_move: true,
                enabled: true,
                speed,
                blocked_steps: 0,
            })),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.state.borrow().position
    }

    pub fn teleport(&self, position: Vec3) {
        self.state.borrow_mut().position = position;
    }

    /// Yaw in radians; zero looks down -Z.
    pub fn yaw(&self) -> f32 {
        self.state.borrow().yaw
    }

    pub fn set_yaw(&self, yaw: f32) {
        self.state.borrow_mut().yaw = yaw.rem_euclid(TAU);
    }

    pub fn turn_around(&self) {
        let yaw = self.yaw();
        self.set_yaw(yaw + PI);
    }

    pub fn look_at(&self, target: Vec3) {
        let delta = target - self.position();
        if delta.x == 0.0 && delta.z == 0.0 {
            return;
        }
        self.set_yaw((-delta.x).atan2(-delta.z));
    }

    pub fn forward(&self) -> Vec3 {
        let yaw = self.yaw();
        Vec3::new(-yaw.sin(), 0.0, -yaw.cos())
    }

    pub fn right(&self) -> Vec3 {
        let yaw = self.yaw();
        Vec3::new(yaw.cos(), 0.0, -yaw.sin())
    }

    pub fn can_move(&self) -> bool {
        self.state.borrow().can_move
    }

    pub fn set_can_move(&self, can_move: bool) {
        self.state.borrow_mut().can_move = can_move;
    }

    pub fn enable(&self) {
        self.state.borrow_mut().enabled = true;
    }

    pub fn disable(&self) {
        self.state.borrow_mut().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    pub fn speed(&self) -> f32 {
        self.state.borrow().speed
    }

    pub fn blocked_steps(&self) -> u64 {
        self.state.borrow().blocked_steps
    }

    /// Camera-relative intent that walks toward `direction` in world space.
    pub fn intent_toward(&self, direction: Vec3) -> Vec3 {
        let flat = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
        Vec3::new(flat.dot(self.right()), 0.0, flat.dot(self.forward()))
    }

    /// Applies one frame of input. A step that leaves the walkable union, or
    /// lands inside a blocker, is reverted.
    pub fn update(
        &self,
        dt: f32,
        input: &InputState,
        walkable: Option<&ZoneUnion>,
        blockers: Option<&ZoneGroup>,
    ) -> StepOutcome {
        if !self.is_enabled() || !self.can_move() || !input.pointer_locked {
            return StepOutcome::Idle;
        }
        let intent = Vec3::new(input.intent.x, 0.0, input.intent.z);
        if intent.length_squared() == 0.0 {
            return StepOutcome::Idle;
        }
        let intent = intent.normalize();
        let step = (self.right() * intent.x + self.forward() * intent.z) * self.speed() * dt;
        let next = self.position() + step;

        let outside = walkable.is_some_and(|zones| !zones.is_in_any_zone(next));
        let blocked = blockers.is_some_and(|zones| zones.is_in_any_zone(next));
        let mut state = self.state.borrow_mut();
        if outside || blocked {
            state.blocked_steps += 1;
            return StepOutcome::Blocked;
        }
        state.position = next;
        StepOutcome::Moved
    }

    /// Shakes the camera around its current position with a per-axis sine,
    /// then puts it back exactly.
    pub async fn jitter(&self, params: JitterParams) {
        let origin = self.position();
        let interval = step_interval(params.duration_ms, params.steps);
        let interval_ms = interval.as_secs_f32() * 1000.0;
        let mut elapsed_ms = 0.0_f32;
        for _ in 0..params.steps {
            let phase = params.speed * elapsed_ms;
            let wobble = Vec3::new(phase.x.sin(), phase.y.sin(), phase.z.sin()) * params.amplitude;
            self.teleport(origin + wobble);
            tokio::time::sleep(interval).await;
            elapsed_ms += interval_ms;
        }
        self.teleport(origin);
    }

    /// Linear move to `destination` while facing `look_at`. The movement gate
    /// is closed for the duration and restored afterwards.
    pub async fn smooth_move(&self, destination: Vec3, look_at: Vec3, ms: u64, steps: u32) {
        let previous_gate = self.can_move();
        self.set_can_move(false);
        let start = self.position();
        let steps = steps.max(1);
        let interval = step_interval(ms, steps);
        for index in 0..steps {
            let t = index as f32 / steps as f32;
            self.teleport(start.lerp(destination, t));
            self.look_at(look_at);
            tokio::time::sleep(interval).await;
        }
        self.teleport(destination);
        self.look_at(look_at);
        self.set_can_move(previous_gate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Aabb, StaticObject};
    use crate::scene::Scene;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    fn floor_union(scene: &Rc<Scene>) -> ZoneUnion {
        let mut zones = ZoneGroup::new("floor", Rc::downgrade(scene)).expect("scene");
        zones.add_zone(
            Rc::new(StaticObject::from_world_bounds(
                "floor",
                Aabb::new(Vec3::new(-100.0, 0.0, -100.0), Vec3::new(100.0, 10.0, 100.0)),
            )),
            Vec3::ONE,
            Vec3::ZERO,
        );
        ZoneUnion::new(vec![zones.into_handle()])
    }

    #[test]
    fn forward_follows_yaw() {
        let rig = PlayerRig::new(Vec3::ZERO, 100.0);
        assert!(approx(rig.forward(), Vec3::new(0.0, 0.0, -1.0)));
        rig.look_at(Vec3::new(-50.0, 0.0, 0.0));
        assert!(approx(rig.forward(), Vec3::new(-1.0, 0.0, 0.0)));
        rig.turn_around();
        assert!(approx(rig.forward(), Vec3::new(1.0, 0.0, 0.0)));
        assert!(rig.yaw() >= 0.0 && rig.yaw() < TAU);
    }

    #[test]
    fn steps_outside_the_walkable_area_are_reverted() {
        let scene = Scene::new();
        let walkable = floor_union(&scene);
        let rig = PlayerRig::new(Vec3::new(0.0, 5.0, 0.0), 100.0);
        rig.look_at(Vec3::new(100.0, 5.0, 0.0));
        let input = InputState {
            intent: rig.intent_toward(Vec3::X),
            pointer_locked: true,
        };

        assert_eq!(rig.update(0.5, &input, Some(&walkable), None), StepOutcome::Moved);
        assert!(approx(rig.position(), Vec3::new(50.0, 5.0, 0.0)));
        assert_eq!(rig.update(1.0, &input, Some(&walkable), None), StepOutcome::Blocked);
        assert!(approx(rig.position(), Vec3::new(50.0, 5.0, 0.0)));
        assert_eq!(rig.blocked_steps(), 1);
    }

    #[test]
    fn closed_gate_or_unlocked_pointer_ignores_input() {
        let rig = PlayerRig::new(Vec3::ZERO, 100.0);
        let mut input = InputState {
            intent: Vec3::new(0.0, 0.0, 1.0),
            pointer_locked: false,
        };
        assert_eq!(rig.update(1.0, &input, None, None), StepOutcome::Idle);

        input.pointer_locked = true;
        rig.set_can_move(false);
        assert_eq!(rig.update(1.0, &input, None, None), StepOutcome::Idle);
        assert_eq!(rig.position(), Vec3::ZERO);

        rig.set_can_move(true);
        assert_eq!(rig.update(1.0, &input, None, None), StepOutcome::Moved);
        assert!(approx(rig.position(), Vec3::new(0.0, 0.0, -100.0)));
    }

    #[test]
    fn blockers_stop_the_player() {
        let scene = Scene::new();
        let mut npc = ZoneGroup::new("npc", Rc::downgrade(&scene)).expect("scene");
        npc.add_zone(
            Rc::new(StaticObject::from_world_bounds(
                "npc",
                Aabb::from_center_size(Vec3::new(0.0, 0.0, -50.0), Vec3::splat(20.0)),
            )),
            Vec3::ONE,
            Vec3::ZERO,
        );
        let rig = PlayerRig::new(Vec3::ZERO, 100.0);
        let input = InputState {
            intent: Vec3::new(0.0, 0.0, 1.0),
            pointer_locked: true,
        };
        assert_eq!(rig.update(0.5, &input, None, Some(&npc)), StepOutcome::Blocked);
        npc.disable(0).expect("disable");
        assert_eq!(rig.update(0.5, &input, None, Some(&npc)), StepOutcome::Moved);
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_returns_to_the_original_position() {
        let rig = PlayerRig::new(Vec3::new(90.0, 300.0, 0.0), 100.0);
        let observed = rig.clone();
        let params = JitterParams {
            amplitude: Vec3::new(0.5, 0.7, 0.5),
            speed: Vec3::new(0.8, 2.0, 0.8),
            duration_ms: 4_000,
            steps: 100,
        };
        let shaking = async {
            tokio::time::sleep(std::time::Duration::from_millis(1_010)).await;
            observed.position()
        };
        let ((), during) = tokio::join!(rig.jitter(params), shaking);
        assert!(during != Vec3::new(90.0, 300.0, 0.0));
        assert!((during - Vec3::new(90.0, 300.0, 0.0)).abs().cmple(Vec3::new(0.5, 0.7, 0.5)).all());
        assert_eq!(rig.position(), Vec3::new(90.0, 300.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn smooth_move_lands_and_restores_gate() {
        let rig = PlayerRig::new(Vec3::new(-6_070.0, 300.0, 0.0), 100.0);
        rig.set_can_move(false);
        rig.smooth_move(Vec3::new(-6_240.0, 300.0, 0.0), Vec3::new(-90.0, 300.0, 0.0), 2_000, 200)
            .await;
        assert_eq!(rig.position(), Vec3::new(-6_240.0, 300.0, 0.0));
        assert!(approx(rig.forward(), Vec3::X));
        assert!(!rig.can_move());

        rig.set_can_move(true);
        rig.smooth_move(Vec3::new(90.0, 300.0, 0.0), Vec3::new(-90.0, 300.0, 0.0), 100, 10)
            .await;
        assert!(rig.can_move());
        assert!(approx(rig.forward(), -Vec3::X));
    }
}

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::Aabb;

/// A placed object, described by its world-space box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    pub center: Vec3,
    pub size: Vec3,
}

impl ObjectSpec {
    pub fn new(name: &str, center: Vec3, size: Vec3) -> Self {
        Self {
            name: name.to_string(),
            center,
            size,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_size(self.center, self.size)
    }
}

/// Zone box relative to its reference object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSpec {
    pub scale: Vec3,
    pub offset: Vec3,
}

impl Default for ZoneSpec {
    fn default() -> Self {
        Self::WHOLE
    }
}

impl ZoneSpec {
    pub const WHOLE: Self = Self {
        scale: Vec3::ONE,
        offset: Vec3::ZERO,
    };

    pub const fn new(scale: Vec3, offset: Vec3) -> Self {
        Self { scale, offset }
    }

    pub fn bounds_on(&self, object: &ObjectSpec) -> Aabb {
        object.bounds().scaled_about_center(self.scale, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevatorLayout {
    pub body: ObjectSpec,
    pub interior: ZoneSpec,
    /// Doorway zone, walkable only while the door is open.
    pub threshold: ZoneSpec,
    /// Plane inside the car; entering it starts the next-level transition.
    pub enter: ZoneSpec,
    /// Planes at the doorway; leaving them starts the level. Empty for an
    /// elevator the player never starts in.
    #[serde(default)]
    pub exits: Vec<ZoneSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallwayLayout {
    /// Walkable floor segments.
    pub segments: Vec<ObjectSpec>,
    /// Line across the corridor that sets off the reveal.
    pub reveal: ObjectSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcLayout {
    pub body: ObjectSpec,
    pub blocker: ZoneSpec,
    /// Area around the NPC watched by the vanishing-NPC variant.
    pub approach: ZoneSpec,
    pub clip: String,
}

/// Waypoints on the floor plane (`x`, `z`) for the scripted player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotRoutes {
    /// Through the hallway into the far elevator.
    pub forward: Vec<Vec2>,
    /// Past the reveal and back into the starting elevator.
    pub back: Vec<Vec2>,
    /// Past the reveal, then stand still.
    pub idle: Vec<Vec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelLayout {
    pub reference: ElevatorLayout,
    pub paired: ElevatorLayout,
    pub hallway: HallwayLayout,
    pub npc: NpcLayout,
    pub spawn: Vec3,
    pub far_destination: Vec3,
    pub look_at: Vec3,
    pub routes: PilotRoutes,
}

impl Default for LevelLayout {
    fn default() -> Self {
        let car = Vec3::new(600.0, 700.0, 600.0);
        let interior = Vec3::splat(0.7);
        let threshold = Vec3::new(0.4, 0.7, 0.5);
        let plane = Vec3::new(0.05, 0.7, 0.8);
        Self {
            reference: ElevatorLayout {
                body: ObjectSpec::new("elevator1", Vec3::new(0.0, 350.0, 0.0), car),
                interior: ZoneSpec::new(interior, Vec3::new(40.0, 0.0, 0.0)),
                threshold: ZoneSpec::new(threshold, Vec3::new(-200.0, 0.0, 0.0)),
                enter: ZoneSpec::new(plane, Vec3::new(-70.0, 0.0, 0.0)),
                exits: vec![
                    ZoneSpec::new(plane, Vec3::new(-300.0, 0.0, 0.0)),
                    ZoneSpec::new(Vec3::new(0.17, 0.7, 0.05), Vec3::new(-250.0, 0.0, 180.0)),
                    ZoneSpec::new(Vec3::new(0.17, 0.7, 0.05), Vec3::new(-250.0, 0.0, -180.0)),
                ],
            },
            paired: ElevatorLayout {
                body: ObjectSpec::new("elevator2", Vec3::new(-6_150.0, 350.0, 0.0), car),
                interior: ZoneSpec::new(interior, Vec3::new(-40.0, 0.0, 0.0)),
                threshold: ZoneSpec::new(threshold, Vec3::new(200.0, 0.0, 0.0)),
                enter: ZoneSpec::new(plane, Vec3::new(70.0, 0.0, 0.0)),
                exits: Vec::new(),
            },
            hallway: HallwayLayout {
                segments: vec![
                    ObjectSpec::new(
                        "hallway_near",
                        Vec3::new(-450.0, 350.0, 500.0),
                        Vec3::new(300.0, 700.0, 1_400.0),
                    ),
                    ObjectSpec::new(
                        "hallway_long",
                        Vec3::new(-3_075.0, 350.0, 1_000.0),
                        Vec3::new(5_550.0, 700.0, 400.0),
                    ),
                    ObjectSpec::new(
                        "hallway_far",
                        Vec3::new(-5_700.0, 350.0, 500.0),
                        Vec3::new(300.0, 700.0, 1_400.0),
                    ),
                ],
                reveal: ObjectSpec::new(
                    "reveal_line",
                    Vec3::new(-2_000.0, 350.0, 1_000.0),
                    Vec3::new(40.0, 700.0, 400.0),
                ),
            },
            npc: NpcLayout {
                body: ObjectSpec::new(
                    "npc",
                    Vec3::new(-3_000.0, 300.0, 1_180.0),
                    Vec3::new(60.0, 600.0, 60.0),
                ),
                blocker: ZoneSpec::WHOLE,
                approach: ZoneSpec::new(Vec3::new(8.0, 1.0, 8.0), Vec3::ZERO),
                clip: "idle".to_string(),
            },
            spawn: Vec3::new(90.0, 300.0, 0.0),
            far_destination: Vec3::new(-6_240.0, 300.0, 0.0),
            look_at: Vec3::new(-90.0, 300.0, 0.0),
            routes: PilotRoutes {
                forward: vec![
                    Vec2::new(-450.0, 0.0),
                    Vec2::new(-450.0, 1_000.0),
                    Vec2::new(-5_700.0, 1_000.0),
                    Vec2::new(-5_700.0, 0.0),
                    Vec2::new(-6_240.0, 0.0),
                ],
                back: vec![
                    Vec2::new(-450.0, 0.0),
                    Vec2::new(-450.0, 1_000.0),
                    Vec2::new(-2_500.0, 1_000.0),
                    Vec2::new(-450.0, 1_000.0),
                    Vec2::new(-450.0, 0.0),
                    Vec2::new(90.0, 0.0),
                ],
                idle: vec![
                    Vec2::new(-450.0, 0.0),
                    Vec2::new(-450.0, 1_000.0),
                    Vec2::new(-2_500.0, 1_000.0),
                ],
            },
        }
    }
}

impl LevelLayout {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading layout {}", path.display()))?;
        let layout: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing layout {}", path.display()))?;
        layout
            .validate()
            .with_context(|| format!("checking layout {}", path.display()))?;
        Ok(layout)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    /// The player must land inside a car after every ride.
    pub fn validate(&self) -> Result<()> {
        let reference = self.reference.interior.bounds_on(&self.reference.body);
        if !reference.contains_point(self.spawn) {
            bail!("spawn {} is outside the {} interior", self.spawn, self.reference.body.name);
        }
        let paired = self.paired.interior.bounds_on(&self.paired.body);
        if !paired.contains_point(self.far_destination) {
            bail!(
                "far destination {} is outside the {} interior",
                self.far_destination,
                self.paired.body.name
            );
        }
        if self.hallway.segments.is_empty() {
            bail!("hallway has no walkable segments");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_floor(point: Vec2) -> Vec3 {
        Vec3::new(point.x, 300.0, point.y)
    }

    fn walkable(layout: &LevelLayout, point: Vec3) -> bool {
        let elevator = |car: &ElevatorLayout| {
            car.interior.bounds_on(&car.body).contains_point(point)
                || car.threshold.bounds_on(&car.body).contains_point(point)
        };
        elevator(&layout.reference)
            || elevator(&layout.paired)
            || layout
                .hallway
                .segments
                .iter()
                .any(|segment| segment.bounds().contains_point(point))
    }

    #[test]
    fn default_layout_is_valid() {
        LevelLayout::default().validate().expect("valid");
    }

    #[test]
    fn routes_stay_walkable() {
        let layout = LevelLayout::default();
        for route in [&layout.routes.forward, &layout.routes.back, &layout.routes.idle] {
            let mut from = layout.spawn;
            for waypoint in route {
                let to = on_floor(*waypoint);
                for step in 0..=100 {
                    let point = from.lerp(to, step as f32 / 100.0);
                    assert!(walkable(&layout, point), "{point} off the floor");
                }
                from = to;
            }
        }
    }

    #[test]
    fn forward_route_crosses_reveal_and_far_enter_plane() {
        let layout = LevelLayout::default();
        let reveal = layout.hallway.reveal.bounds();
        let far_enter = layout.paired.enter.bounds_on(&layout.paired.body);
        let crosses = |bounds: Aabb| {
            let mut from = layout.spawn;
            layout.routes.forward.iter().any(|waypoint| {
                let to = on_floor(*waypoint);
                let hit = (0..=400).any(|step| bounds.contains_point(from.lerp(to, step as f32 / 400.0)));
                from = to;
                hit
            })
        };
        assert!(crosses(reveal));
        assert!(crosses(far_enter));
    }

    #[test]
    fn spawn_outside_car_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("layout.json");
        let mut layout = LevelLayout::default();
        layout.spawn = Vec3::new(-1_000.0, 300.0, 0.0);
        fs::write(&path, serde_json::to_string(&layout).expect("serialize")).expect("write");
        let err = LevelLayout::load(Some(&path)).expect_err("invalid spawn");
        assert!(format!("{err:#}").contains("outside the elevator1 interior"));
    }
}

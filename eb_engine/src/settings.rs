use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::lighting::{FlickerPattern, Intensities, Ramp};
use crate::player::JitterParams;

/// Countdown after the hallway reveal, in seconds from the moment it arms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownSettings {
    pub dying_after_s: f64,
    pub breathing_after_s: f64,
    pub failure_after_s: f64,
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self {
            dying_after_s: 300.0,
            breathing_after_s: 318.0,
            failure_after_s: 360.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub elevator: Intensities,
    pub hallway: Intensities,
    pub ambient: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            elevator: [1.2, 1.5, 1.2],
            hallway: [0.9, 1.1, 0.9],
            ambient: 0.6,
        }
    }
}

/// Lengths of the finite sound cues; the simulated channels end on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub door_open_ms: u64,
    pub door_close_ms: u64,
    pub bell_ms: u64,
    pub breath_ms: u64,
    pub ride_ms: u64,
    pub hum_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            door_open_ms: 2_400,
            door_close_ms: 2_200,
            bell_ms: 1_500,
            breath_ms: 9_000,
            ride_ms: 6_000,
            hum_ms: 12_000,
        }
    }
}

/// Tunables for one play session. Every field has a default, so a settings
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub start_level: u32,
    pub abnormal_probability: f64,
    pub variant_count: u32,
    /// Volumes of the reference and the paired elevator.
    pub elevator_volumes: [f32; 2],
    pub pass_through_delay_ms: u64,
    pub player_speed: f32,
    pub ride_jitter: JitterParams,
    pub ride_flicker: FlickerPattern,
    pub reveal_flicker: FlickerPattern,
    pub reveal_fade: Ramp,
    pub power_on_ramp: Ramp,
    pub return_move: Ramp,
    pub settle_delay_ms: u64,
    pub hallway_ramp: Ramp,
    pub countdown: CountdownSettings,
    pub lights: LightSettings,
    pub audio: AudioSettings,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            start_level: 5,
            abnormal_probability: 0.7,
            variant_count: 13,
            elevator_volumes: [1.0, 0.0],
            pass_through_delay_ms: 1_200,
            player_speed: 600.0,
            ride_jitter: JitterParams {
                amplitude: Vec3::new(0.5, 0.7, 0.5),
                speed: Vec3::new(0.8, 2.0, 0.8),
                duration_ms: 4_000,
                steps: 100,
            },
            ride_flicker: FlickerPattern {
                dark_ms: vec![50, 25, 10],
                bright_ms: vec![50, 25, 10],
                mid: vec![0.5, 0.8, 1.0],
            },
            reveal_flicker: FlickerPattern {
                dark_ms: vec![500, 250, 100],
                bright_ms: vec![500, 250, 100],
                mid: vec![0.3, 0.8, 0.3],
            },
            reveal_fade: Ramp::new(500, 50),
            power_on_ramp: Ramp::new(100, 50),
            return_move: Ramp::new(2_000, 200),
            settle_delay_ms: 300,
            hallway_ramp: Ramp::new(500, 50),
            countdown: CountdownSettings::default(),
            lights: LightSettings::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl GameSettings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing settings {}", path.display()))
    }

    /// Defaults when `path` is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Top floor of the building; rides never go above it.
    pub fn top_floor(&self) -> u32 {
        self.start_level
    }
}

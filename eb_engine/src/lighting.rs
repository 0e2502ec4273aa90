//! Tube lights (three point lights each) and the fades/flickers the level
//! scripts run on them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timing::{sleep_ms, step_interval};

pub type Intensities = [f32; 3];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LightingError {
    #[error("flicker lists {mid} intensity steps but only {dark} dark and {bright} bright durations")]
    FlickerTooLong {
        mid: usize,
        dark: usize,
        bright: usize,
    },
}

/// One flicker: for each mid step the light goes dark for `dark_ms[i]`, then
/// comes back at `mid[i]` times its level for `bright_ms[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlickerPattern {
    pub dark_ms: Vec<u64>,
    pub bright_ms: Vec<u64>,
    pub mid: Vec<f32>,
}

impl FlickerPattern {
    pub fn validate(&self) -> Result<(), LightingError> {
        if self.mid.len() > self.dark_ms.len() || self.mid.len() > self.bright_ms.len() {
            return Err(LightingError::FlickerTooLong {
                mid: self.mid.len(),
                dark: self.dark_ms.len(),
                bright: self.bright_ms.len(),
            });
        }
        Ok(())
    }

    /// Sum of every listed duration, which is how long a light system waits.
    pub fn total_ms(&self) -> u64 {
        self.dark_ms.iter().sum::<u64>() + self.bright_ms.iter().sum::<u64>()
    }
}

/// Linear ramp settings shared by fades and camera moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ramp {
    pub ms: u64,
    pub steps: u32,
}

impl Ramp {
    pub const fn new(ms: u64, steps: u32) -> Self {
        Self { ms, steps }
    }
}

#[derive(Debug)]
struct LightState {
    lit: Intensities,
    /// Last level explicitly set; `turn_on` returns to it.
    stored: Intensities,
}

#[derive(Debug, Clone)]
pub struct Tubelight {
    label: Rc<str>,
    state: Rc<RefCell<LightState>>,
}

impl Tubelight {
    pub fn new(label: &str, intensities: Intensities) -> Self {
        Self {
            label: Rc::from(label),
            state: Rc::new(RefCell::new(LightState {
                lit: intensities,
                stored: intensities,
            })),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn intensities(&self) -> Intensities {
        self.state.borrow().lit
    }

    pub fn stored_intensities(&self) -> Intensities {
        self.state.borrow().stored
    }

    pub fn set_intensity(&self, intensity: f32) {
        self.set_intensities([intensity; 3]);
    }

    pub fn set_intensities(&self, intensities: Intensities) {
        let mut state = self.state.borrow_mut();
        state.lit = intensities;
        state.stored = intensities;
    }

    pub fn turn_on(&self) {
        let mut state = self.state.borrow_mut();
        state.lit = state.stored;
    }

    /// Darkens without forgetting the stored level.
    pub fn turn_off(&self) {
        self.state.borrow_mut().lit = [0.0; 3];
    }

    /// Ramps from zero up to `target` in `steps` equal slices over `ms`.
    pub async fn turn_on_gradually(&self, ms: u64, steps: u32, target: Intensities) {
        let steps = steps.max(1);
        let delta = target.map(|value| value / steps as f32);
        let interval = step_interval(ms, steps);
        let mut current = [0.0; 3];
        for _ in 0..steps {
            self.set_intensities(current);
            for (value, step) in current.iter_mut().zip(delta) {
                *value += step;
            }
            tokio::time::sleep(interval).await;
        }
        self.set_intensities(target);
    }

    /// Ramps from the stored level down to zero; the stored level ends at zero.
    pub async fn turn_off_gradually(&self, ms: u64, steps: u32) {
        let steps = steps.max(1);
        let start = self.stored_intensities();
        let delta = start.map(|value| -value / steps as f32);
        let interval = step_interval(ms, steps);
        let mut current = start;
        for _ in 0..steps {
            self.set_intensities(current);
            for (value, step) in current.iter_mut().zip(delta) {
                *value += step;
            }
            tokio::time::sleep(interval).await;
        }
        self.set_intensity(0.0);
    }

    pub async fn flicker(&self, pattern: &FlickerPattern) -> Result<(), LightingError> {
        pattern.validate()?;
        let original = self.stored_intensities();
        for (index, level) in pattern.mid.iter().enumerate() {
            self.set_intensity(0.0);
            sleep_ms(pattern.dark_ms[index]).await;
            self.set_intensities(original.map(|value| value * level));
            sleep_ms(pattern.bright_ms[index]).await;
        }
        self.set_intensities(original);
        Ok(())
    }
}

/// Lights driven together. Timed effects start on every light and the call
/// returns after the nominal duration rather than joining each light.
#[derive(Debug, Clone, Default)]
pub struct TubelightSystem {
    lights: Vec<Tubelight>,
}

impl TubelightSystem {
    pub fn new(lights: Vec<Tubelight>) -> Self {
        Self { lights }
    }

    pub fn lights(&self) -> &[Tubelight] {
        &self.lights
    }

    pub fn set_intensity(&self, intensity: f32) {
        self.lights.iter().for_each(|light| light.set_intensity(intensity));
    }

    pub fn set_intensities(&self, intensities: Intensities) {
        self.lights
            .iter()
            .for_each(|light| light.set_intensities(intensities));
    }

    pub fn turn_on(&self) {
        self.lights.iter().for_each(Tubelight::turn_on);
    }

    pub fn turn_off(&self) {
        self.lights.iter().for_each(Tubelight::turn_off);
    }

    pub fn is_dark(&self) -> bool {
        self.lights
            .iter()
            .all(|light| light.intensities().iter().all(|value| *value <= 0.0))
    }

    pub async fn turn_on_gradually(&self, ms: u64, steps: u32, target: Intensities) {
        for light in &self.lights {
            let light = light.clone();
            tokio::task::spawn_local(async move {
                light.turn_on_gradually(ms, steps, target).await;
            });
        }
        sleep_ms(ms).await;
    }

    pub async fn turn_off_gradually(&self, ms: u64, steps: u32) {
        for light in &self.lights {
            let light = light.clone();
            tokio::task::spawn_local(async move {
                light.turn_off_gradually(ms, steps).await;
            });
        }
        sleep_ms(ms).await;
    }

    pub async fn flicker(&self, pattern: &FlickerPattern) -> Result<(), LightingError> {
        pattern.validate()?;
        for light in &self.lights {
            let light = light.clone();
            let pattern = pattern.clone();
            tokio::task::spawn_local(async move {
                // Already validated above.
                let _ = light.flicker(&pattern).await;
            });
        }
        sleep_ms(pattern.total_ms()).await;
        Ok(())
    }
}

/// Scene-wide fill light; "off" keeps a faint floor so the scene is never
/// pitch black.
#[derive(Debug)]
pub struct AmbientLight {
    intensity: Cell<f32>,
    original: Cell<f32>,
}

pub const AMBIENT_OFF_LEVEL: f32 = 0.02;

impl AmbientLight {
    pub fn new(intensity: f32) -> Self {
        Self {
            intensity: Cell::new(AMBIENT_OFF_LEVEL),
            original: Cell::new(intensity),
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity.get()
    }

    pub fn set_intensity(&self, intensity: f32) {
        self.intensity.set(intensity);
        self.original.set(intensity);
    }

    pub fn turn_on(&self) {
        self.intensity.set(self.original.get());
    }

    pub fn turn_off(&self) {
        self.intensity.set(AMBIENT_OFF_LEVEL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    fn pattern(dark: &[u64], bright: &[u64], mid: &[f32]) -> FlickerPattern {
        FlickerPattern {
            dark_ms: dark.to_vec(),
            bright_ms: bright.to_vec(),
            mid: mid.to_vec(),
        }
    }

    #[test]
    fn flicker_rejects_more_levels_than_durations() {
        let err = pattern(&[50, 25], &[50, 25, 10], &[0.5, 0.8, 1.0])
            .validate()
            .expect_err("mid longer than dark");
        assert_eq!(
            err,
            LightingError::FlickerTooLong {
                mid: 3,
                dark: 2,
                bright: 3
            }
        );
        assert!(pattern(&[1, 2, 3], &[4, 5, 6], &[0.5]).validate().is_ok());
    }

    #[test]
    fn turn_off_keeps_stored_level() {
        let light = Tubelight::new("elevator", [1.0, 2.0, 1.0]);
        light.turn_off();
        assert_eq!(light.intensities(), [0.0; 3]);
        light.turn_on();
        assert_eq!(light.intensities(), [1.0, 2.0, 1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn gradual_fades_land_on_their_targets() {
        let light = Tubelight::new("hallway", [0.0; 3]);
        light.turn_on_gradually(500, 50, [2.0, 4.0, 2.0]).await;
        assert_eq!(light.intensities(), [2.0, 4.0, 2.0]);

        light.turn_off_gradually(500, 50).await;
        assert_eq!(light.intensities(), [0.0; 3]);
        light.turn_on();
        assert_eq!(light.intensities(), [0.0; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn flicker_restores_the_original_level() {
        let light = Tubelight::new("elevator", [3.0; 3]);
        let flicker = pattern(&[50, 25, 10], &[50, 25, 10], &[0.5, 0.8, 1.0]);
        let observed = light.clone();
        let run = async { light.flicker(&flicker).await };
        let check = async {
            tokio::time::sleep(std::time::Duration::from_millis(60)).await;
            observed.intensities()
        };
        let (result, mid_level) = tokio::join!(run, check);
        result.expect("valid pattern");
        assert_eq!(mid_level, [1.5; 3]);
        assert_eq!(light.intensities(), [3.0; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn system_waits_for_the_whole_flicker() {
        LocalSet::new()
            .run_until(async {
                let lights = TubelightSystem::new(vec![
                    Tubelight::new("a", [1.0; 3]),
                    Tubelight::new("b", [2.0; 3]),
                ]);
                let started = tokio::time::Instant::now();
                lights
                    .flicker(&pattern(&[500, 250, 100], &[500, 250, 100], &[0.3, 0.8, 0.3]))
                    .await
                    .expect("valid pattern");
                assert_eq!(started.elapsed().as_millis(), 1_700);
                sleep_ms(1).await;
                assert_eq!(lights.lights()[1].intensities(), [2.0; 3]);

                lights.turn_off_gradually(500, 50).await;
                sleep_ms(1).await;
                assert!(lights.is_dark());
            })
            .await;
    }

    #[test]
    fn ambient_off_keeps_a_floor() {
        let ambient = AmbientLight::new(0.5);
        assert_eq!(ambient.intensity(), AMBIENT_OFF_LEVEL);
        ambient.turn_on();
        assert_eq!(ambient.intensity(), 0.5);
        ambient.turn_off();
        assert_eq!(ambient.intensity(), AMBIENT_OFF_LEVEL);
    }
}

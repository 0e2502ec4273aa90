//! Floor displays and the ride sequences of the two elevators.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;

use crate::audio::AudioChannel;
use crate::door::DoorController;
use crate::events::EventLog;
use crate::lighting::Tubelight;
use crate::player::PlayerRig;
use crate::settings::GameSettings;
use crate::variant::VariantSelector;
use crate::zones::ZoneError;

/// Floor number clamped to `1..=top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FloorCounter {
    current: u32,
    top: u32,
}

impl FloorCounter {
    pub fn new(current: u32, top: u32) -> Self {
        let top = top.max(1);
        Self {
            current: current.clamp(1, top),
            top,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    /// Floor reached by moving one step, without moving.
    pub fn peek(&self, ascending: bool) -> u32 {
        if ascending {
            (self.current + 1).min(self.top)
        } else {
            self.current.saturating_sub(1).max(1)
        }
    }

    pub fn step(&mut self, ascending: bool) -> u32 {
        self.current = self.peek(ascending);
        self.current
    }
}

/// The number shown inside the car and the one above the hallway door.
#[derive(Debug)]
pub struct FloorDisplays {
    inner: Cell<FloorCounter>,
    outer: Cell<FloorCounter>,
}

impl FloorDisplays {
    pub fn new(current: u32, top: u32) -> Self {
        Self {
            inner: Cell::new(FloorCounter::new(current, top)),
            outer: Cell::new(FloorCounter::new(current, top)),
        }
    }

    pub fn inner(&self) -> u32 {
        self.inner.get().current()
    }

    pub fn outer(&self) -> u32 {
        self.outer.get().current()
    }

    pub fn peek(&self, ascending: bool) -> u32 {
        self.inner.get().peek(ascending)
    }

    pub fn step(&self, ascending: bool) -> u32 {
        let mut inner = self.inner.get();
        let mut outer = self.outer.get();
        inner.step(ascending);
        outer.step(ascending);
        self.inner.set(inner);
        self.outer.set(outer);
        inner.current()
    }
}

pub struct ElevatorParts {
    pub label: String,
    pub door: DoorController,
    pub light: Tubelight,
    pub floors: FloorDisplays,
    pub ride_audio: Rc<dyn AudioChannel>,
    pub bell_audio: Rc<dyn AudioChannel>,
    pub volume: f32,
    pub log: EventLog,
}

pub struct Elevator {
    label: String,
    door: DoorController,
    light: Tubelight,
    floors: FloorDisplays,
    ride_audio: Rc<dyn AudioChannel>,
    bell_audio: Rc<dyn AudioChannel>,
    log: EventLog,
}

impl Elevator {
    pub fn new(parts: ElevatorParts) -> Self {
        parts.ride_audio.set_looping(true);
        parts.ride_audio.set_volume(parts.volume);
        parts.bell_audio.set_volume(parts.volume);
        Self {
            label: parts.label,
            door: parts.door,
            light: parts.light,
            floors: parts.floors,
            ride_audio: parts.ride_audio,
            bell_audio: parts.bell_audio,
            log: parts.log,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn door(&self) -> &DoorController {
        &self.door
    }

    pub fn light(&self) -> &Tubelight {
        &self.light
    }

    pub fn floors(&self) -> &FloorDisplays {
        &self.floors
    }

    /// Full ride of the elevator the player is in: close, pick the next
    /// floor's variant, shake and flicker, chime, step the displays, open.
    pub async fn goto_next_level(
        &self,
        ascending: bool,
        player: &PlayerRig,
        variants: &RefCell<VariantSelector>,
        settings: &GameSettings,
    ) -> Result<u32, ZoneError> {
        self.close_and_wait().await?;
        self.ride_audio.play();

        let next = self.floors.peek(ascending);
        let variant = variants.borrow_mut().set_variant_automatic(
            next,
            settings.abnormal_probability,
            settings.variant_count,
        )?;
        self.log
            .record(format!("ride.variant {} floor={next} variant={variant}", self.label));

        self.start_flicker(settings);
        player.jitter(settings.ride_jitter).await;

        self.ride_audio.stop();
        self.bell_audio.play();
        let floor = self.floors.step(ascending);
        self.log.record(format!("ride.arrive {} floor={floor}", self.label));
        self.door.open()?;
        Ok(floor)
    }

    /// Same ride for the other elevator, minus sound and variant selection.
    pub async fn goto_next_level_paired(
        &self,
        ascending: bool,
        player: &PlayerRig,
        settings: &GameSettings,
    ) -> Result<u32, ZoneError> {
        self.close_and_wait().await?;
        self.start_flicker(settings);
        player.jitter(settings.ride_jitter).await;

        let floor = self.floors.step(ascending);
        self.log.record(format!("ride.arrive {} floor={floor}", self.label));
        self.door.open()?;
        Ok(floor)
    }

    async fn close_and_wait(&self) -> Result<(), ZoneError> {
        self.door.close()?;
        self.door.wait_until_closed().await;
        Ok(())
    }

    fn start_flicker(&self, settings: &GameSettings) {
        let light = self.light.clone();
        let pattern = settings.ride_flicker.clone();
        let label = self.label.clone();
        tokio::task::spawn_local(async move {
            if let Err(err) = light.flicker(&pattern).await {
                log::warn!("[eb_engine] {label} ride flicker skipped: {err}");
            }
        });
    }
}

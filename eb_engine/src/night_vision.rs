use std::cell::Cell;
use std::rc::Rc;

use tokio::time::Instant;

use crate::lighting::AmbientLight;

/// Brightness lost per millisecond once the goggles start dying.
pub const DEATH_SPEED_PER_MS: f32 = 0.0001;

/// Night-vision overlay state. Switching it on raises the ambient light; the
/// dying fade starts at most once until reset.
#[derive(Debug)]
pub struct NightVision {
    ambient: Rc<AmbientLight>,
    active: Cell<bool>,
    dying_since: Cell<Option<Instant>>,
}

impl NightVision {
    pub fn new(ambient: Rc<AmbientLight>) -> Self {
        ambient.turn_off();
        Self {
            ambient,
            active: Cell::new(false),
            dying_since: Cell::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn turn_on(&self) {
        self.ambient.turn_on();
        self.active.set(true);
    }

    pub fn turn_off(&self) {
        self.ambient.turn_off();
        self.active.set(false);
    }

    pub fn toggle(&self) -> bool {
        if self.is_active() {
            self.turn_off();
        } else {
            self.turn_on();
        }
        self.is_active()
    }

    /// Starts the fade. Returns false when it was already running.
    pub fn gradually_dying(&self) -> bool {
        if self.dying_since.get().is_some() {
            return false;
        }
        self.dying_since.set(Some(Instant::now()));
        true
    }

    pub fn is_dying(&self) -> bool {
        self.dying_since.get().is_some()
    }

    pub fn reset_death_time(&self) {
        self.dying_since.set(None);
    }

    /// Overlay brightness in `[0, 1]`.
    pub fn brightness(&self) -> f32 {
        match self.dying_since.get() {
            Some(since) => {
                let elapsed = since.elapsed().as_millis() as f32;
                (1.0 - elapsed * DEATH_SPEED_PER_MS).max(0.0)
            }
            None => 1.0,
        }
    }

    pub fn ambient(&self) -> &AmbientLight {
        &self.ambient
    }
}

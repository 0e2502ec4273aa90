//! Elevator door state machine.
//!
//! "Open" and "closing/opening in progress" are tracked separately: the
//! in-progress flags are raised when a motion starts and cleared by the
//! matching sound's end, and awaiting code watches them through a
//! `tokio::sync::watch` channel.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use log::warn;
use tokio::sync::watch;

use crate::animation::ClipPlayer;
use crate::audio::AudioChannel;
use crate::events::EventLog;
use crate::timing::ScheduledTask;
use crate::zones::{ZoneError, ZoneGroupHandle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorMotion {
    pub opening: bool,
    pub closing: bool,
}

impl DoorMotion {
    pub fn is_busy(&self) -> bool {
        self.opening || self.closing
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorClips {
    pub open: Vec<String>,
    pub close: Vec<String>,
}

impl Default for DoorClips {
    fn default() -> Self {
        Self {
            open: vec!["openLeftDoor".to_string(), "openRightDoor".to_string()],
            close: vec!["closeLeftDoor".to_string(), "closeRightDoor".to_string()],
        }
    }
}

pub struct DoorParts {
    pub label: String,
    pub animator: Rc<dyn ClipPlayer>,
    pub clips: DoorClips,
    pub open_audio: Rc<dyn AudioChannel>,
    pub close_audio: Rc<dyn AudioChannel>,
    /// Zones of the elevator; `pass_through` is the doorway threshold.
    pub zones: ZoneGroupHandle,
    pub pass_through: usize,
    pub pass_through_delay: Duration,
    pub log: EventLog,
}

pub struct DoorController {
    label: String,
    open: Cell<bool>,
    motion: Rc<watch::Sender<DoorMotion>>,
    animator: Rc<dyn ClipPlayer>,
    clips: DoorClips,
    open_audio: Rc<dyn AudioChannel>,
    close_audio: Rc<dyn AudioChannel>,
    zones: ZoneGroupHandle,
    pass_through: usize,
    pass_through_delay: Duration,
    pending_enable: RefCell<Option<ScheduledTask>>,
    log: EventLog,
}

impl DoorController {
    /// Starts closed with the threshold zone disabled.
    pub fn new(parts: DoorParts) -> Result<Self, ZoneError> {
        parts.zones.borrow_mut().disable(parts.pass_through)?;

        let (sender, _) = watch::channel(DoorMotion::default());
        let motion = Rc::new(sender);

        {
            let motion = Rc::clone(&motion);
            let log = parts.log.clone();
            let label = parts.label.clone();
            parts.open_audio.on_ended(Rc::new(move || {
                motion.send_modify(|state| state.opening = false);
                log.record(format!("door.opened {label}"));
            }));
        }
        {
            let motion = Rc::clone(&motion);
            let log = parts.log.clone();
            let label = parts.label.clone();
            parts.close_audio.on_ended(Rc::new(move || {
                motion.send_modify(|state| state.closing = false);
                log.record(format!("door.closed {label}"));
            }));
        }

        Ok(Self {
            label: parts.label,
            open: Cell::new(false),
            motion,
            animator: parts.animator,
            clips: parts.clips,
            open_audio: parts.open_audio,
            close_audio: parts.close_audio,
            zones: parts.zones,
            pass_through: parts.pass_through,
            pass_through_delay: parts.pass_through_delay,
            pending_enable: RefCell::new(None),
            log: parts.log,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    pub fn motion(&self) -> DoorMotion {
        *self.motion.borrow()
    }

    /// Returns false when the door is already open or mid-motion.
    pub fn open(&self) -> Result<bool, ZoneError> {
        let busy = self.motion.borrow().is_busy();
        if self.open.get() || busy {
            return Ok(false);
        }
        self.zones.borrow().zone(self.pass_through)?;

        self.open.set(true);
        self.motion.send_modify(|state| {
            state.opening = true;
            state.closing = false;
        });
        self.schedule_pass_through();

        for clip in &self.clips.close {
            self.animator.stop(clip);
        }
        self.close_audio.stop();
        for clip in &self.clips.open {
            self.animator.reset(clip);
            self.animator.play(clip);
        }
        self.open_audio.play();
        self.log.record(format!("door.open {}", self.label));
        Ok(true)
    }

    /// Returns false when the door is already closed or mid-motion.
    pub fn close(&self) -> Result<bool, ZoneError> {
        let busy = self.motion.borrow().is_busy();
        if !self.open.get() || busy {
            return Ok(false);
        }
        self.zones.borrow_mut().disable(self.pass_through)?;
        if let Some(pending) = self.pending_enable.borrow_mut().take() {
            pending.cancel();
        }

        self.open.set(false);
        self.motion.send_modify(|state| {
            state.closing = true;
            state.opening = false;
        });

        for clip in &self.clips.open {
            self.animator.stop(clip);
        }
        self.open_audio.stop();
        for clip in &self.clips.close {
            self.animator.reset(clip);
            self.animator.play(clip);
        }
        self.close_audio.play();
        self.log.record(format!("door.close {}", self.label));
        Ok(true)
    }

    pub async fn wait_until_opened(&self) {
        let mut receiver = self.motion.subscribe();
        let _ = receiver.wait_for(|state| !state.opening).await;
    }

    pub async fn wait_until_closed(&self) {
        let mut receiver = self.motion.subscribe();
        let _ = receiver.wait_for(|state| !state.closing).await;
    }

    fn schedule_pass_through(&self) {
        let zones = Rc::clone(&self.zones);
        let index = self.pass_through;
        let label = self.label.clone();
        let log = self.log.clone();
        let task = ScheduledTask::after(
            format!("{}.pass_through", self.label),
            self.pass_through_delay,
            move || match zones.borrow_mut().enable(index) {
                Ok(()) => log.record(format!("door.pass_through {label}")),
                Err(err) => warn!("[eb_engine] door {label}: {err}"),
            },
        );
        if let Some(previous) = self.pending_enable.borrow_mut().replace(task) {
            previous.cancel();
        }
    }
}

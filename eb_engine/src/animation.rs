use std::cell::RefCell;
use std::collections::BTreeSet;

use serde::Serialize;

/// Named animation clips on a mixer (door leaves, NPC idle loop).
pub trait ClipPlayer {
    fn play(&self, clip: &str);
    fn stop(&self, clip: &str);
    fn reset(&self, clip: &str);
    fn stop_all(&self);
    fn is_running(&self, clip: &str) -> bool;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationEvent {
    Play { clip: String },
    Stop { clip: String },
    Reset { clip: String },
    StopAll,
}

#[derive(Debug, Default)]
pub struct RecordingClipPlayer {
    running: RefCell<BTreeSet<String>>,
    events: RefCell<Vec<AnimationEvent>>,
}

impl RecordingClipPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnimationEvent> {
        self.events.borrow().clone()
    }

    pub fn running(&self) -> Vec<String> {
        self.running.borrow().iter().cloned().collect()
    }
}

impl ClipPlayer for RecordingClipPlayer {
    fn play(&self, clip: &str) {
        self.running.borrow_mut().insert(clip.to_string());
        self.events.borrow_mut().push(AnimationEvent::Play {
            clip: clip.to_string(),
        });
    }

    fn stop(&self, clip: &str) {
        self.running.borrow_mut().remove(clip);
        self.events.borrow_mut().push(AnimationEvent::Stop {
            clip: clip.to_string(),
        });
    }

    fn reset(&self, clip: &str) {
        self.events.borrow_mut().push(AnimationEvent::Reset {
            clip: clip.to_string(),
        });
    }

    fn stop_all(&self) {
        self.running.borrow_mut().clear();
        self.events.borrow_mut().push(AnimationEvent::StopAll);
    }

    fn is_running(&self, clip: &str) -> bool {
        self.running.borrow().contains(clip)
    }
}

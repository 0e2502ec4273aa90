use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Playback surface of one audio element.
pub trait AudioChannel {
    fn cue(&self) -> &str;
    fn play(&self);
    fn pause(&self);
    /// Seeks back to the start without changing play state.
    fn rewind(&self);
    fn set_volume(&self, volume: f32);
    fn set_looping(&self, looping: bool);
    fn is_playing(&self) -> bool;
    /// Registers a listener fired each time playback reaches the end.
    fn on_ended(&self, listener: Rc<dyn Fn()>);

    fn stop(&self) {
        self.pause();
        self.rewind();
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioEvent {
    Play { cue: String },
    Pause { cue: String },
    Rewind { cue: String },
    Ended { cue: String },
    Volume { cue: String, volume: f32 },
}

#[derive(Clone, Default)]
pub struct AudioRecorder {
    events: Rc<RefCell<Vec<AudioEvent>>>,
}

impl AudioRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.borrow().clone()
    }

    fn push(&self, event: AudioEvent) {
        self.events.borrow_mut().push(event);
    }
}

struct Playback {
    playing: bool,
    looping: bool,
    volume: f32,
    position: Duration,
    started_at: Option<Instant>,
    generation: u64,
    listeners: Vec<Rc<dyn Fn()>>,
}

/// Clock-driven stand-in for a media element: finite cues end after their
/// duration of uninterrupted play, looping cues never end.
///
/// `play` schedules the end on the local task set, so it must be called from
/// inside a `LocalSet`.
#[derive(Clone)]
pub struct SimulatedAudio {
    cue: Rc<str>,
    duration: Duration,
    state: Rc<RefCell<Playback>>,
    recorder: AudioRecorder,
}

impl SimulatedAudio {
    pub fn new(cue: &str, duration: Duration, recorder: AudioRecorder) -> Self {
        Self {
            cue: Rc::from(cue),
            duration,
            state: Rc::new(RefCell::new(Playback {
                playing: false,
                looping: false,
                volume: 1.0,
                position: Duration::ZERO,
                started_at: None,
                generation: 0,
                listeners: Vec::new(),
            })),
            recorder,
        }
    }

    pub fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    pub fn is_looping(&self) -> bool {
        self.state.borrow().looping
    }

    /// Playback offset, counting time spent playing since the last start.
    pub fn position(&self) -> Duration {
        let state = self.state.borrow();
        match state.started_at {
            Some(started) if state.playing => state.position + started.elapsed(),
            _ => state.position,
        }
    }

    fn schedule_end(&self) {
        let (generation, remaining) = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            if !state.playing || state.looping {
                return;
            }
            (state.generation, self.duration.saturating_sub(state.position))
        };
        let audio = self.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(remaining).await;
            audio.finish(generation);
        });
    }

    fn finish(&self, generation: u64) {
        let listeners = {
            let mut state = self.state.borrow_mut();
            if state.generation != generation || !state.playing {
                return;
            }
            state.playing = false;
            state.position = Duration::ZERO;
            state.started_at = None;
            state.listeners.clone()
        };
        self.recorder.push(AudioEvent::Ended {
            cue: self.cue.to_string(),
        });
        for listener in listeners {
            listener();
        }
    }
}

impl AudioChannel for SimulatedAudio {
    fn cue(&self) -> &str {
        &self.cue
    }

    fn play(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.playing {
                return;
            }
            state.playing = true;
            state.started_at = Some(Instant::now());
        }
        self.recorder.push(AudioEvent::Play {
            cue: self.cue.to_string(),
        });
        self.schedule_end();
    }

    fn pause(&self) {
        {
            let mut state = self.state.borrow_mut();
            if !state.playing {
                return;
            }
            if let Some(started) = state.started_at.take() {
                state.position += started.elapsed();
            }
            state.playing = false;
            state.generation += 1;
        }
        self.recorder.push(AudioEvent::Pause {
            cue: self.cue.to_string(),
        });
    }

    fn rewind(&self) {
        let playing = {
            let mut state = self.state.borrow_mut();
            state.position = Duration::ZERO;
            if state.playing {
                state.started_at = Some(Instant::now());
            }
            state.playing
        };
        self.recorder.push(AudioEvent::Rewind {
            cue: self.cue.to_string(),
        });
        if playing {
            self.schedule_end();
        }
    }

    fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.state.borrow_mut().volume = volume;
        self.recorder.push(AudioEvent::Volume {
            cue: self.cue.to_string(),
            volume,
        });
    }

    fn set_looping(&self, looping: bool) {
        self.state.borrow_mut().looping = looping;
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    fn on_ended(&self, listener: Rc<dyn Fn()>) {
        self.state.borrow_mut().listeners.push(listener);
    }
}

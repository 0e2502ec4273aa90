use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventLogEntry {
    pub sequence: u32,
    pub frame: u64,
    pub at_ms: u64,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct EventLogFile {
    pub events: Vec<EventLogEntry>,
}

struct LogState {
    started: Instant,
    frame: u64,
    entries: Vec<EventLogEntry>,
}

/// Shared, append-only log of level events ("door.open elevator1",
/// "phase.reveal", ...), stamped with the host frame and the runtime clock.
#[derive(Clone)]
pub struct EventLog {
    state: Rc<RefCell<LogState>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LogState {
                started: Instant::now(),
                frame: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn set_frame(&self, frame: u64) {
        self.state.borrow_mut().frame = frame;
    }

    pub fn frame(&self) -> u64 {
        self.state.borrow().frame
    }

    pub fn record(&self, label: impl Into<String>) {
        let label = label.into();
        log::info!("{label}");
        let mut state = self.state.borrow_mut();
        let entry = EventLogEntry {
            sequence: state.entries.len() as u32,
            frame: state.frame,
            at_ms: state.started.elapsed().as_millis() as u64,
            label,
        };
        state.entries.push(entry);
    }

    pub fn entries(&self) -> Vec<EventLogEntry> {
        self.state.borrow().entries.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.state
            .borrow()
            .entries
            .iter()
            .map(|entry| entry.label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when some label equals `label` or starts with `label` followed
    /// by a space.
    pub fn contains(&self, label: &str) -> bool {
        self.count(label) > 0
    }

    pub fn count(&self, label: &str) -> usize {
        self.state
            .borrow()
            .entries
            .iter()
            .filter(|entry| label_matches(&entry.label, label))
            .count()
    }

    /// Sequence number of the first matching entry at or after `from`.
    pub fn position_after(&self, label: &str, from: u32) -> Option<u32> {
        self.state
            .borrow()
            .entries
            .iter()
            .find(|entry| entry.sequence >= from && label_matches(&entry.label, label))
            .map(|entry| entry.sequence)
    }

    pub fn to_file(&self) -> EventLogFile {
        EventLogFile {
            events: self.entries(),
        }
    }
}

fn label_matches(label: &str, wanted: &str) -> bool {
    label == wanted
        || label
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with(' '))
}

//! Edge-triggered enter/exit detection over a zone group.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use thiserror::Error;

use crate::zones::ZoneGroupHandle;

pub type TransitionCallback = Rc<dyn Fn()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    OnEnter,
    OnExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("unsupported event handling type {0}")]
    UnsupportedKind(u8),
}

impl EventKind {
    /// Maps the numeric kinds used by level scripts (0 enter, 1 exit).
    pub fn from_tag(tag: u8) -> Result<Self, TransitionError> {
        match tag {
            0 => Ok(Self::OnEnter),
            1 => Ok(Self::OnExit),
            other => Err(TransitionError::UnsupportedKind(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Entered,
    Exited,
}

pub struct TransitionWatcher {
    label: String,
    zones: Option<ZoneGroupHandle>,
    on_enter: Vec<TransitionCallback>,
    on_exit: Vec<TransitionCallback>,
    inside: bool,
    enabled: bool,
}

pub type WatcherHandle = Rc<RefCell<TransitionWatcher>>;

impl TransitionWatcher {
    pub fn new(label: impl Into<String>, zones: ZoneGroupHandle) -> Self {
        Self {
            label: label.into(),
            zones: Some(zones),
            on_enter: Vec::new(),
            on_exit: Vec::new(),
            inside: false,
            enabled: true,
        }
    }

    pub fn into_handle(self) -> WatcherHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn zones(&self) -> Option<&ZoneGroupHandle> {
        self.zones.as_ref()
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// A disabled watcher neither fires nor tracks its inside flag.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn add_callback(&mut self, callback: TransitionCallback, kind: EventKind) {
        self.list_mut(kind).push(callback);
    }

    /// Removes the first registration of this exact callback.
    pub fn remove_callback(&mut self, callback: &TransitionCallback, kind: EventKind) -> bool {
        let list = self.list_mut(kind);
        match list.iter().position(|existing| Rc::ptr_eq(existing, callback)) {
            Some(position) => {
                list.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn callback_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::OnEnter => self.on_enter.len(),
            EventKind::OnExit => self.on_exit.len(),
        }
    }

    /// Updates the inside flag for `point` and returns the edge crossed, if
    /// any, together with the callbacks registered for it. The caller fires
    /// them once no borrow of the watcher is held.
    pub fn poll(&mut self, point: Vec3) -> Option<(Edge, Vec<TransitionCallback>)> {
        if !self.enabled {
            return None;
        }
        let inside_now = self
            .zones
            .as_ref()
            .is_some_and(|zones| zones.borrow().is_in_any_zone(point));

        if inside_now && !self.inside {
            self.inside = true;
            Some((Edge::Entered, self.on_enter.clone()))
        } else if !inside_now && self.inside {
            self.inside = false;
            Some((Edge::Exited, self.on_exit.clone()))
        } else {
            None
        }
    }

    /// Polls and fires in place. Callbacks must not reach back into this
    /// watcher; route those through a [`TransitionBus`].
    pub fn handle_events(&mut self, point: Vec3) -> Option<Edge> {
        let (edge, callbacks) = self.poll(point)?;
        for callback in callbacks {
            callback();
        }
        Some(edge)
    }

    /// Drops callbacks and zones; the watcher stays inert afterwards.
    pub fn dispose(&mut self) {
        self.on_enter.clear();
        self.on_exit.clear();
        if let Some(zones) = self.zones.take() {
            zones.borrow_mut().dispose();
        }
        self.inside = false;
        self.enabled = false;
    }

    fn list_mut(&mut self, kind: EventKind) -> &mut Vec<TransitionCallback> {
        match kind {
            EventKind::OnEnter => &mut self.on_enter,
            EventKind::OnExit => &mut self.on_exit,
        }
    }
}

/// Ordered list of watchers polled once per frame.
#[derive(Clone, Default)]
pub struct TransitionBus {
    watchers: Vec<WatcherHandle>,
}

impl TransitionBus {
    pub fn new(watchers: Vec<WatcherHandle>) -> Self {
        Self { watchers }
    }

    pub fn push(&mut self, watcher: WatcherHandle) {
        self.watchers.push(watcher);
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    pub fn watchers(&self) -> &[WatcherHandle] {
        &self.watchers
    }

    /// Polls every watcher in list order and returns how many edges fired.
    pub fn handle_events(&self, point: Vec3) -> usize {
        let mut fired = 0;
        for watcher in &self.watchers {
            let polled = watcher.borrow_mut().poll(point);
            if let Some((_, callbacks)) = polled {
                fired += 1;
                for callback in callbacks {
                    callback();
                }
            }
        }
        fired
    }

    pub fn enable(&self) {
        for watcher in &self.watchers {
            watcher.borrow_mut().enable();
        }
    }

    pub fn disable(&self) {
        for watcher in &self.watchers {
            watcher.borrow_mut().disable();
        }
    }

    pub fn dispose(&self) {
        for watcher in &self.watchers {
            watcher.borrow_mut().dispose();
        }
    }
}

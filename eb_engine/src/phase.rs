//! Level phase state machine and the sequences that move between phases:
//! leaving the elevator, the hallway reveal with its countdown, and the
//! next-level transition.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;
use log::{debug, error, warn};
use serde::Serialize;
use thiserror::Error;

use crate::audio::AudioChannel;
use crate::elevator::Elevator;
use crate::events::EventLog;
use crate::lighting::TubelightSystem;
use crate::night_vision::NightVision;
use crate::player::PlayerRig;
use crate::settings::GameSettings;
use crate::timing::{sleep_ms, ScheduledTask, TaskGroup};
use crate::variant::VariantSelector;
use crate::zones::ZoneError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelPhase {
    ElevatorLoading,
    HallwayBeforeReveal,
    HallwayAfterReveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{request} refused in {phase:?} (transition in flight: {in_flight})")]
pub struct PhaseRefusal {
    pub request: &'static str,
    pub phase: LevelPhase,
    pub in_flight: bool,
}

/// Session flags. Every change goes through a method that checks its
/// precondition, so the phase can only move along the allowed edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Session {
    phase: LevelPhase,
    countdown_active: bool,
    forced_failure: bool,
    transition_in_flight: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: LevelPhase::ElevatorLoading,
            countdown_active: false,
            forced_failure: false,
            transition_in_flight: false,
        }
    }
}

impl Session {
    pub fn phase(&self) -> LevelPhase {
        self.phase
    }

    pub fn countdown_active(&self) -> bool {
        self.countdown_active
    }

    pub fn forced_failure(&self) -> bool {
        self.forced_failure
    }

    pub fn transition_in_flight(&self) -> bool {
        self.transition_in_flight
    }

    fn refuse(&self, request: &'static str) -> PhaseRefusal {
        PhaseRefusal {
            request,
            phase: self.phase,
            in_flight: self.transition_in_flight,
        }
    }

    /// Loading -> before reveal; clears the countdown and any pending forced
    /// failure.
    pub fn begin_level(&mut self) -> Result<(), PhaseRefusal> {
        if self.phase != LevelPhase::ElevatorLoading || self.transition_in_flight {
            return Err(self.refuse("start_level"));
        }
        self.phase = LevelPhase::HallwayBeforeReveal;
        self.countdown_active = false;
        self.forced_failure = false;
        Ok(())
    }

    pub fn begin_reveal(&mut self) -> Result<(), PhaseRefusal> {
        if self.phase != LevelPhase::HallwayBeforeReveal || self.transition_in_flight {
            return Err(self.refuse("reveal"));
        }
        self.phase = LevelPhase::HallwayAfterReveal;
        Ok(())
    }

    /// Arms the countdown once the reveal finished, unless a transition got
    /// there first.
    pub fn arm_countdown(&mut self) -> bool {
        if self.phase != LevelPhase::HallwayAfterReveal || self.transition_in_flight {
            return false;
        }
        self.countdown_active = true;
        true
    }

    pub fn force_failure(&mut self) -> bool {
        if !self.countdown_active {
            return false;
        }
        self.forced_failure = true;
        true
    }

    /// Any hallway phase may start a transition; only one runs at a time.
    pub fn begin_transition(&mut self) -> Result<(), PhaseRefusal> {
        if !self.can_begin_transition() {
            return Err(self.refuse("transition"));
        }
        self.transition_in_flight = true;
        self.countdown_active = false;
        Ok(())
    }

    pub fn can_begin_transition(&self) -> bool {
        self.phase != LevelPhase::ElevatorLoading && !self.transition_in_flight
    }

    pub fn enter_loading(&mut self) {
        self.phase = LevelPhase::ElevatorLoading;
    }

    pub fn finish_transition(&mut self) {
        self.transition_in_flight = false;
    }

    pub fn night_vision_allowed(&self) -> bool {
        self.phase == LevelPhase::HallwayAfterReveal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    pub returning_to_reference: bool,
    pub forced_failure: bool,
    pub failed: bool,
    pub floor: u32,
    pub variant: i32,
}

/// Everything the phase sequences drive.
pub struct LevelRig {
    /// The elevator the player starts in; its floor is the score.
    pub elevator: Rc<Elevator>,
    pub paired: Rc<Elevator>,
    pub player: PlayerRig,
    pub variants: Rc<RefCell<VariantSelector>>,
    pub hallway_lights: TubelightSystem,
    pub night_vision: Rc<NightVision>,
    pub hum: Rc<dyn AudioChannel>,
    pub breath: Rc<dyn AudioChannel>,
    pub spawn: Vec3,
    pub far_destination: Vec3,
    pub look_at: Vec3,
}

struct ControllerState {
    rig: LevelRig,
    settings: Rc<GameSettings>,
    session: RefCell<Session>,
    countdown: RefCell<TaskGroup>,
    history: RefCell<Vec<TransitionReport>>,
    fault: RefCell<Option<ZoneError>>,
    log: EventLog,
}

/// Cheap handle onto the level's phase machine; clones share state.
#[derive(Clone)]
pub struct LevelPhaseController {
    inner: Rc<ControllerState>,
}

impl LevelPhaseController {
    pub fn new(rig: LevelRig, settings: Rc<GameSettings>, log: EventLog) -> Self {
        Self {
            inner: Rc::new(ControllerState {
                rig,
                settings,
                session: RefCell::new(Session::default()),
                countdown: RefCell::new(TaskGroup::default()),
                history: RefCell::new(Vec::new()),
                fault: RefCell::new(None),
                log,
            }),
        }
    }

    pub fn rig(&self) -> &LevelRig {
        &self.inner.rig
    }

    pub fn session(&self) -> Session {
        *self.inner.session.borrow()
    }

    pub fn phase(&self) -> LevelPhase {
        self.inner.session.borrow().phase()
    }

    pub fn history(&self) -> Vec<TransitionReport> {
        self.inner.history.borrow().clone()
    }

    pub fn transitions_completed(&self) -> usize {
        self.inner.history.borrow().len()
    }

    pub fn countdown_pending(&self) -> Vec<String> {
        self.inner.countdown.borrow().pending_labels()
    }

    /// First error raised by a background sequence, if any.
    pub fn take_fault(&self) -> Option<ZoneError> {
        self.inner.fault.borrow_mut().take()
    }

    /// Player stepped out of the reference elevator.
    pub fn start_level(&self) -> bool {
        let result = self.inner.session.borrow_mut().begin_level();
        match result {
            Ok(()) => {
                self.inner.rig.hum.play();
                self.inner.rig.breath.rewind();
                self.inner.log.record("phase.start_level");
                true
            }
            Err(refusal) => {
                debug!("[eb_engine] {refusal}");
                false
            }
        }
    }

    /// Player crossed the reveal line: lights flicker out and the countdown
    /// starts.
    pub async fn trigger_reveal(&self) -> bool {
        let result = self.inner.session.borrow_mut().begin_reveal();
        if let Err(refusal) = result {
            debug!("[eb_engine] {refusal}");
            return false;
        }
        let rig = &self.inner.rig;
        let settings = &self.inner.settings;
        self.inner.log.record("phase.reveal");
        rig.hum.pause();

        if let Err(err) = rig.hallway_lights.flicker(&settings.reveal_flicker).await {
            warn!("[eb_engine] reveal flicker skipped: {err}");
        }
        rig.hallway_lights
            .turn_off_gradually(settings.reveal_fade.ms, settings.reveal_fade.steps)
            .await;

        let armed = self.inner.session.borrow_mut().arm_countdown();
        if armed {
            self.schedule_countdown();
            self.inner.log.record("countdown.armed");
        } else {
            debug!("[eb_engine] countdown not armed; phase moved on during the reveal");
        }
        true
    }

    /// Night vision is only available in the dark hallway.
    pub fn toggle_night_vision(&self) -> Option<bool> {
        if !self.inner.session.borrow().night_vision_allowed() {
            return None;
        }
        let active = self.inner.rig.night_vision.toggle();
        self.inner.log.record(format!(
            "night_vision.{}",
            if active { "on" } else { "off" }
        ));
        Some(active)
    }

    /// Runs a transition in the background, keeping the first error for
    /// [`take_fault`](Self::take_fault).
    pub fn launch_transition(&self, returning: bool) {
        if !self.inner.session.borrow().can_begin_transition() {
            debug!("[eb_engine] transition request ignored in {:?}", self.phase());
            return;
        }
        let controller = self.clone();
        tokio::task::spawn_local(async move {
            if let Err(err) = controller.next_level_transition(returning).await {
                error!("[eb_engine] next-level transition aborted: {err}");
                controller.inner.fault.borrow_mut().get_or_insert(err);
            }
        });
    }

    /// `returning` is true when the player walked back into the reference
    /// elevator. Returns `None` when the current phase refuses a transition.
    pub async fn next_level_transition(
        &self,
        returning: bool,
    ) -> Result<Option<TransitionReport>, ZoneError> {
        let forced = {
            let mut session = self.inner.session.borrow_mut();
            if let Err(refusal) = session.begin_transition() {
                debug!("[eb_engine] {refusal}");
                return Ok(None);
            }
            session.forced_failure()
        };
        let cancelled = self.inner.countdown.borrow_mut().cancel_all();
        if cancelled > 0 {
            debug!("[eb_engine] cancelled {cancelled} countdown actions");
        }

        let result = self.run_transition(returning, forced).await;
        self.inner.session.borrow_mut().finish_transition();
        let report = result?;
        self.inner.history.borrow_mut().push(report);
        Ok(Some(report))
    }

    async fn run_transition(&self, returning: bool, forced: bool) -> Result<TransitionReport, ZoneError> {
        let rig = &self.inner.rig;
        let settings = &self.inner.settings;

        rig.player.set_can_move(false);
        rig.hum.pause();
        rig.breath.stop();

        let baseline = rig.variants.borrow().is_baseline();
        // Baseline hallway: turning back is right. Altered hallway: pressing on is right.
        let failed = forced || baseline != returning;
        self.inner.log.record(format!(
            "phase.transition returning={returning} baseline={baseline} failed={failed}"
        ));

        if rig.night_vision.is_active() {
            rig.night_vision.turn_off();
        }
        if rig.night_vision.is_dying() {
            rig.night_vision.reset_death_time();
        }

        let destination = if returning {
            rig.spawn
        } else {
            rig.far_destination
        };
        {
            let player = rig.player.clone();
            let look_at = rig.look_at;
            let ramp = settings.return_move;
            tokio::task::spawn_local(async move {
                player
                    .smooth_move(destination, look_at, ramp.ms, ramp.steps)
                    .await;
            });
        }

        tokio::join!(
            rig.elevator.door().wait_until_opened(),
            rig.paired.door().wait_until_opened()
        );
        self.inner.session.borrow_mut().enter_loading();
        self.inner.log.record("phase.loading");

        let ascending = failed;
        let (reference, paired) = tokio::join!(
            rig.elevator
                .goto_next_level(ascending, &rig.player, &rig.variants, settings),
            rig.paired
                .goto_next_level_paired(ascending, &rig.player, settings)
        );
        let floor = reference?;
        paired?;

        rig.player.teleport(rig.spawn);
        if !returning {
            rig.player.turn_around();
        }
        sleep_ms(settings.settle_delay_ms).await;
        rig.hallway_lights
            .turn_on_gradually(
                settings.hallway_ramp.ms,
                settings.hallway_ramp.steps,
                settings.lights.hallway,
            )
            .await;
        rig.player.set_can_move(true);

        let report = TransitionReport {
            returning_to_reference: returning,
            forced_failure: forced,
            failed,
            floor,
            variant: rig.variants.borrow().current(),
        };
        self.inner.log.record(format!(
            "phase.transition_done floor={floor} failed={failed} variant={}",
            report.variant
        ));
        Ok(report)
    }

    fn schedule_countdown(&self) {
        let countdown = self.inner.settings.countdown;
        let tasks = [
            (
                "countdown.dying",
                countdown.dying_after_s,
                Self::on_dying as fn(&Self),
            ),
            ("countdown.breathing", countdown.breathing_after_s, Self::on_breathing),
            ("countdown.failure", countdown.failure_after_s, Self::on_failure),
        ];
        let mut group = self.inner.countdown.borrow_mut();
        for (label, after_s, action) in tasks {
            let controller = self.clone();
            group.push(ScheduledTask::after(
                label,
                Duration::from_secs_f64(after_s.max(0.0)),
                move || action(&controller),
            ));
        }
    }

    fn countdown_live(&self) -> bool {
        self.inner.session.borrow().countdown_active()
    }

    fn on_dying(&self) {
        if !self.countdown_live() {
            return;
        }
        if self.inner.rig.night_vision.gradually_dying() {
            self.inner.log.record("countdown.dying");
        }
    }

    fn on_breathing(&self) {
        if !self.countdown_live() {
            return;
        }
        self.inner.rig.breath.play();
        self.inner.log.record("countdown.breathing");
    }

    fn on_failure(&self) {
        if !self.inner.session.borrow_mut().force_failure() {
            return;
        }
        let rig = &self.inner.rig;
        rig.breath.stop();
        rig.player.teleport(rig.spawn);
        self.inner.log.record("countdown.failure");
        self.launch_transition(true);
    }
}

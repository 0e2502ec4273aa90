//! Headless frame loop with a scripted player.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use glam::{Vec2, Vec3};
use log::info;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};

use crate::layout::PilotRoutes;
use crate::level::Level;
use crate::phase::TransitionReport;
use crate::player::InputState;

/// How close the pilot has to get to a waypoint before taking the next one.
const ARRIVAL_RADIUS: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Knows the answer: turns back on the baseline hallway, presses on
    /// otherwise.
    Oracle,
    /// Always walks to the far elevator.
    Forward,
    /// Always walks past the reveal and back.
    Back,
    /// Walks past the reveal and waits for the countdown.
    Idle,
}

/// Steers the player along the route chosen for the current hallway.
struct Pilot {
    strategy: Strategy,
    routes: PilotRoutes,
    route: VecDeque<Vec2>,
    planned_for: Option<usize>,
}

impl Pilot {
    fn new(strategy: Strategy, routes: PilotRoutes) -> Self {
        Self {
            strategy,
            routes,
            route: VecDeque::new(),
            planned_for: None,
        }
    }

    fn input(&mut self, level: &Level) -> InputState {
        let player = level.player();
        if !player.can_move() {
            return InputState::idle();
        }
        let completed = level.controller().transitions_completed();
        if self.planned_for != Some(completed) {
            self.plan(level);
            self.planned_for = Some(completed);
        }

        let position = player.position();
        while let Some(waypoint) = self.route.front() {
            let offset = Vec3::new(waypoint.x, position.y, waypoint.y) - position;
            if offset.length() <= ARRIVAL_RADIUS {
                self.route.pop_front();
                continue;
            }
            return InputState {
                intent: player.intent_toward(offset),
                pointer_locked: true,
            };
        }
        InputState::idle()
    }

    fn plan(&mut self, level: &Level) {
        let route = match self.strategy {
            Strategy::Oracle => {
                if level.variants().borrow().is_baseline() {
                    &self.routes.back
                } else {
                    &self.routes.forward
                }
            }
            Strategy::Forward => &self.routes.forward,
            Strategy::Back => &self.routes.back,
            Strategy::Idle => &self.routes.idle,
        };
        self.route = route.iter().copied().collect();
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub strategy: Strategy,
    pub fps: u32,
    pub max_duration: Duration,
    pub routes: PilotRoutes,
}

#[derive(Debug, Serialize)]
pub struct SimulationSummary {
    pub strategy: Strategy,
    pub frames: u64,
    pub elapsed_ms: u64,
    pub final_floor: u32,
    pub game_completed: bool,
    pub blocked_steps: u64,
    pub transitions: Vec<TransitionReport>,
}

/// Powers the level on and runs frames until the reference elevator reaches
/// floor 1 or `max_duration` passes. A fault raised by a level sequence ends
/// the run with an error.
pub async fn run(level: &Level, config: SimulationConfig) -> Result<SimulationSummary> {
    let fps = config.fps.max(1);
    let frame_length = Duration::from_secs_f64(1.0 / f64::from(fps));
    let dt = frame_length.as_secs_f32();
    let mut pilot = Pilot::new(config.strategy, config.routes);

    let started = Instant::now();
    level.power_on().await.context("powering on the level")?;

    let mut ticker = tokio::time::interval(frame_length);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames = 0_u64;
    let mut game_completed = false;

    loop {
        ticker.tick().await;
        frames += 1;
        level.log().set_frame(frames);

        if let Some(fault) = level.controller().take_fault() {
            return Err(fault).context("level sequence failed");
        }
        if reached_ground_floor(level) {
            level.elevator().door().wait_until_opened().await;
            level.player().set_can_move(false);
            level.log().record("game.end");
            game_completed = true;
            break;
        }
        if started.elapsed() >= config.max_duration {
            info!(
                "[eb_engine] stopping after {:.1}s on floor {}",
                started.elapsed().as_secs_f64(),
                level.elevator().floors().inner()
            );
            break;
        }

        let input = pilot.input(level);
        level.tick(dt, &input);
    }

    Ok(SimulationSummary {
        strategy: config.strategy,
        frames,
        elapsed_ms: started.elapsed().as_millis() as u64,
        final_floor: level.elevator().floors().inner(),
        game_completed,
        blocked_steps: level.player().blocked_steps(),
        transitions: level.controller().history(),
    })
}

fn reached_ground_floor(level: &Level) -> bool {
    level.elevator().floors().inner() == 1 && !level.controller().session().transition_in_flight()
}

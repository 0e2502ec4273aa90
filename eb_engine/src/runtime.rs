use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use eb_engine::audio::AudioEvent;
use eb_engine::level::{parse_mesh_list, BUNDLED_HALLWAY_MESHES, BUNDLED_VISIBILITY_CONFIG};
use eb_engine::simulation;
use eb_engine::visibility::load_config;
use eb_engine::{GameSettings, Level, LevelLayout, LevelOptions, SimulationConfig};
use eb_formats::VisibilityConfig;
use serde::Serialize;
use tokio::task::LocalSet;

use crate::cli::{Command, SimulateArgs};

#[derive(Serialize)]
struct AudioLogFile {
    events: Vec<AudioEvent>,
}

pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Simulate(args) => simulate(args),
        Command::DumpDefaults(dir) => dump_defaults(&dir),
    }
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let SimulateArgs {
        settings,
        layout,
        visibility_config,
        hallway_meshes,
        seed,
        strategy,
        max_seconds,
        fps,
        realtime,
        show_zones,
        event_log_json,
        audio_log_json,
        summary_json,
    } = args;

    let settings = GameSettings::load(settings.as_deref()).context("loading settings")?;
    let layout = LevelLayout::load(layout.as_deref()).context("loading level layout")?;
    let hallway_meshes = match hallway_meshes.as_ref() {
        Some(path) => parse_mesh_list(
            &fs::read_to_string(path)
                .with_context(|| format!("reading hallway mesh list {}", path.display()))?,
        ),
        None => parse_mesh_list(BUNDLED_HALLWAY_MESHES),
    };
    let visibility = match visibility_config.as_ref() {
        Some(path) => load_config(path),
        None => Some(
            VisibilityConfig::parse(BUNDLED_VISIBILITY_CONFIG)
                .context("parsing bundled visibility config")?,
        ),
    };

    if let Some(path) = event_log_json.as_ref() {
        eprintln!("[eb_engine] info: capturing level events to {}", path.display());
    }
    if let Some(path) = audio_log_json.as_ref() {
        eprintln!("[eb_engine] info: capturing audio events to {}", path.display());
    }
    if realtime && max_seconds > 120.0 {
        eprintln!("[eb_engine] warning: --realtime run may take up to {max_seconds:.0}s of wall time");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(!realtime)
        .build()
        .context("building tokio runtime")?;
    let local = LocalSet::new();

    local.block_on(&runtime, async {
        let routes = layout.routes.clone();
        let level = Level::build(
            settings,
            &layout,
            LevelOptions {
                visibility,
                hallway_meshes,
                seed,
                show_zones,
            },
        )
        .context("building level")?;

        let summary = simulation::run(
            &level,
            SimulationConfig {
                strategy,
                fps,
                max_duration: Duration::from_secs_f64(max_seconds),
                routes,
            },
        )
        .await?;

        println!(
            "strategy={:?} floor={} completed={} transitions={} frames={} elapsed={:.1}s",
            summary.strategy,
            summary.final_floor,
            summary.game_completed,
            summary.transitions.len(),
            summary.frames,
            summary.elapsed_ms as f64 / 1000.0
        );

        if let Some(path) = event_log_json.as_ref() {
            write_json(path, &level.log().to_file(), "event log")?;
            println!("Saved event log to {}", path.display());
        }
        if let Some(path) = audio_log_json.as_ref() {
            let file = AudioLogFile {
                events: level.audio().events(),
            };
            write_json(path, &file, "audio log")?;
            println!("Saved audio log to {}", path.display());
        }
        if let Some(path) = summary_json.as_ref() {
            write_json(path, &summary, "run summary")?;
            println!("Saved run summary to {}", path.display());
        }
        Ok::<(), anyhow::Error>(())
    })
}

fn dump_defaults(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write_json(&dir.join("settings.json"), &GameSettings::default(), "default settings")?;
    write_json(&dir.join("layout.json"), &LevelLayout::default(), "default layout")?;
    println!("Saved default settings and layout to {}", dir.display());
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value).with_context(|| format!("serializing {what}"))?;
    fs::write(path, json).with_context(|| format!("writing {what} to {}", path.display()))
}

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::tempdir;

#[derive(Debug, Deserialize)]
struct EventLog {
    events: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    sequence: u32,
    label: String,
}

#[derive(Debug, Deserialize)]
struct Summary {
    final_floor: u32,
    game_completed: bool,
    transitions: Vec<Transition>,
}

#[derive(Debug, Deserialize)]
struct Transition {
    forced_failure: bool,
    failed: bool,
    floor: u32,
}

fn run_engine(args: &[&str], dir: &Path) -> Result<(EventLog, Summary)> {
    let events_path = dir.join("events.json");
    let summary_path = dir.join("summary.json");
    let audio_path = dir.join("audio.json");

    let status = Command::new(env!("CARGO_BIN_EXE_eb_engine"))
        .args(args)
        .arg("--event-log-json")
        .arg(&events_path)
        .arg("--summary-json")
        .arg(&summary_path)
        .arg("--audio-log-json")
        .arg(&audio_path)
        .status()
        .context("executing eb_engine")?;
    assert!(status.success(), "eb_engine exited with {status:?}");
    assert!(audio_path.is_file(), "eb_engine did not produce an audio log");

    let events = serde_json::from_str(&fs::read_to_string(&events_path).context("reading event log")?)
        .context("parsing event log")?;
    let summary = serde_json::from_str(&fs::read_to_string(&summary_path).context("reading summary")?)
        .context("parsing summary")?;
    Ok((events, summary))
}

fn arrival_floors(log: &EventLog) -> Vec<u32> {
    log.events
        .iter()
        .filter_map(|entry| entry.label.strip_prefix("ride.arrive elevator1 floor="))
        .filter_map(|floor| floor.parse().ok())
        .collect()
}

#[test]
fn oracle_walkthrough_reaches_the_ground_floor() -> Result<()> {
    let dir = tempdir().context("creating temporary directory")?;
    let (log, summary) = run_engine(&["--strategy", "oracle", "--seed", "7"], dir.path())?;

    assert!(summary.game_completed);
    assert_eq!(summary.final_floor, 1);
    assert!(summary.transitions.iter().all(|transition| !transition.failed));
    assert_eq!(arrival_floors(&log), vec![4, 3, 2, 1]);

    let last = log.events.last().context("event log is empty")?;
    assert_eq!(last.label, "game.end");
    for (index, entry) in log.events.iter().enumerate() {
        assert_eq!(entry.sequence as usize, index);
    }
    Ok(())
}

#[test]
fn idle_player_is_sent_back_up_by_the_countdown() -> Result<()> {
    let dir = tempdir().context("creating temporary directory")?;
    let (log, summary) = run_engine(
        &["--strategy", "idle", "--seed", "7", "--max-seconds", "420"],
        dir.path(),
    )?;

    assert!(!summary.game_completed);
    assert_eq!(summary.final_floor, 5);
    let forced = summary
        .transitions
        .first()
        .context("countdown did not force a transition")?;
    assert!(forced.forced_failure);
    assert!(forced.failed);
    assert_eq!(forced.floor, 5);

    let labels: Vec<&str> = log.events.iter().map(|entry| entry.label.as_str()).collect();
    let reveal = labels
        .iter()
        .position(|label| *label == "phase.reveal")
        .context("no reveal")?;
    let failure = labels
        .iter()
        .position(|label| *label == "countdown.failure")
        .context("no forced failure")?;
    assert!(reveal < failure);
    assert!(labels.contains(&"countdown.dying"));
    assert!(labels.contains(&"countdown.breathing"));
    Ok(())
}

#[test]
fn dump_defaults_round_trips_through_the_loader() -> Result<()> {
    let dir = tempdir().context("creating temporary directory")?;
    let status = Command::new(env!("CARGO_BIN_EXE_eb_engine"))
        .arg("--dump-defaults")
        .arg(dir.path())
        .status()
        .context("executing eb_engine")?;
    assert!(status.success());

    let settings = dir.path().join("settings.json");
    let layout = dir.path().join("layout.json");
    let status = Command::new(env!("CARGO_BIN_EXE_eb_engine"))
        .args(["--strategy", "back", "--max-seconds", "40"])
        .arg("--settings")
        .arg(&settings)
        .arg("--layout")
        .arg(&layout)
        .status()
        .context("executing eb_engine with dumped defaults")?;
    assert!(status.success());
    Ok(())
}

#[test]
fn zero_fps_is_rejected() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_eb_engine"))
        .args(["--fps", "0"])
        .output()
        .context("executing eb_engine")?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--fps"));
    Ok(())
}

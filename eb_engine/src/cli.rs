use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use eb_engine::Strategy;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host that plays the elevator level with a scripted player",
    version
)]
pub struct Args {
    /// Optional JSON settings file; missing fields keep their defaults
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Optional JSON level layout (bounds, zones, spawn points, pilot routes)
    #[arg(long)]
    pub layout: Option<PathBuf>,

    /// Hallway visibility config (default: the bundled hallwayVisibility.json)
    #[arg(long)]
    pub visibility_config: Option<PathBuf>,

    /// Hallway mesh name list, one per line (default: the bundled list)
    #[arg(long)]
    pub hallway_meshes: Option<PathBuf>,

    /// Seed for the hallway variant draw
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// How the scripted player decides between the two elevators
    #[arg(long, value_enum, default_value = "oracle")]
    pub strategy: Strategy,

    /// Stop after this many seconds of game time
    #[arg(long, default_value_t = 900.0)]
    pub max_seconds: f64,

    /// Frames per second of the host loop
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Run against the wall clock instead of virtual time
    #[arg(long)]
    pub realtime: bool,

    /// Show every zone's debug box in the scene
    #[arg(long)]
    pub show_zones: bool,

    /// Path to write the level event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the audio event log as JSON
    #[arg(long)]
    pub audio_log_json: Option<PathBuf>,

    /// Path to write the run summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Write the default settings.json and layout.json into this directory and exit
    #[arg(long, value_name = "DIR")]
    pub dump_defaults: Option<PathBuf>,
}

#[derive(Debug)]
pub enum Command {
    Simulate(SimulateArgs),
    DumpDefaults(PathBuf),
}

#[derive(Debug)]
pub struct SimulateArgs {
    pub settings: Option<PathBuf>,
    pub layout: Option<PathBuf>,
    pub visibility_config: Option<PathBuf>,
    pub hallway_meshes: Option<PathBuf>,
    pub seed: u64,
    pub strategy: Strategy,
    pub max_seconds: f64,
    pub fps: u32,
    pub realtime: bool,
    pub show_zones: bool,
    pub event_log_json: Option<PathBuf>,
    pub audio_log_json: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<Command> {
        if let Some(dir) = self.dump_defaults {
            if self.event_log_json.is_some()
                || self.audio_log_json.is_some()
                || self.summary_json.is_some()
            {
                bail!("--dump-defaults cannot be combined with simulation outputs");
            }
            return Ok(Command::DumpDefaults(dir));
        }
        if !(self.max_seconds.is_finite() && self.max_seconds > 0.0) {
            bail!("--max-seconds must be a positive number");
        }
        if self.fps == 0 || self.fps > 240 {
            bail!("--fps must be between 1 and 240");
        }

        Ok(Command::Simulate(SimulateArgs {
            settings: self.settings,
            layout: self.layout,
            visibility_config: self.visibility_config,
            hallway_meshes: self.hallway_meshes,
            seed: self.seed,
            strategy: self.strategy,
            max_seconds: self.max_seconds,
            fps: self.fps,
            realtime: self.realtime,
            show_zones: self.show_zones,
            event_log_json: self.event_log_json,
            audio_log_json: self.audio_log_json,
            summary_json: self.summary_json,
        }))
    }
}

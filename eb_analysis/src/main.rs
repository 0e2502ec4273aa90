use std::{fs::File, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use eb_analysis::{estimate, EstimatorParams};

#[derive(Parser, Debug)]
#[command(author, version, about = "Estimates how many hallways a player walks before clearing the building", long_about = None)]
struct Args {
    /// Hallways after which a player gives up
    #[arg(long, default_value_t = 1_000)]
    rage_quit_count: u32,

    /// Correct answers in a row needed to clear the building
    #[arg(long, default_value_t = 5)]
    level_count: u32,

    /// Chance of answering an unseen hallway correctly
    #[arg(long, default_value_t = 0.75)]
    success_probability: f64,

    /// Chance of answering a remembered hallway correctly
    #[arg(long, default_value_t = 0.9)]
    success_probability_with_memory: f64,

    /// Number of distinct hallways in the game
    #[arg(long, default_value_t = 15)]
    max_hall_number: u32,

    /// Simulated playthroughs per estimate
    #[arg(long, default_value_t = 10_000)]
    iterations: u32,

    /// Seed for the random draws
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Optional path to write the estimate as JSON
    #[arg(long)]
    json_report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    for (flag, value) in [
        ("--success-probability", args.success_probability),
        ("--success-probability-with-memory", args.success_probability_with_memory),
    ] {
        if !(0.0..=1.0).contains(&value) {
            bail!("{flag} must be within 0..=1");
        }
    }

    let report = estimate(
        EstimatorParams {
            rage_quit_count: args.rage_quit_count,
            level_count: args.level_count,
            success_probability: args.success_probability,
            success_probability_with_memory: args.success_probability_with_memory,
            max_hall_number: args.max_hall_number,
            iterations: args.iterations,
        },
        args.seed,
    );

    if let Some(path) = args.json_report.as_deref() {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        println!("[eb_analysis] wrote JSON report to {}", path.display());
    }

    println!("Floor reached in one attempt: {:.3}", report.single_attempt_depth);
    println!("Hallways until cleared: {:.2}", report.mean_hallways);
    println!(
        "Hallways until cleared (perfect memory): {:.2}",
        report.mean_hallways_perfect_memory
    );
    println!(
        "Hallways until cleared (good memory): {:.2}",
        report.mean_hallways_with_memory
    );
    Ok(())
}

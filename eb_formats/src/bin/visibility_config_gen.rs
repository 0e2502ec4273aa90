use std::env;
use std::fs;

use anyhow::{Context, Result};
use eb_formats::generate_config;

fn main() -> Result<()> {
    let input = env::args()
        .nth(1)
        .context("usage: visibility_config_gen <mesh name list> [output.json]")?;
    let output = env::args().nth(2);

    let raw = fs::read_to_string(&input).with_context(|| format!("reading {input}"))?;
    let names: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let config = generate_config(names.iter().copied());
    let json = config.to_json_pretty()?;

    match output {
        Some(path) => {
            fs::write(&path, &json).with_context(|| format!("writing {path}"))?;
            println!(
                "{} default-visible meshes, {} variants -> {path}",
                config.default.visible.len(),
                config.variants.len()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

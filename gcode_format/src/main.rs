use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use common::{
    misc::human_duration,
    motion::{Motion, MotionEvent},
};
use gcode_format::{reader::parse_gcode, GcodeStats};

#[derive(Parser)]
struct Args {
    /// Path to the .gcode file
    input_file: PathBuf,

    /// Also print every parsed event
    #[clap(short, long)]
    events: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let raw = fs::read_to_string(&args.input_file)
        .with_context(|| format!("reading `{}`", args.input_file.display()))?;
    let events = parse_gcode(&raw)?;
    let stats = GcodeStats::of(&events);

    if args.events {
        for event in events.iter() {
            println!("{event:?}");
        }
    }

    println!("Lines: {}", raw.lines().count());
    println!("Layers: {}", stats.layers);
    println!("Total E: {:.3} mm", total_e(&events));
    println!("Retracts: {}", stats.retracts);
    println!(
        "Print time: {}",
        human_duration(Duration::from_secs_f64(stats.print_time))
    );

    Ok(())
}

/// Net filament pushed through the nozzle, retractions included.
fn total_e(events: &[MotionEvent]) -> f64 {
    events
        .iter()
        .map(|x| match x.motion {
            Motion::Extrude { e, .. } | Motion::Unretract { length: e, .. } => e,
            Motion::Retract { length, .. } => -length,
            _ => 0.0,
        })
        .sum()
}

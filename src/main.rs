//! Dining run: N actors in a ring, each needing the resource on either side.

use std::{ops::Range, time::Duration};

use anyhow::{bail, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use dining::{Harness, HarnessConfig, Timing};

#[derive(Parser)]
#[command(name = "dining")]
#[command(version)]
#[command(about = "Deadlock-free resource sharing between neighboring actors")]
struct Cli {
    /// Number of actors in the ring
    #[arg(long, default_value = "5")]
    actors: usize,

    /// Times each actor takes and returns its resources
    #[arg(long, default_value = "5")]
    cycles: usize,

    /// Idle interval bounds in milliseconds (min,max)
    #[arg(long, default_value = "100,500", value_delimiter = ',')]
    idle_ms: Vec<u64>,

    /// Hold interval bounds in milliseconds (min,max)
    #[arg(long, default_value = "100,500", value_delimiter = ',')]
    hold_ms: Vec<u64>,

    /// Shut everything down if the run takes longer than this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose logging (every state transition)
    #[arg(short, long)]
    verbose: bool,
}

fn millis(bounds: &[u64], flag: &str) -> Result<Range<u64>> {
    let &[min, max] = bounds else {
        bail!("{flag} takes exactly two values, got {bounds:?}");
    };
    Ok(min..max)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_thread_names(true)
        .compact()
        .init();

    let config = HarnessConfig {
        actors: cli.actors,
        cycles: cli.cycles,
        timing: Timing {
            idle: millis(&cli.idle_ms, "--idle-ms")?,
            hold: millis(&cli.hold_ms, "--hold-ms")?,
        },
        deadline: cli.deadline_secs.map(Duration::from_secs),
        seed: cli.seed,
        record_history: false,
    };

    println!("=== Dining run ===");
    println!("Actors: {}", config.actors);
    println!("Cycles per actor: {}", config.cycles);

    let report = Harness::new(config)?.run()?;

    println!("\n=== Result ===");
    println!("Grants: {}", report.grants);
    println!("Releases: {}", report.releases);
    println!("Blocked requests: {}", report.waits);
    println!("Elapsed: {:.2?}", report.elapsed);
    for r in &report.per_actor {
        println!(
            "  actor {}: {} cycles, waited {:.2?}",
            r.id, r.cycles_completed, r.waited
        );
    }
    println!("All actors finished, no deadlock.");
    Ok(())
}

//! # TFM Control Unit
//!
//! Runs the tube-forming machine's control loop against the simulated drive
//! bank. Operator frames are read from stdin, or from `--input` (a serial
//! device or a recorded command file).
//!
//! The simulated upper endstop sits `--sim-upper-limit-mm` above the
//! Follower's power-on position, so a Home command (`A,...Z`) completes.

use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tfm_common::config::{MachineConfig, load_config};
use tfm_common::state::LimitFlags;
use tfm_control_unit::cycle::{ControlContext, CycleRunner, rt_setup};
use tfm_control_unit::transport::{spawn_reader, spawn_stdin_reader};
use tfm_hal::{PositionTrip, SimLimitSwitches, TripSide, build_sim_bank};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// TFM Control Unit: tube-forming machine motion coordinator
#[derive(Parser, Debug)]
#[command(name = "tfm_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Tick-driven mode controller for a four-axis tube-forming machine")]
struct Args {
    /// Machine configuration TOML. Built-in defaults when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read operator frames from this file or device instead of stdin.
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Distance of the simulated upper endstop above the start position [mm].
    #[arg(long, default_value_t = 50.0)]
    sim_upper_limit_mm: f64,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("TFM Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("TFM Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading machine config from {}", path.display());
            load_config(path)?
        }
        None => {
            warn!("No --config given, using built-in machine defaults");
            MachineConfig::default()
        }
    };
    info!(
        "Config OK: cycle_time={}µs, frame_policy={:?}, max_blocking_ticks={}",
        config.cycle_time_us, config.frame_policy, config.max_blocking_ticks
    );

    let (bank, taps) = build_sim_bank(&config);
    let [follower_tap, ..] = taps;
    let threshold = (args.sim_upper_limit_mm * config.mechanics.lead_steps_per_mm).round() as i64;
    let limits = SimLimitSwitches::new().with_trip(PositionTrip {
        sensor: LimitFlags::UPPER,
        tap: follower_tap,
        threshold,
        side: TripSide::AtOrAbove,
    });
    info!("Simulated upper endstop at {threshold} steps");

    let ctx = ControlContext::new(config, bank, Box::new(limits))?;
    let mut runner = CycleRunner::new(ctx);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let input = match &args.input {
        Some(path) => {
            info!("Reading operator frames from {}", path.display());
            spawn_reader(File::open(path)?, "tfm-input")?
        }
        None => spawn_stdin_reader()?,
    };

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    runner.run(&running, &input)?;
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

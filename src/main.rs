//! # Tote Cell Core
//!
//! Safety-interlocked control loop binary for a tote-cell recycling
//! appliance: supervises the motor contactor, the flap-lock solenoid, and
//! their sensors against a TOML-configured hardware mapping.
//!
//! # Usage
//!
//! ```bash
//! tote_cell_core --config /etc/tote_cell/config.toml
//! tote_cell_core -c /etc/tote_cell/config.toml -v
//! ```

#![deny(warnings)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use tote_cell_core::clock::{Clock, SystemClock};
use tote_cell_core::config::{self, AppConfig};
use tote_cell_core::cycle::CycleEngine;
use tote_cell_core::cyclelog::CycleLog;
use tote_cell_core::error::AppError;
use tote_cell_core::io::adc::linux::LinuxI2cBus;
use tote_cell_core::io::adc::Ads1115;
use tote_cell_core::io::pin::linux::{GpioInput, GpioOutput};
use tote_cell_core::io::pin::DebouncedInput;
use tote_cell_core::io::ultrasonic::Ultrasonic;
use tote_cell_core::sensing::Sensing;
use tote_cell_core::solenoid::DoubleSolenoid;
use tote_cell_core::supervisor::Supervisor;

/// Tote Cell Core - safety-interlocked recycling appliance control loop
#[derive(Parser, Debug)]
#[command(name = "tote_cell_core")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Safety-interlocked control loop for a tote-cell recycling appliance")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "/etc/tote_cell/config.toml")]
    config: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("startup failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("tote_cell_core v{} starting", env!("CARGO_PKG_VERSION"));

    let cfg = config::load_config(&args.config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let mut supervisor = build_supervisor(&cfg, clock)?;
    supervisor.boot()?;

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        running_handler.store(false, Ordering::SeqCst);
    })?;

    supervisor.run(&running)?;

    info!("tote_cell_core shutdown complete");
    Ok(())
}

#[allow(clippy::type_complexity)]
fn build_supervisor(
    cfg: &AppConfig,
    clock: Arc<dyn Clock>,
) -> Result<Supervisor<GpioOutput, GpioOutput, GpioInput, LinuxI2cBus>, AppError> {
    let motor_en = GpioOutput::open(&cfg.pins.motor_en, "tote_cell_core")?;

    let sol_fwd = GpioOutput::open(&cfg.pins.sol_lock_fwd, "tote_cell_core")?;
    let sol_rev = GpioOutput::open(&cfg.pins.sol_lock_rev, "tote_cell_core")?;
    let solenoid = DoubleSolenoid::new(
        sol_fwd,
        sol_rev,
        clock.clone(),
        Duration::from_millis(cfg.solenoid.deadtime_ms),
        Duration::from_secs_f64(cfg.solenoid.max_on_s),
    )?;

    let flap_open = DebouncedInput::new(
        GpioInput::open(&cfg.pins.flap_open_reed, "tote_cell_core")?,
        clock.clone(),
        cfg.thresholds.debounce_ms,
    )?;
    let door_closed = DebouncedInput::new(
        GpioInput::open(&cfg.pins.door_closed_reed, "tote_cell_core")?,
        clock.clone(),
        cfg.thresholds.debounce_ms,
    )?;
    let mains_present = DebouncedInput::new(
        GpioInput::open(&cfg.pins.mains_present, "tote_cell_core")?,
        clock.clone(),
        cfg.thresholds.debounce_ms,
    )?;

    let timeout = Duration::from_secs_f64(cfg.thresholds.ultrasonic_timeout_s);
    let tote_present_ranger = Ultrasonic::new(
        GpioOutput::open(&cfg.pins.tote_present_trig, "tote_cell_core")?,
        GpioInput::open(&cfg.pins.tote_present_echo, "tote_cell_core")?,
        clock.clone(),
        timeout,
    );
    let tote_level_ranger = Ultrasonic::new(
        GpioOutput::open(&cfg.pins.tote_level_trig, "tote_cell_core")?,
        GpioInput::open(&cfg.pins.tote_level_echo, "tote_cell_core")?,
        clock.clone(),
        timeout,
    );

    let adc = if cfg.adc.enabled {
        let bus = LinuxI2cBus::open(&cfg.adc.i2c_dev)?;
        Some(Ads1115::new(bus, cfg.adc.addr, clock.clone()))
    } else {
        None
    };

    let sensing = Sensing::new(
        flap_open,
        door_closed,
        mains_present,
        tote_present_ranger,
        tote_level_ranger,
        adc,
        clock.clone(),
        cfg,
    );

    let cycle = CycleEngine::new(
        clock.clone(),
        cfg.thresholds.motor_overcurrent_a,
        cfg.thresholds.motor_max_run_s,
    );

    let log = CycleLog::new(cfg.paths.cycle_log_csv.clone());

    Ok(Supervisor::new(clock, motor_en, solenoid, sensing, cycle, log))
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

//! # Quill Firmware
//!
//! Host-runnable build of the pen-plotter dispatcher: real G-code over a
//! real serial port, driving the in-memory stepper/endstop/override
//! hardware from [`quill_common::hal::sim`] (see DESIGN.md — no
//! board-specific GPIO driver exists in this workspace yet; the HAL seams
//! are wired the way `evo_hal`'s driver registry wires a named driver, just
//! with only one driver currently registered).
//!
//! # Usage
//!
//! ```bash
//! # Talk to a real USB-serial adapter at the default baud rate
//! quill_fw --port /dev/ttyUSB0
//!
//! # Verbose logging, JSON output
//! quill_fw --port /dev/ttyACM0 --baud 250000 -v --json
//! ```

#![deny(warnings)]

use std::array;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use quill_common::config::MachineConfig;
use quill_common::consts::WATCHDOG_WINDOW_MS;
use quill_common::endstop::EndstopChannel;
use quill_common::hal::sim::{SimAnalogInput, SimInput, SimStepPins};
use quill_common::hal::SystemClock;
use quill_common::types::Axis;
use quill_common::watchdog::SimWatchdog;

use quill_core::stepper::StepperChannel;

use quill_fw::dispatcher::Dispatcher;
use quill_fw::file_reader::NoFileReader;
use quill_fw::responder::FirmwareInfo;
use quill_fw::serial::RealTransport;
use quill_fw::ui::NullUi;

/// Quill firmware: pen-plotter motion controller
#[derive(Parser, Debug)]
#[command(name = "quill_fw")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Pen-plotter motion controller firmware", long_about = None)]
struct Args {
    /// Serial device path the host speaks the line protocol over.
    #[arg(short, long)]
    port: String,

    /// Baud rate. 115200 matches the spec's reference configuration.
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Board identifier reported in the M115 banner.
    #[arg(long, default_value = "quill-ref")]
    board: String,

    /// Enable verbose (DEBUG) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(args) {
        error!("firmware exited with error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("Quill firmware v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = MachineConfig::default();
    config.validate().map_err(|e| format!("invalid machine configuration: {e}"))?;

    let clock = SystemClock::new();

    let channels: [StepperChannel<SimStepPins, SystemClock>; 3] = array::from_fn(|i| {
        let axis = Axis::ALL[i];
        StepperChannel::new(SimStepPins::default(), clock.clone(), config.axis(axis).invert_direction)
    });
    let endstops: [EndstopChannel<SimInput, SystemClock>; 3] = array::from_fn(|i| {
        let axis = Axis::ALL[i];
        EndstopChannel::new(SimInput::new(false), clock.clone(), config.axis(axis).invert_endstop, config.endstop_debounce_ms)
    });
    let watchdog = SimWatchdog::new(clock.clone(), WATCHDOG_WINDOW_MS);
    let analog = SimAnalogInput::new(100.0);

    let transport = RealTransport::open(&args.port, args.baud)?;

    let board: &'static str = Box::leak(args.board.into_boxed_str());
    let firmware_info = FirmwareInfo::new("Quill", env!("CARGO_PKG_VERSION"), board);

    let mut dispatcher = Dispatcher::new(
        config,
        channels,
        endstops,
        clock,
        watchdog,
        transport,
        analog,
        Box::new(NullUi),
        Box::new(NoFileReader),
        firmware_info,
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running_handler.store(false, Ordering::SeqCst);
    })?;

    dispatcher.emit_boot_banner();
    info!(port = %args.port, baud = args.baud, "entering dispatcher loop");

    while running.load(Ordering::SeqCst) {
        dispatcher.tick();
    }

    info!("Quill firmware shutdown complete");
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

//! Integration-level coverage of the literal end-to-end scenarios, driving
//! the full [`Dispatcher`] through its public API with a simulated
//! transport and simulated HAL, the way a host-side test harness would.
//!
//! Lower-level, single-command, and state-machine-transition tests live
//! alongside the modules they exercise; this file only covers the
//! multi-command scenario flows.

use quill_common::config::MachineConfig;
use quill_common::endstop::EndstopChannel;
use quill_common::hal::sim::{SimAnalogInput, SimClock, SimInput, SimStepPins, SimTransport};
use quill_common::types::{Axis, Point3D};
use quill_common::watchdog::SimWatchdog;

use quill_core::stepper::StepperChannel;

use quill_fw::dispatcher::Dispatcher;
use quill_fw::file_reader::NoFileReader;
use quill_fw::responder::FirmwareInfo;
use quill_fw::testing::{ThresholdInput, TrackedPins};
use quill_fw::ui::NullUi;

type SimDispatcher = Dispatcher<SimStepPins, SimClock, SimInput, SimWatchdog<SimClock>, SimTransport, SimAnalogInput>;

fn sim_dispatcher(config: MachineConfig) -> SimDispatcher {
    let clock = SimClock::auto_ticking(1);
    let channels: [StepperChannel<SimStepPins, SimClock>; 3] =
        std::array::from_fn(|_| StepperChannel::new(SimStepPins::default(), clock.clone(), false));
    let endstops: [EndstopChannel<SimInput, SimClock>; 3] =
        std::array::from_fn(|_| EndstopChannel::new(SimInput::new(false), clock.clone(), false, 10));
    let watchdog = SimWatchdog::new(clock.clone(), 8_000);
    let analog = SimAnalogInput::new(100.0);
    let info = FirmwareInfo::new("Quill", "0.1.0", "quill-test");
    Dispatcher::new(
        config,
        channels,
        endstops,
        clock,
        watchdog,
        SimTransport::new(),
        analog,
        Box::new(NullUi),
        Box::new(NoFileReader),
        info,
    )
}

fn send(dispatcher: &mut SimDispatcher, line: &str) -> String {
    dispatcher.transport_mut().feed(line);
    dispatcher.tick();
    dispatcher.transport_mut().take_output()
}

/// Scenario 1: an absolute move before any axis is homed.
#[test]
fn absolute_move_pre_homing_is_rejected() {
    let mut dispatcher = sim_dispatcher(MachineConfig::default());

    let out = send(&mut dispatcher, "G90\n");
    assert_eq!(out, "// Absolute positioning mode (G90)\nok\n");

    let out = send(&mut dispatcher, "G0 X10 Y10 F3000\n");
    assert_eq!(out, "error:6 - Required axis not homed\nok\n");
    assert_eq!(dispatcher.state().position, Point3D::ZERO);
}

/// Scenario 2: a relative jog with no prior homing, reported back by M114.
#[test]
fn relative_jog_reports_the_new_position() {
    let mut dispatcher = sim_dispatcher(MachineConfig::default());

    send(&mut dispatcher, "G91\n");
    send(&mut dispatcher, "G0 X5 F5000\n");
    let out = send(&mut dispatcher, "M114\n");

    assert_eq!(out, "// X:5.00 Y:0.00 Z:0.00\nok\n");
}

/// Scenario 4: a move whose Euclidean jump exceeds the configured maximum
/// is rejected before any homed or soft-limit check runs.
#[test]
fn oversized_jump_is_rejected() {
    let mut config = MachineConfig::default();
    config.max_jump_mm = 1000.0;
    let mut dispatcher = sim_dispatcher(config);

    let out = send(&mut dispatcher, "G90\n");
    assert_eq!(out, "// Absolute positioning mode (G90)\nok\n");

    let out = send(&mut dispatcher, "G0 X2000 F5000\n");
    assert_eq!(out, "error:3 - Impossible position jump detected\nok\n");
    assert_eq!(dispatcher.state().position, Point3D::ZERO);
}

/// Scenario 6: the ninth queued command overflows the 8-deep queue; the
/// eight already popped this pass still get their normal acknowledgment.
#[test]
fn ninth_queued_command_overflows_the_queue() {
    let mut dispatcher = sim_dispatcher(MachineConfig::default());
    for _ in 0..9 {
        dispatcher.transport_mut().feed("G91\n");
    }
    dispatcher.tick();
    let out = dispatcher.transport_mut().take_output();

    assert!(out.contains("error:7 - Buffer overflow\nok\n"));
    assert!(out.contains("// Relative positioning mode (G91)\nok\n"));
}

/// A config with a small, fast-converging X axis so a real homing pass
/// (pre-clear, fast approach, backoff, slow approach) completes in a
/// handful of simulated steps, for the two scenarios below that need X
/// actually homed against a physically-grounded endstop double.
fn small_x_travel_config() -> MachineConfig {
    let mut cfg = MachineConfig::default();
    cfg.x.steps_per_mm = 10.0;
    cfg.x.max_velocity_mm_s = 50.0;
    cfg.x.max_accel_mm_s2 = 500.0;
    cfg.x.soft_limit_max_mm = 5.0;
    cfg.x.home_dir = 1;
    cfg.homing_backoff_mm = 2.0;
    cfg.homing_timeout_s = 3600;
    cfg
}

type ThresholdDispatcher =
    Dispatcher<TrackedPins, SimClock, ThresholdInput, SimWatchdog<SimClock>, SimTransport, SimAnalogInput>;

/// Every channel's pins and endstop share a position counter with a real
/// trigger threshold, so homing X actually completes. Y and Z get
/// thresholds their stationary counters never reach.
fn dispatcher_with_real_endstops(config: MachineConfig) -> ThresholdDispatcher {
    let clock = SimClock::auto_ticking(1);
    let x_trigger = (config.x.soft_limit_max_mm * config.x.steps_per_mm).round() as i32;
    let triggers = [x_trigger, 1_000_000, 1_000_000];

    let pins: [TrackedPins; 3] = std::array::from_fn(|_| TrackedPins::default());
    let endstops: [EndstopChannel<ThresholdInput, SimClock>; 3] = std::array::from_fn(|i| {
        let pin = ThresholdInput { position: pins[i].position.clone(), trigger_step: triggers[i], homes_positive: true };
        EndstopChannel::new(pin, clock.clone(), false, 10)
    });
    let channels: [StepperChannel<TrackedPins, SimClock>; 3] =
        pins.map(|p| StepperChannel::new(p, clock.clone(), false));
    let watchdog = SimWatchdog::new(clock.clone(), 8_000);
    let analog = SimAnalogInput::new(100.0);
    let info = FirmwareInfo::new("Quill", "0.1.0", "quill-test");

    Dispatcher::new(
        config,
        channels,
        endstops,
        clock,
        watchdog,
        SimTransport::new(),
        analog,
        Box::new(NullUi),
        Box::new(NoFileReader),
        info,
    )
}

fn send_threshold(dispatcher: &mut ThresholdDispatcher, line: &str) -> String {
    dispatcher.transport_mut().feed(line);
    dispatcher.tick();
    dispatcher.transport_mut().take_output()
}

/// Scenario 3: after a real home, a move outside the soft limit is rejected
/// and the logical position stays at the post-home value.
#[test]
fn soft_limit_rejects_an_out_of_range_move_after_homing() {
    let mut dispatcher = dispatcher_with_real_endstops(small_x_travel_config());

    let out = send_threshold(&mut dispatcher, "G28 X\n");
    assert!(out.contains("Homing complete"));
    assert_eq!(dispatcher.state().position.x, 5.0);

    let out = send_threshold(&mut dispatcher, "G0 X300 F3000\n");
    assert_eq!(out, "error:3 - Target position out of bounds\nok\n");
    assert_eq!(dispatcher.state().position.x, 5.0);
}

/// Scenario 5: jogging into the home endstop aborts the move, and the
/// firmware auto-homes the axis and reseats it rather than leaving it stuck
/// mid-jog.
#[test]
fn jogging_into_the_home_endstop_triggers_an_auto_rehome() {
    let mut dispatcher = dispatcher_with_real_endstops(small_x_travel_config());
    send_threshold(&mut dispatcher, "G28 X\n");
    send_threshold(&mut dispatcher, "G91\n");

    let out = send_threshold(&mut dispatcher, "G0 X1 F3000\n");
    assert!(out.contains("Auto-homed X after endstop contact"));
    assert!(dispatcher.state().is_homed(Axis::X));
    assert_eq!(dispatcher.state().position.x, 5.0);
}

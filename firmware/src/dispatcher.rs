//! The cooperative main loop (spec §4.9): one non-blocking pass per call,
//! feeding the watchdog, draining the transport, polling the override pot,
//! ticking the UI, and — at most one per pass — executing a queued command.
//!
//! Mirrors the teacher's `evo_control_unit` main loop shape: a single
//! `tick()` a `main.rs` calls in an infinite loop, rather than an internal
//! `loop {}` of its own, so a host-side harness can drive it one step at a
//! time in tests.

use quill_common::command::{HomeSelect, MoveParams, ParsedCommand, SetPositionParams};
use quill_common::config::MachineConfig;
use quill_common::endstop::EndstopChannel;
use quill_common::error::ErrorCode;
use quill_common::hal::{AnalogInput, Clock, DigitalInput, SerialTransport, StepPins};
use quill_common::queue::CommandQueue;
use quill_common::state::MachineState;
use quill_common::types::{Axis, Point3D};
use quill_common::watchdog::Watchdog;

use quill_core::homing::HomingCoordinator;
use quill_core::kinematics::{is_valid_position, mm_to_steps, steps_to_mm};
use quill_core::motion::{MotionExecutor, MotionOutcome};
use quill_core::stepper::StepperChannel;

use tracing::{debug, info, warn};

use crate::file_reader::FileReader;
use crate::parser::parse_line;
use crate::responder::{
    endstop_line, error_line, firmware_line, info_line, jump_error_line, position_line, FirmwareInfo, OK,
};
use crate::serial::{write_line, SerialLineAssembler};
use crate::ui::UiScreen;

/// Raw pulses issued by M999, enough to see a step/dir LED blink without
/// moving the carriage any meaningful distance.
const DIAGNOSTIC_PULSE_COUNT: u32 = 10;

/// Owns every piece of mutable machine state and drives exactly one pass of
/// the protocol per [`Dispatcher::tick`] call. `ui` and `file_reader` are
/// boxed trait objects — narrow external collaborators, not part of the
/// motion core — so a headless build wires in [`crate::ui::NullUi`] and
/// [`crate::file_reader::NoFileReader`] with no other code changes.
pub struct Dispatcher<P, C, I, W, T, A> {
    config: MachineConfig,
    state: MachineState,
    channels: [StepperChannel<P, C>; 3],
    endstops: [EndstopChannel<I, C>; 3],
    clock: C,
    watchdog: W,
    transport: T,
    analog: A,
    assembler: SerialLineAssembler,
    queue: CommandQueue,
    ui: Box<dyn UiScreen>,
    file_reader: Box<dyn FileReader>,
    firmware_info: FirmwareInfo,
    last_override_percent: f32,
}

impl<P, C, I, W, T, A> Dispatcher<P, C, I, W, T, A>
where
    P: StepPins,
    C: Clock + Clone,
    I: DigitalInput,
    W: Watchdog,
    T: SerialTransport,
    A: AnalogInput,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: MachineConfig,
        channels: [StepperChannel<P, C>; 3],
        endstops: [EndstopChannel<I, C>; 3],
        clock: C,
        watchdog: W,
        transport: T,
        analog: A,
        ui: Box<dyn UiScreen>,
        file_reader: Box<dyn FileReader>,
        firmware_info: FirmwareInfo,
    ) -> Self {
        let max_xy_velocity = config.x.max_velocity_mm_s.max(config.y.max_velocity_mm_s);
        let state = MachineState::boot(max_xy_velocity, config.idle_disable_timeout_ms);
        let last_override_percent = analog.read_percent();
        Self {
            config,
            state,
            channels,
            endstops,
            clock,
            watchdog,
            transport,
            analog,
            assembler: SerialLineAssembler::new(),
            queue: CommandQueue::new(),
            ui,
            file_reader,
            firmware_info,
            last_override_percent,
        }
    }

    /// Sent unprompted on reset (spec §6).
    pub fn emit_boot_banner(&mut self) {
        info!("boot");
        let line = firmware_line(&self.firmware_info);
        write_line(&mut self.transport, &line);
    }

    /// The transport driving the protocol, for a host-side harness to feed
    /// input lines and read emitted output.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// A snapshot of the machine state, for a host-side harness to assert on.
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// One non-blocking pass. Safe to call in a tight loop; each step is
    /// O(1) except step 7, which may block for the duration of one queued
    /// command (a move or a home).
    pub fn tick(&mut self) {
        self.watchdog.feed();

        self.assembler.poll(&mut self.transport, &mut self.queue);

        let override_percent = self.analog.read_percent();
        if (override_percent - self.last_override_percent).abs() > f32::EPSILON {
            self.state.speed_factor_percent = override_percent.clamp(10.0, 200.0);
            self.last_override_percent = override_percent;
        }

        self.ui.tick(&self.state);

        let now = self.clock.now_ms();
        if self.state.is_idle_expired(now) {
            self.disable_all_steppers();
        }

        if self.file_reader.is_active() && !self.file_reader.is_paused() {
            if let Some(line) = self.file_reader.next_line() {
                let cmd = parse_line(&line);
                if !matches!(cmd, ParsedCommand::Unknown | ParsedCommand::InvalidSyntax) && !self.queue.is_full() {
                    let _ = self.queue.push(cmd);
                }
            }
        }

        if let Some(cmd) = self.queue.pop() {
            debug!(?cmd, "dispatch");
            self.dispatch(cmd);
        }
    }

    fn dispatch(&mut self, cmd: ParsedCommand) {
        match cmd {
            ParsedCommand::Move(params) => self.handle_move(params),
            ParsedCommand::Home(select) => self.handle_home(select),
            ParsedCommand::SetPosition(params) => self.handle_set_position(params),
            ParsedCommand::ModeAbsolute => {
                self.state.absolute_mode = true;
                self.respond_info("Absolute positioning mode (G90)");
                self.respond_ok();
            }
            ParsedCommand::ModeRelative => {
                self.state.absolute_mode = false;
                self.respond_info("Relative positioning mode (G91)");
                self.respond_ok();
            }
            ParsedCommand::DisableSteppers { timeout_s } => self.handle_disable_steppers(timeout_s),
            ParsedCommand::SetSpeedFactor { percent } => {
                self.state.speed_factor_percent = percent.clamp(1.0, 999.0);
                self.respond_ok();
            }
            ParsedCommand::QueryPosition => {
                let line = position_line(self.state.position);
                write_line(&mut self.transport, &line);
                self.respond_ok();
            }
            ParsedCommand::QueryFirmware => {
                let line = firmware_line(&self.firmware_info);
                write_line(&mut self.transport, &line);
                self.respond_ok();
            }
            ParsedCommand::QueryEndstops => self.handle_query_endstops(),
            ParsedCommand::ReportSettings => self.handle_report_settings(),
            ParsedCommand::Pause => {
                self.file_reader.set_paused(true);
                self.respond_ok();
            }
            ParsedCommand::Resume => {
                self.file_reader.set_paused(false);
                self.respond_ok();
            }
            ParsedCommand::Stop => {
                self.file_reader.set_paused(true);
                self.queue.clear();
                self.disable_all_steppers();
                self.respond_ok();
            }
            ParsedCommand::QuickStop => {
                self.queue.clear();
                self.disable_all_steppers();
                self.respond_info("Quick stop");
                self.respond_ok();
            }
            ParsedCommand::DiagnosticMotor { axis } => {
                self.channels[axis.index()].diagnostic_pulses(DIAGNOSTIC_PULSE_COUNT);
                self.respond_ok();
            }
            ParsedCommand::InvalidSyntax => {
                self.respond_err(ErrorCode::InvalidSyntax);
                self.respond_ok();
            }
            ParsedCommand::Unknown => {
                self.respond_err(ErrorCode::UnknownCommand);
                self.respond_ok();
            }
        }
    }

    fn handle_move(&mut self, params: MoveParams) {
        let current = self.state.position;
        let target = if self.state.absolute_mode {
            Point3D {
                x: params.x.unwrap_or(current.x),
                y: params.y.unwrap_or(current.y),
                z: params.z.unwrap_or(current.z),
            }
        } else {
            Point3D {
                x: current.x + params.x.unwrap_or(0.0),
                y: current.y + params.y.unwrap_or(0.0),
                z: current.z + params.z.unwrap_or(0.0),
            }
        };

        if current.distance_to(target) > self.config.max_jump_mm {
            let line = jump_error_line();
            self.respond_err_text(line);
            self.respond_ok();
            return;
        }

        if self.state.absolute_mode {
            let named = [
                (Axis::X, params.x.is_some()),
                (Axis::Y, params.y.is_some()),
                (Axis::Z, params.z.is_some()),
            ];
            for (axis, is_named) in named {
                if is_named && !self.state.is_homed(axis) {
                    self.respond_err(ErrorCode::NotHomed);
                    self.respond_ok();
                    return;
                }
            }
            if !is_valid_position(&self.config, target) {
                self.respond_err(ErrorCode::OutOfRange);
                self.respond_ok();
                return;
            }
        }

        if let Some(f) = params.f {
            self.state.feed_rate_mm_min = f;
        }
        let commanded_mm_s = (self.state.feed_rate_mm_min / 60.0) * (self.state.speed_factor_percent / 100.0);

        let deltas_mm: [f32; 3] = Axis::ALL.map(|axis| target.get(axis) - current.get(axis));
        let dominant = (0..3usize).max_by(|&a, &b| deltas_mm[a].abs().total_cmp(&deltas_mm[b].abs())).unwrap_or(0);
        let total_mm = deltas_mm[dominant].abs();

        let mut targets_steps = [0i32; 3];
        let mut max_speeds_steps = [0f32; 3];
        let mut accels_steps = [0f32; 3];
        for axis in Axis::ALL {
            let idx = axis.index();
            targets_steps[idx] = mm_to_steps(&self.config, axis, target.get(axis));
            let ratio = if total_mm > 0.0 { deltas_mm[idx].abs() / total_mm } else { 0.0 };
            let axis_cfg = self.config.axis(axis);
            let axis_speed_mm_s = (commanded_mm_s * ratio).min(axis_cfg.max_velocity_mm_s);
            max_speeds_steps[idx] = axis_speed_mm_s * axis_cfg.steps_per_mm;
            accels_steps[idx] = axis_cfg.max_accel_mm_s2 * axis_cfg.steps_per_mm;
        }

        for ch in self.channels.iter_mut() {
            ch.set_enabled(true);
        }
        self.state.steppers_disabled = false;

        let home_dirs = [self.config.x.home_dir, self.config.y.home_dir, self.config.z.home_dir];
        let watch_axes: heapless::Vec<Axis, 3> = if self.state.absolute_mode {
            heapless::Vec::new()
        } else {
            Axis::ALL
                .into_iter()
                .filter(|&axis| {
                    let idx = axis.index();
                    let delta = deltas_mm[idx];
                    let sign: i8 = if delta > 0.0 {
                        1
                    } else if delta < 0.0 {
                        -1
                    } else {
                        0
                    };
                    sign != 0 && sign == home_dirs[idx]
                })
                .collect()
        };

        let outcome = {
            let channels = &mut self.channels;
            let clock = &self.clock;
            let watchdog = &mut self.watchdog;
            if watch_axes.is_empty() {
                MotionExecutor::run(channels, targets_steps, max_speeds_steps, accels_steps, clock, watchdog, None)
            } else {
                let endstops = &mut self.endstops;
                let mut abort = || -> Option<Axis> {
                    watch_axes.iter().copied().find(|&axis| endstops[axis.index()].is_triggered())
                };
                MotionExecutor::run(
                    channels,
                    targets_steps,
                    max_speeds_steps,
                    accels_steps,
                    clock,
                    watchdog,
                    Some(&mut abort),
                )
            }
        };

        match outcome {
            MotionOutcome::Completed => {
                self.state.position = target;
            }
            MotionOutcome::Aborted(axis) => {
                info!(axis = ?axis, "jog aborted on endstop contact, auto-homing");
                for a in Axis::ALL {
                    if a != axis {
                        self.state.position.set(a, target.get(a));
                    }
                }
                let idx = axis.index();
                let home_result = HomingCoordinator::home_axis(
                    &self.config,
                    axis,
                    &mut self.channels,
                    &mut self.endstops[idx],
                    &self.clock,
                    &mut self.watchdog,
                );
                match home_result {
                    Ok(seat_step) => {
                        let seated_mm = steps_to_mm(&self.config, axis, seat_step);
                        self.state.position.set(axis, seated_mm);
                        self.state.set_homed(axis, true);
                        let text = format!("Auto-homed {} after endstop contact", axis.letter());
                        self.respond_info(&text);
                    }
                    Err(reason) => {
                        warn!(axis = ?axis, reason = %reason, "auto-home after endstop contact failed");
                        self.state.set_homed(axis, false);
                        self.state.position.set(axis, 0.0);
                        self.respond_err(ErrorCode::HomingFailed);
                    }
                }
            }
        }

        self.mark_active_now();
        self.respond_ok();
    }

    fn handle_home(&mut self, select: HomeSelect) {
        let mut any_failed = false;
        for axis in [Axis::Z, Axis::X, Axis::Y] {
            if !select.wants(axis) {
                continue;
            }
            let idx = axis.index();
            info!(axis = ?axis, "homing axis");
            let result = HomingCoordinator::home_axis(
                &self.config,
                axis,
                &mut self.channels,
                &mut self.endstops[idx],
                &self.clock,
                &mut self.watchdog,
            );
            match result {
                Ok(seat_step) => {
                    let seated_mm = steps_to_mm(&self.config, axis, seat_step);
                    self.state.position.set(axis, seated_mm);
                    self.state.set_homed(axis, true);
                    if axis == Axis::Z {
                        self.park_z();
                    }
                }
                Err(reason) => {
                    warn!(axis = ?axis, reason = %reason, "homing failed");
                    any_failed = true;
                    self.state.set_homed(axis, false);
                    self.state.position.set(axis, 0.0);
                }
            }
        }
        self.mark_active_now();
        if any_failed {
            self.respond_err(ErrorCode::HomingFailed);
        } else {
            self.respond_info("Homing complete");
        }
        self.respond_ok();
    }

    /// Drive Z to its parked height after a successful home (spec §3
    /// `post_home_z_mm`), holding X/Y at their current step position.
    fn park_z(&mut self) {
        let idx = Axis::Z.index();
        let z_target_steps = mm_to_steps(&self.config, Axis::Z, self.config.post_home_z_mm);
        let targets: [i32; 3] = std::array::from_fn(|i| if i == idx { z_target_steps } else { self.channels[i].current_step() });
        let mut max_speeds = [0.0; 3];
        let mut accels = [1.0; 3];
        max_speeds[idx] = self.config.z.max_velocity_mm_s * self.config.z.steps_per_mm;
        accels[idx] = self.config.z.max_accel_mm_s2 * self.config.z.steps_per_mm;
        MotionExecutor::run(&mut self.channels, targets, max_speeds, accels, &self.clock, &mut self.watchdog, None);
        self.state.position.z = self.config.post_home_z_mm;
    }

    fn handle_set_position(&mut self, params: SetPositionParams) {
        for axis in Axis::ALL {
            let value = match axis {
                Axis::X => params.x,
                Axis::Y => params.y,
                Axis::Z => params.z,
            };
            if let Some(v) = value {
                self.state.position.set(axis, v);
                let steps = mm_to_steps(&self.config, axis, v);
                self.channels[axis.index()].seat_position(steps);
            }
        }
        self.mark_active_now();
        self.respond_ok();
    }

    fn handle_disable_steppers(&mut self, timeout_s: Option<f32>) {
        match timeout_s {
            Some(s) => self.state.idle_disable_timeout_ms = (s.max(0.0) * 1000.0) as u32,
            None => self.state.idle_disable_timeout_ms = self.config.idle_disable_timeout_ms,
        }
        self.disable_all_steppers();
        self.respond_ok();
    }

    fn handle_query_endstops(&mut self) {
        for axis in Axis::ALL {
            let triggered = self.endstops[axis.index()].is_triggered();
            let line = endstop_line(axis, triggered);
            write_line(&mut self.transport, &line);
        }
        self.respond_ok();
    }

    fn handle_report_settings(&mut self) {
        for axis in Axis::ALL {
            let cfg = self.config.axis(axis);
            let text = format!(
                "{}: steps/mm={} vmax={} amax={} limit={}",
                axis.letter(),
                cfg.steps_per_mm,
                cfg.max_velocity_mm_s,
                cfg.max_accel_mm_s2,
                cfg.soft_limit_max_mm
            );
            self.respond_info(&text);
        }
        self.respond_ok();
    }

    fn disable_all_steppers(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.set_enabled(false);
        }
        self.state.steppers_disabled = true;
    }

    fn mark_active_now(&mut self) {
        let now = self.clock.now_ms();
        self.state.mark_active(now);
    }

    fn respond_err(&mut self, code: ErrorCode) {
        warn!(code = code.code(), text = code.text(), "protocol error");
        let line = error_line(code);
        write_line(&mut self.transport, &line);
    }

    fn respond_err_text(&mut self, line: String) {
        warn!(line = %line, "protocol error");
        write_line(&mut self.transport, &line);
    }

    fn respond_info(&mut self, text: &str) {
        let line = info_line(text);
        write_line(&mut self.transport, &line);
    }

    fn respond_ok(&mut self) {
        write_line(&mut self.transport, OK);
    }
}

// Implements the PressureController, the orchestrator of the breathing cycle.
//
// Key Features:
// - Advances the cycle state machine (inspiration, hold, exhale) every centisecond tick
// - Runs exactly one PID loop per tick: blower side during inhalation, patient side during
//   exhalation, the other valve being forced closed
// - Tracks peak, plateau, PEEP and mean pressure of the cycle
// - Calibrates the peak command and the blower base speed from cycle to cycle
// - Evaluates the cycle alarms at the end of each cycle and the over-pressure alarm every tick
// - Stages actuator commands; `execute_commands` writes them to the hardware
//
// Detailed Operation:
// The caller feeds `update_dt` and `update_pressure`, then calls `compute(tick)` with
// `tick` in [0, centi_sec_per_cycle). When `tick` reaches the cycle duration the caller runs
// `end_respiratory_cycle` followed by `init_respiratory_cycle` and restarts from tick 0.
// Operator changes and start/stop requests are only taken into account at the cycle start.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::actuators::{Blower, BlowerDriver, Valve, ValveDriver};
use crate::alarms::{AlarmCode, AlarmController};
use crate::commands::{CommandSet, OperatorCommands};
use crate::config::{
    ConfigError, VentilatorConfig, ALARM_THRESHOLD_MAX_PRESSURE_MMH2O,
    ALARM_THRESHOLD_MIN_PRESSURE_MMH2O, ALARM_THRESHOLD_PEEP_DIFFERENCE_MMH2O,
    ALARM_THRESHOLD_PLATEAU_DIFFERENCE_PERCENT, BLOWER_INCREMENT_LATE,
    BLOWER_INCREMENT_NO_PLATEAU, BLOWER_INCREMENT_TIERS, CONTROL_PERIOD_US,
    PEAK_APPROACH_MARGIN_MMH2O, PEAK_CALIBRATION_COARSE_PERCENT,
    PEAK_CALIBRATION_COARSE_STEP_MMH2O, PEAK_CALIBRATION_DEADBAND_PERCENT,
    PEAK_CALIBRATION_FINE_STEP_MMH2O, PLATEAU_UNKNOWN, PRESSURE_STABILITY_THRESHOLD_MMH2O,
    VALVE_CLOSED_STATE, VALVE_OPEN_STATE,
};
use crate::cycle::{CyclePhase, CycleSubPhase, CycleTiming};
use crate::math_integer::controllers::pid::PID;
use crate::math_integer::normalization::AffineMap;
use crate::plateau::PlateauTracker;

/// Read-only copy of the controller state for display and telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerSnapshot {
    pub tick: u16,
    pub phase: CyclePhase,
    pub sub_phase: CycleSubPhase,
    pub pressure: i16,
    pub peak_pressure: i16,
    pub plateau_pressure: i16,
    pub peep: i16,
    pub previous_peak_pressure: i16,
    pub previous_plateau_pressure: i16,
    pub inspiratory_valve_command: u16,
    pub inspiratory_valve_position: u16,
    pub expiratory_valve_command: u16,
    pub expiratory_valve_position: u16,
    pub blower_speed: u16,
    pub cycle: u32,
    pub running: bool,
}

pub struct PressureController {
    config: VentilatorConfig,
    commands: OperatorCommands,
    timing: CycleTiming,

    tick: u16,
    phase: CyclePhase,
    sub_phase: CycleSubPhase,
    /// Tick at which the hold phase was first entered in this cycle
    plateau_start_time: Option<u16>,

    pressure: i16,
    peak_pressure: i16,
    plateau_pressure: i16,
    peep: i16,
    /// Values of the last completed cycle, kept across the cycle start for the display
    previous_peak_pressure: i16,
    previous_plateau_pressure: i16,
    pressure_sum: i32,
    pressure_samples: i32,

    plateau: PlateauTracker,

    blower_pid: PID,
    patient_pid: PID,
    blower_aperture: AffineMap,
    patient_aperture: AffineMap,

    inspiratory_valve: Valve,
    expiratory_valve: Valve,
    blower: Blower,
    blower_base_speed: u16,
    /// Computed at the end of a cycle, applied at the start of the next one
    pending_blower_increment: i16,

    dt_us: i32,
    cycle: u32,
    running: bool,
    requested_running: Option<bool>,
}

impl PressureController {
    /// Builds a running controller from a validated configuration.
    ///
    /// `init_respiratory_cycle` must be called before the first `compute`.
    pub fn new(config: VentilatorConfig) -> Result<Self, ConfigError> {
        if let Err(err) = config.validate() {
            error!("configuration rejected: {:?}", err);
            return Err(err);
        }

        let inspiratory_valve = Valve::new(VALVE_OPEN_STATE, VALVE_CLOSED_STATE);
        let expiratory_valve = Valve::new(VALVE_OPEN_STATE, VALVE_CLOSED_STATE);

        // Blower loop opens with positive commands, patient loop with negative ones
        let blower_aperture = inspiratory_valve
            .aperture_map(config.blower_pid.command_min, config.blower_pid.command_max);
        let patient_aperture = expiratory_valve
            .aperture_map(config.patient_pid.command_max, config.patient_pid.command_min);

        let initial = config.initial_commands;
        Ok(Self {
            config,
            commands: OperatorCommands::new(initial, config.peak_step),
            timing: CycleTiming::from_rate(initial.cycles_per_minute),

            tick: 0,
            phase: CyclePhase::Inhalation,
            sub_phase: CycleSubPhase::Inspiration,
            plateau_start_time: None,

            pressure: 0,
            peak_pressure: 0,
            plateau_pressure: PLATEAU_UNKNOWN,
            peep: 0,
            previous_peak_pressure: 0,
            previous_plateau_pressure: PLATEAU_UNKNOWN,
            pressure_sum: 0,
            pressure_samples: 0,

            plateau: PlateauTracker::new(),

            blower_pid: PID::new(config.blower_pid),
            patient_pid: PID::new(config.patient_pid),
            blower_aperture,
            patient_aperture,

            inspiratory_valve,
            expiratory_valve,
            blower: Blower::new(config.blower_speed_min, config.blower_speed_max),
            blower_base_speed: config.blower_speed_default,
            pending_blower_increment: 0,

            dt_us: CONTROL_PERIOD_US,
            cycle: 0,
            running: true,
            requested_running: None,
        })
    }

    /// Filtered pressure of the current tick, in mmH2O.
    #[inline]
    pub fn update_pressure(&mut self, pressure: i16) {
        self.pressure = pressure;
    }

    /// Time elapsed since the previous tick, in microseconds.
    #[inline]
    pub fn update_dt(&mut self, dt_us: i32) {
        self.dt_us = dt_us;
    }

    /// Runs one control tick; `tick` is the position in the cycle, in centiseconds.
    pub fn compute(&mut self, tick: u16, alarms: &mut AlarmController) {
        self.tick = tick;

        if self.running {
            self.update_sub_phase();

            self.pressure_sum += self.pressure as i32;
            self.pressure_samples += 1;
            self.plateau.tick(self.tick, self.pressure, &self.timing);

            match self.sub_phase {
                CycleSubPhase::Inspiration => {
                    self.peak_pressure = self.peak_pressure.max(self.pressure);
                    self.inhale(self.commands.active().max_peak);
                }
                CycleSubPhase::HoldInspiration => {
                    self.inhale(self.commands.active().max_plateau);
                }
                CycleSubPhase::Exhale => self.exhale(),
            }
        } else {
            self.stage_safe_state();
        }

        alarms.update_core_data(
            self.tick,
            self.pressure,
            self.phase,
            self.sub_phase,
            self.cycle,
        );

        // Over-pressure is watched every tick, even when stopped
        if self.pressure > ALARM_THRESHOLD_MAX_PRESSURE_MMH2O {
            alarms.detected_alarm(
                AlarmCode::RCM_SW_18,
                self.cycle,
                ALARM_THRESHOLD_MAX_PRESSURE_MMH2O as i32,
                self.pressure as i32,
            );
        } else {
            alarms.not_detected_alarm(AlarmCode::RCM_SW_18);
        }
    }

    /// Starts a new cycle: applies pending commands and requests, resets the cycle state.
    pub fn init_respiratory_cycle(&mut self) {
        if let Some(run) = self.requested_running.take() {
            if run != self.running {
                self.running = run;
                if run {
                    info!("ventilation started");
                } else {
                    warn!("ventilation stopped");
                }
            }
        }

        if self.commands.apply_pending() {
            let active = self.commands.active();
            info!(
                "commands applied: rate {} peep {} plateau {} peak {}",
                active.cycles_per_minute,
                active.min_peep,
                active.max_plateau,
                active.max_peak
            );
        }
        self.timing = CycleTiming::from_rate(self.commands.active().cycles_per_minute);

        self.tick = 0;
        self.phase = CyclePhase::Inhalation;
        self.sub_phase = CycleSubPhase::Inspiration;
        self.plateau_start_time = None;

        self.peak_pressure = 0;
        self.plateau_pressure = PLATEAU_UNKNOWN;
        self.pressure_sum = 0;
        self.pressure_samples = 0;

        self.blower_pid.reset();
        self.patient_pid.reset();
        self.plateau.reset();

        if self.pending_blower_increment != 0 {
            let speed = (self.blower_base_speed as i32 + self.pending_blower_increment as i32)
                .clamp(
                    self.config.blower_speed_min as i32,
                    self.config.blower_speed_max as i32,
                );
            self.blower_base_speed = speed as u16;
            self.pending_blower_increment = 0;
        }

        if self.running {
            self.blower.run_speed(self.blower_base_speed);
            debug!(
                "cycle {} start, blower {}",
                self.cycle,
                self.blower_base_speed
            );
        } else {
            self.stage_safe_state();
        }
    }

    /// Closes the cycle: latches the plateau, calibrates the next cycle and checks the alarms.
    pub fn end_respiratory_cycle(&mut self, alarms: &mut AlarmController) {
        if !self.running {
            return;
        }

        self.plateau_pressure = self.plateau.finish();
        self.previous_peak_pressure = self.peak_pressure;
        self.previous_plateau_pressure = self.plateau_pressure;
        self.calibrate();
        self.check_cycle_alarms(alarms);

        self.cycle = self.cycle.wrapping_add(1);
    }

    /// Writes the staged commands to the hardware; call after `compute`.
    pub fn execute_commands<I, E, B>(
        &mut self,
        inspiratory: &mut I,
        expiratory: &mut E,
        blower: &mut B,
    ) where
        I: ValveDriver,
        E: ValveDriver,
        B: BlowerDriver,
    {
        self.inspiratory_valve.execute(inspiratory);
        self.expiratory_valve.execute(expiratory);
        self.blower.execute(blower);
    }

    // ######################## START / STOP ##########################################

    /// Stops the ventilation at the next cycle start.
    pub fn request_stop(&mut self) {
        info!("stop requested");
        self.requested_running = Some(false);
    }

    /// Resumes the ventilation at the next cycle start.
    pub fn request_start(&mut self) {
        info!("start requested");
        self.requested_running = Some(true);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    // ######################## OPERATOR COMMANDS #####################################

    pub fn on_cycle_increase(&mut self) {
        self.commands.increment_cycles_per_minute();
    }

    pub fn on_cycle_decrease(&mut self) {
        self.commands.decrement_cycles_per_minute();
    }

    pub fn on_peep_increase(&mut self) {
        self.commands.increment_min_peep();
    }

    pub fn on_peep_decrease(&mut self) {
        self.commands.decrement_min_peep();
    }

    pub fn on_plateau_pressure_increase(&mut self) {
        self.commands.increment_max_plateau();
    }

    pub fn on_plateau_pressure_decrease(&mut self) {
        self.commands.decrement_max_plateau();
    }

    pub fn on_peak_pressure_increase(&mut self) {
        self.commands.increment_max_peak();
    }

    pub fn on_peak_pressure_decrease(&mut self) {
        self.commands.decrement_max_peak();
    }

    // ############################ ACCESSORS #########################################

    /// Commands used by the running cycle
    #[inline]
    pub fn commands(&self) -> &CommandSet {
        self.commands.active()
    }

    /// Commands that will be used from the next cycle on
    #[inline]
    pub fn pending_commands(&self) -> &CommandSet {
        self.commands.next()
    }

    #[inline]
    pub fn tick(&self) -> u16 {
        self.tick
    }

    #[inline]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    #[inline]
    pub fn sub_phase(&self) -> CycleSubPhase {
        self.sub_phase
    }

    #[inline]
    pub fn pressure(&self) -> i16 {
        self.pressure
    }

    #[inline]
    pub fn peak_pressure(&self) -> i16 {
        self.peak_pressure
    }

    /// Plateau of the running cycle, `PLATEAU_UNKNOWN` until `end_respiratory_cycle` latches it
    #[inline]
    pub fn plateau_pressure(&self) -> i16 {
        self.plateau_pressure
    }

    /// Peak pressure of the last completed cycle
    #[inline]
    pub fn previous_peak_pressure(&self) -> i16 {
        self.previous_peak_pressure
    }

    /// Plateau of the last completed cycle, `PLATEAU_UNKNOWN` when none was measured
    #[inline]
    pub fn previous_plateau_pressure(&self) -> i16 {
        self.previous_plateau_pressure
    }

    #[inline]
    pub fn peep(&self) -> i16 {
        self.peep
    }

    #[inline]
    pub fn plateau_start_time(&self) -> Option<u16> {
        self.plateau_start_time
    }

    #[inline]
    pub fn inspiratory_valve(&self) -> &Valve {
        &self.inspiratory_valve
    }

    #[inline]
    pub fn expiratory_valve(&self) -> &Valve {
        &self.expiratory_valve
    }

    #[inline]
    pub fn blower(&self) -> &Blower {
        &self.blower
    }

    /// Blower speed used at the start of each cycle
    #[inline]
    pub fn blower_base_speed(&self) -> u16 {
        self.blower_base_speed
    }

    #[inline]
    pub fn pending_blower_increment(&self) -> i16 {
        self.pending_blower_increment
    }

    /// Number of completed cycles
    #[inline]
    pub fn cycle_number(&self) -> u32 {
        self.cycle
    }

    #[inline]
    pub fn centi_sec_per_cycle(&self) -> u16 {
        self.timing.centi_sec_per_cycle()
    }

    #[inline]
    pub fn centi_sec_per_inhalation(&self) -> u16 {
        self.timing.centi_sec_per_inhalation()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            tick: self.tick,
            phase: self.phase,
            sub_phase: self.sub_phase,
            pressure: self.pressure,
            peak_pressure: self.peak_pressure,
            plateau_pressure: self.plateau_pressure,
            peep: self.peep,
            previous_peak_pressure: self.previous_peak_pressure,
            previous_plateau_pressure: self.previous_plateau_pressure,
            inspiratory_valve_command: self.inspiratory_valve.command(),
            inspiratory_valve_position: self.inspiratory_valve.position(),
            expiratory_valve_command: self.expiratory_valve.command(),
            expiratory_valve_position: self.expiratory_valve.position(),
            blower_speed: self.blower.speed(),
            cycle: self.cycle,
            running: self.running,
        }
    }

    // ############################ INTERNALS #########################################

    fn update_sub_phase(&mut self) {
        if self.timing.is_inhalation(self.tick) {
            let peak_reached = self.pressure
                >= self
                    .commands
                    .active()
                    .max_peak
                    .saturating_sub(PEAK_APPROACH_MARGIN_MMH2O);
            let holding = self.sub_phase == CycleSubPhase::HoldInspiration;

            if holding || peak_reached || self.tick >= self.timing.hold_start_tick() {
                if self.plateau_start_time.is_none() {
                    self.plateau_start_time = Some(self.tick);
                }
                self.sub_phase = CycleSubPhase::HoldInspiration;
            } else {
                self.sub_phase = CycleSubPhase::Inspiration;
            }
        } else {
            self.sub_phase = CycleSubPhase::Exhale;
        }
        self.phase = self.sub_phase.phase();
    }

    fn inhale(&mut self, target: i16) {
        let command = self.blower_pid.tick(target, self.pressure, self.dt_us);
        self.inspiratory_valve
            .set_aperture(&self.blower_aperture, command);
        self.expiratory_valve.close();
    }

    fn exhale(&mut self) {
        self.inspiratory_valve.close();

        let target = self
            .commands
            .active()
            .min_peep
            .saturating_add(self.config.patient_safety_peep_offset);
        let command = self.patient_pid.tick(target, self.pressure, self.dt_us);
        self.expiratory_valve
            .set_aperture(&self.patient_aperture, command);

        self.peep = match self.plateau.window_stats() {
            Some(stats) if stats.spread() < PRESSURE_STABILITY_THRESHOLD_MMH2O => stats.mean,
            _ => self.pressure,
        };
    }

    fn stage_safe_state(&mut self) {
        self.inspiratory_valve.close();
        self.expiratory_valve.close();
        self.blower.stop();
    }

    fn calibrate(&mut self) {
        let commands = *self.commands.active();

        if self.plateau_pressure == PLATEAU_UNKNOWN {
            self.pending_blower_increment = if self.peak_pressure < commands.max_peak {
                BLOWER_INCREMENT_NO_PLATEAU
            } else {
                -BLOWER_INCREMENT_NO_PLATEAU
            };
            warn!(
                "cycle {}: plateau unknown, blower increment {}",
                self.cycle,
                self.pending_blower_increment
            );
            return;
        }

        let delta = peak_calibration_delta(self.plateau_pressure, commands.max_plateau);
        if delta != 0 {
            let peak = self.commands.calibrate_max_peak(delta);
            debug!("peak command calibrated to {} mmH2O", peak);
        }

        let start = self
            .plateau_start_time
            .unwrap_or(self.timing.centi_sec_per_inhalation());
        self.pending_blower_increment = blower_increment(self.timing.percent_of_inhalation(start));
        debug!(
            "cycle {}: plateau {} mmH2O at tick {}, blower increment {}",
            self.cycle,
            self.plateau_pressure,
            start,
            self.pending_blower_increment
        );
    }

    fn check_cycle_alarms(&mut self, alarms: &mut AlarmController) {
        let commands = *self.commands.active();
        let cycle = self.cycle;

        // Plateau within +/-20% of its command
        let plateau_in_band = self.plateau_pressure != PLATEAU_UNKNOWN
            && (self.plateau_pressure as i32 - commands.max_plateau as i32).abs() * 100
                <= ALARM_THRESHOLD_PLATEAU_DIFFERENCE_PERCENT * commands.max_plateau as i32;
        for code in [AlarmCode::RCM_SW_1, AlarmCode::RCM_SW_14] {
            if plateau_in_band {
                alarms.not_detected_alarm(code);
            } else {
                alarms.detected_alarm(
                    code,
                    cycle,
                    commands.max_plateau as i32,
                    self.plateau_pressure as i32,
                );
            }
        }

        // Mean pressure too low: patient disconnected
        let mean = if self.pressure_samples > 0 {
            self.pressure_sum / self.pressure_samples
        } else {
            0
        };
        for code in [AlarmCode::RCM_SW_2, AlarmCode::RCM_SW_19] {
            if mean <= ALARM_THRESHOLD_MIN_PRESSURE_MMH2O as i32 {
                alarms.detected_alarm(
                    code,
                    cycle,
                    ALARM_THRESHOLD_MIN_PRESSURE_MMH2O as i32,
                    mean,
                );
            } else {
                alarms.not_detected_alarm(code);
            }
        }

        // PEEP within +/-2 cmH2O of its command
        let peep_in_band = (self.peep as i32 - commands.min_peep as i32).abs()
            <= ALARM_THRESHOLD_PEEP_DIFFERENCE_MMH2O as i32;
        for code in [AlarmCode::RCM_SW_3, AlarmCode::RCM_SW_15] {
            if peep_in_band {
                alarms.not_detected_alarm(code);
            } else {
                alarms.detected_alarm(code, cycle, commands.min_peep as i32, self.peep as i32);
            }
        }
    }
}

/// Correction of the peak command from the plateau error of the cycle.
fn peak_calibration_delta(plateau: i16, plateau_command: i16) -> i16 {
    if plateau_command <= 0 {
        return 0;
    }
    let error_percent =
        (plateau as i32 - plateau_command as i32).abs() * 100 / plateau_command as i32;
    let step = if error_percent > PEAK_CALIBRATION_COARSE_PERCENT {
        PEAK_CALIBRATION_COARSE_STEP_MMH2O
    } else if error_percent >= PEAK_CALIBRATION_DEADBAND_PERCENT {
        PEAK_CALIBRATION_FINE_STEP_MMH2O
    } else {
        0
    };
    if plateau < plateau_command {
        step
    } else {
        -step
    }
}

/// Blower speed correction from the plateau start, in percent of the inhalation budget.
fn blower_increment(start_percent: u32) -> i16 {
    BLOWER_INCREMENT_TIERS
        .iter()
        .find(|(bound, _)| start_percent < *bound)
        .map_or(BLOWER_INCREMENT_LATE, |(_, increment)| *increment)
}

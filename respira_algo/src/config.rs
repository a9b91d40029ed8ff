// Configuration of the respiratory control core.
//
// Key Features:
// - Compile-time constants for physiological ranges, alarm thresholds and actuator ranges
// - Runtime-tunable `VentilatorConfig` (PID gains, safety offset, command steps, blower range)
// - Construction-time validation returning `ConfigError`; the tick path never fails
//
// All pressures are expressed in mmH2O, all durations of the breathing cycle in centiseconds.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::fmt;

use crate::commands::CommandSet;

/// Period of the control tick in microseconds (100 Hz).
pub const CONTROL_PERIOD_US: i32 = 10_000;

/// Number of centiseconds in one minute, used to derive the cycle duration.
pub const CENTISEC_PER_MINUTE: u16 = 6000;

// ######################## OPERATOR COMMAND RANGES ################################
pub const CYCLES_PER_MINUTE_MIN: u16 = 5;
pub const CYCLES_PER_MINUTE_MAX: u16 = 35;
pub const CYCLES_PER_MINUTE_DEFAULT: u16 = 20;

pub const PEEP_MIN_MMH2O: i16 = 50;
pub const PEEP_MAX_MMH2O: i16 = 300;
pub const PEEP_STEP_MMH2O: i16 = 10;
pub const PEEP_DEFAULT_MMH2O: i16 = 50;

pub const PLATEAU_MIN_MMH2O: i16 = 100;
pub const PLATEAU_MAX_MMH2O: i16 = 400;
pub const PLATEAU_STEP_MMH2O: i16 = 10;
pub const PLATEAU_DEFAULT_MMH2O: i16 = 300;

pub const PEAK_MIN_MMH2O: i16 = 100;
pub const PEAK_MAX_MMH2O: i16 = 700;
pub const PEAK_STEP_DEFAULT_MMH2O: i16 = 10;
pub const PEAK_DEFAULT_MMH2O: i16 = 400;

// ############################ CYCLE STATE MACHINE ################################
/// Share of the inhalation budget after which the hold phase starts regardless of pressure.
pub const HOLD_INSPIRATION_TIME_PERCENT: u32 = 80;

/// Distance to the peak command at which the inspiration is considered done.
pub const PEAK_APPROACH_MARGIN_MMH2O: i16 = 1;

// ############################ PLATEAU DETECTION ##################################
/// Size of the pressure window scanned for stability.
pub const MAX_PRESSURE_SAMPLES: usize = 10;

/// The window is stable when `max - min` stays strictly below this value.
pub const PRESSURE_STABILITY_THRESHOLD_MMH2O: i16 = 15;

/// Plateau accumulation may only be armed within the last 5% of the inhalation budget.
pub const PLATEAU_ARMING_WINDOW_PERCENT: u32 = 95;

/// Reported plateau when no plateau could be measured during the cycle.
pub const PLATEAU_UNKNOWN: i16 = i16::MIN;

// ########################## PEAK / BLOWER CALIBRATION ############################
/// Plateau errors below this share of the plateau command are not corrected.
pub const PEAK_CALIBRATION_DEADBAND_PERCENT: i32 = 5;
/// Plateau errors above this share get the coarse correction.
pub const PEAK_CALIBRATION_COARSE_PERCENT: i32 = 20;
pub const PEAK_CALIBRATION_FINE_STEP_MMH2O: i16 = 10;
pub const PEAK_CALIBRATION_COARSE_STEP_MMH2O: i16 = 30;

/// Blower increments by plateau start time, in percent of the inhalation budget.
/// The first tier whose bound is above the start time wins.
pub const BLOWER_INCREMENT_TIERS: [(u32, i16); 4] = [(30, -100), (45, -25), (60, 0), (75, 25)];
/// Increment when the plateau starts after the last tier (including the timeout).
pub const BLOWER_INCREMENT_LATE: i16 = 100;
/// Increment magnitude when no plateau was measured during the cycle.
pub const BLOWER_INCREMENT_NO_PLATEAU: i16 = 150;

// ############################### ACTUATORS #######################################
/// Servo position of a fully open pinch valve.
pub const VALVE_OPEN_STATE: u16 = 0;
/// Servo position of a fully closed pinch valve.
pub const VALVE_CLOSED_STATE: u16 = 125;

pub const BLOWER_SPEED_MIN: u16 = 300;
pub const BLOWER_SPEED_MAX: u16 = 1800;
pub const BLOWER_SPEED_DEFAULT: u16 = 900;

// ################################# ALARMS ########################################
pub const ALARM_THRESHOLD_PLATEAU_DIFFERENCE_PERCENT: i32 = 20;
pub const ALARM_THRESHOLD_MIN_PRESSURE_MMH2O: i16 = 20;
pub const ALARM_THRESHOLD_PEEP_DIFFERENCE_MMH2O: i16 = 20;
pub const ALARM_THRESHOLD_MAX_PRESSURE_MMH2O: i16 = 800;

/// Duration of an operator mute.
pub const SNOOZE_DURATION_MS: u32 = 120_000;
/// The alarm line on the display is refreshed every N ticks.
pub const ALARM_DISPLAY_REFRESH_TICKS: u16 = 50;
/// Half period of the blinking alarm LEDs.
pub const ALARM_LED_BLINK_HALF_PERIOD_MS: u32 = 500;

// ############################## SUPPLY MONITOR ###################################
pub const MAINS_CONNECTED_MIN_MV: i32 = 27_000;
pub const BATTERY_LOW_MV: i32 = 24_600;
pub const BATTERY_VERY_LOW_MV: i32 = 24_000;

/// Largest magnitude accepted for the PID integral window (milli-permille).
pub const PID_INTEGRAL_LIMIT: i32 = 1_000_000_000;
/// Largest magnitude accepted for the PID command window (permille).
pub const PID_COMMAND_LIMIT: i32 = 1_000_000;

/// Gains and windows of one PID loop.
///
/// Gains are fixed point x1000. The integral is accumulated in milli-permille of valve travel
/// and the command is produced in permille, later mapped onto the servo range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub kp: i32,
    pub ki: i32,
    pub kd: i32,
    pub integral_min: i32,
    pub integral_max: i32,
    pub command_min: i32,
    pub command_max: i32,
}

impl PidGains {
    /// Inspiratory (blower side) loop: positive command opens the valve.
    pub const BLOWER: PidGains = PidGains {
        kp: 2500,
        ki: 10_000,
        kd: 10,
        integral_min: -1_000_000,
        integral_max: 1_000_000,
        command_min: 0,
        command_max: 1000,
    };

    /// Expiratory (patient side) loop: negative command opens the valve.
    ///
    /// The narrow integral window lets the valve close quickly once the pressure reaches PEEP.
    pub const PATIENT: PidGains = PidGains {
        kp: 2500,
        ki: 10_000,
        kd: 10,
        integral_min: -50_000,
        integral_max: 50_000,
        command_min: -1000,
        command_max: 0,
    };

    fn is_valid(&self) -> bool {
        let integral = -PID_INTEGRAL_LIMIT..=PID_INTEGRAL_LIMIT;
        let command = -PID_COMMAND_LIMIT..=PID_COMMAND_LIMIT;
        self.integral_min < self.integral_max
            && self.command_min < self.command_max
            && integral.contains(&self.integral_min)
            && integral.contains(&self.integral_max)
            && command.contains(&self.command_min)
            && command.contains(&self.command_max)
    }
}

/// Loop identifier used in configuration errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PidLoop {
    Blower,
    Patient,
}

/// Reasons a configuration is rejected at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Integral or command window is empty, inverted or too wide.
    PidWindow(PidLoop),
    /// The safety PEEP offset must not lower the expiratory target.
    NegativeSafetyOffset,
    /// The peak command step must be positive and fit the peak range.
    PeakStep,
    /// Blower speed range is empty or the default lies outside of it.
    BlowerRange,
    /// One of the initial operator commands lies outside its range.
    InitialCommands,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PidWindow(PidLoop::Blower) => f.write_str("invalid blower PID window"),
            ConfigError::PidWindow(PidLoop::Patient) => f.write_str("invalid patient PID window"),
            ConfigError::NegativeSafetyOffset => f.write_str("negative safety PEEP offset"),
            ConfigError::PeakStep => f.write_str("peak command step out of range"),
            ConfigError::BlowerRange => f.write_str("invalid blower speed range"),
            ConfigError::InitialCommands => f.write_str("initial commands out of range"),
        }
    }
}

/// Runtime configuration of the pressure controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VentilatorConfig {
    pub blower_pid: PidGains,
    pub patient_pid: PidGains,
    /// Added to the PEEP command for the expiratory loop only.
    pub patient_safety_peep_offset: i16,
    /// Step of the operator peak command.
    pub peak_step: i16,
    /// Commands in effect at boot.
    pub initial_commands: CommandSet,
    pub blower_speed_min: u16,
    pub blower_speed_max: u16,
    pub blower_speed_default: u16,
}

impl VentilatorConfig {
    pub const fn new() -> Self {
        Self {
            blower_pid: PidGains::BLOWER,
            patient_pid: PidGains::PATIENT,
            patient_safety_peep_offset: 5,
            peak_step: PEAK_STEP_DEFAULT_MMH2O,
            initial_commands: CommandSet::DEFAULT,
            blower_speed_min: BLOWER_SPEED_MIN,
            blower_speed_max: BLOWER_SPEED_MAX,
            blower_speed_default: BLOWER_SPEED_DEFAULT,
        }
    }

    /// Checks every field against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.blower_pid.is_valid() {
            return Err(ConfigError::PidWindow(PidLoop::Blower));
        }
        if !self.patient_pid.is_valid() {
            return Err(ConfigError::PidWindow(PidLoop::Patient));
        }
        if self.patient_safety_peep_offset < 0 {
            return Err(ConfigError::NegativeSafetyOffset);
        }
        if !(1..=PEAK_MAX_MMH2O - PEAK_MIN_MMH2O).contains(&self.peak_step) {
            return Err(ConfigError::PeakStep);
        }
        if self.blower_speed_min >= self.blower_speed_max
            || !(self.blower_speed_min..=self.blower_speed_max).contains(&self.blower_speed_default)
        {
            return Err(ConfigError::BlowerRange);
        }
        if !self.initial_commands.is_within_bounds() {
            return Err(ConfigError::InitialCommands);
        }
        Ok(())
    }
}

impl Default for VentilatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(VentilatorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_pid_window() {
        let mut config = VentilatorConfig::default();
        config.patient_pid.command_min = 10;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PidWindow(PidLoop::Patient))
        );
    }

    #[test]
    fn rejects_peak_step_wider_than_peak_range() {
        let mut config = VentilatorConfig::default();
        config.peak_step = i16::MAX;
        assert_eq!(config.validate(), Err(ConfigError::PeakStep));
        config.peak_step = PEAK_MAX_MMH2O - PEAK_MIN_MMH2O;
        assert_eq!(config.validate(), Ok(()));
        config.peak_step = 0;
        assert_eq!(config.validate(), Err(ConfigError::PeakStep));
    }

    #[test]
    fn rejects_unbounded_pid_windows() {
        let mut config = VentilatorConfig::default();
        config.blower_pid.command_min = i32::MIN;
        config.blower_pid.command_max = i32::MAX;
        assert_eq!(config.validate(), Err(ConfigError::PidWindow(PidLoop::Blower)));

        let mut config = VentilatorConfig::default();
        config.patient_pid.integral_max = PID_INTEGRAL_LIMIT + 1;
        assert_eq!(config.validate(), Err(ConfigError::PidWindow(PidLoop::Patient)));
    }

    #[test]
    fn rejects_default_speed_outside_blower_range() {
        let mut config = VentilatorConfig::default();
        config.blower_speed_default = BLOWER_SPEED_MAX + 1;
        assert_eq!(config.validate(), Err(ConfigError::BlowerRange));
    }

    #[test]
    fn rejects_plateau_above_peak() {
        let mut config = VentilatorConfig::default();
        config.initial_commands.max_plateau = 350;
        config.initial_commands.max_peak = 300;
        assert_eq!(config.validate(), Err(ConfigError::InitialCommands));
    }
}

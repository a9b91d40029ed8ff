#![cfg_attr(not(test), no_std)]

// Respiratory control core of the emergency ventilator.
//
// Key Features:
// - Breathing cycle state machine driven by a 100 Hz centisecond tick
// - Dual PID pressure control (blower side during inhalation, patient side during exhalation)
// - Plateau detection with cycle-to-cycle peak command and blower speed calibration
// - Debounced, priority ranked alarm engine with buzzer/LED sequencing and snooze
// - Pressure and supply front-ends turning raw ADC samples into mmH2O / millivolts
//
// Every tick operation is total: out-of-range values are clamped, failures are reported
// through the alarm engine. Nothing in this crate allocates.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

// Must stay first: the logging macros are textually scoped
mod fmt;

pub mod config;
pub mod math_integer;

pub mod actuators;
pub mod alarms;
pub mod commands;
pub mod cycle;
pub mod plateau;
pub mod sensors;

pub mod pressure_controller;

pub use actuators::{Blower, BlowerDriver, Valve, ValveDriver};
pub use alarms::{
    AlarmCode, AlarmController, AlarmEffects, AlarmEvent, AlarmPriority, LedState, Tone,
};
pub use commands::CommandSet;
pub use config::{ConfigError, VentilatorConfig};
pub use cycle::{CyclePhase, CycleSubPhase};
pub use pressure_controller::{ControllerSnapshot, PressureController};

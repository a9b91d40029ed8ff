#![no_std]

// STM32G4 drivers of the emergency ventilator.
//
// Key Features:
// - Pin map of the control board
// - Servo PWM bank driving both pinch valves and the blower ESC
// - Alarm panel: piezo buzzer and LEDs, alarm line logged over defmt
// - Pressure sensor and supply voltage ADC reads
// - Operator buttons with edge detection
// - 100 Hz control tick timer

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod alarm_panel;
pub mod analog;
pub mod buttons;
pub mod buzzer;
pub mod control_timer;
pub mod pinout;
pub mod servo;

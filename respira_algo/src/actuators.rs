// Implements the actuator staging layer of the ventilator: two pinch valves and the blower.
//
// Key Features:
// - Commands are staged during `compute` and only written to hardware by `execute`
// - Valve positions are servo positions between an open and a closed state, clamped
// - Blower speed is clamped to its configured range; stopping is an explicit state
// - Hardware access goes through the `ValveDriver` / `BlowerDriver` capabilities

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_integer::normalization::AffineMap;

/// Capability of a physical valve (servo PWM, test double, ...).
pub trait ValveDriver {
    /// Moves the valve to the given servo position.
    fn set_position(&mut self, position: u16);
}

/// Capability of the physical blower (ESC, test double, ...).
pub trait BlowerDriver {
    /// Spins the blower at the given speed.
    fn run(&mut self, speed: u16);
    /// Stops the blower.
    fn stop(&mut self);
}

/// Staged command and last executed position of one pinch valve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Valve {
    open_state: u16,
    closed_state: u16,
    command: u16,
    position: u16,
}

impl Valve {
    /// Creates a valve that starts closed.
    pub const fn new(open_state: u16, closed_state: u16) -> Self {
        Self {
            open_state,
            closed_state,
            command: closed_state,
            position: closed_state,
        }
    }

    /// Mapping of a PID command window onto the valve travel.
    ///
    /// # Arguments
    /// * `closed_at` - PID command that fully closes the valve
    /// * `open_at` - PID command that fully opens the valve
    pub const fn aperture_map(&self, closed_at: i32, open_at: i32) -> AffineMap {
        AffineMap::new(
            closed_at,
            open_at,
            self.closed_state as i32,
            self.open_state as i32,
        )
    }

    /// Stages a servo position, clamped between the open and closed states.
    pub fn set_command(&mut self, position: u16) {
        let (lo, hi) = if self.open_state < self.closed_state {
            (self.open_state, self.closed_state)
        } else {
            (self.closed_state, self.open_state)
        };
        self.command = position.clamp(lo, hi);
    }

    /// Stages a PID command through the aperture map.
    pub fn set_aperture(&mut self, map: &AffineMap, pid_command: i32) {
        let position = map.apply(pid_command).clamp(0, u16::MAX as i32) as u16;
        self.set_command(position);
    }

    #[inline]
    pub fn close(&mut self) {
        self.command = self.closed_state;
    }

    #[inline]
    pub fn open_fully(&mut self) {
        self.command = self.open_state;
    }

    /// Writes the staged command to the hardware.
    pub fn execute<D: ValveDriver>(&mut self, driver: &mut D) {
        driver.set_position(self.command);
        self.position = self.command;
    }

    /// Staged servo position
    #[inline]
    pub fn command(&self) -> u16 {
        self.command
    }

    /// Servo position written by the last `execute`
    #[inline]
    pub fn position(&self) -> u16 {
        self.position
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.command == self.closed_state
    }
}

/// Staged speed of the blower.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Blower {
    min_speed: u16,
    max_speed: u16,
    speed: u16,
    running: bool,
}

impl Blower {
    /// Creates a stopped blower whose speed is kept in `[min_speed, max_speed]`.
    pub const fn new(min_speed: u16, max_speed: u16) -> Self {
        Self {
            min_speed,
            max_speed,
            speed: 0,
            running: false,
        }
    }

    /// Stages a running blower at the clamped speed.
    pub fn run_speed(&mut self, speed: u16) {
        self.speed = speed.clamp(self.min_speed, self.max_speed);
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.speed = 0;
        self.running = false;
    }

    pub fn execute<D: BlowerDriver>(&mut self, driver: &mut D) {
        if self.running {
            driver.run(self.speed);
        } else {
            driver.stop();
        }
    }

    #[inline]
    pub fn speed(&self) -> u16 {
        self.speed
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }
}

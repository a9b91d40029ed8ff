// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::config::PidGains;

/// A Proportional-Integral-Derivative (PID) controller implementation
/// to calculate the aperture command of one valve from a pressure error.
///
/// **Note**
/// - Based on integer implementation, pressures are i16 in mmH2O
/// - Works with variable dt, supplied in microseconds every tick
/// - Has integral anti-windup by clamping
/// - The derivative term is skipped on the first sample after a reset
pub struct PID {
    /// Proportional gain, fixed point x1000.
    kp: i32,

    /// Integral gain, fixed point x1000, per second.
    ki: i32,

    /// Derivative gain, fixed point x1000, in seconds.
    kd: i32,

    /// Anti-windup window of the integral accumulator (milli-permille)
    integral_min: i32,
    integral_max: i32,

    /// Output window (permille)
    command_min: i32,
    command_max: i32,

    /// Accumulator for the integral term (milli-permille)
    integral: i32,
    /// Error of the previous sample, `None` right after a reset
    previous_error: Option<i32>,
}

impl PID {
    /// Constructor for the PID controller
    ///
    /// # Arguments
    /// * `gains` - Gains, integral window and output window of the loop
    ///
    /// # Returns
    /// A new instance of the PID controller with an empty history.
    pub const fn new(gains: PidGains) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            integral_min: gains.integral_min,
            integral_max: gains.integral_max,
            command_min: gains.command_min,
            command_max: gains.command_max,
            integral: 0,
            previous_error: None,
        }
    }

    /// Forget the integral and derivative history
    pub fn reset(&mut self) {
        self.integral = 0;
        self.previous_error = None;
    }

    /// Update the PID controller calculations
    ///
    /// # Arguments
    /// * `target` - The pressure the loop regulates to
    /// * `measured` - The last filtered pressure
    /// * `dt_us` - Time elapsed since the previous sample, in microseconds
    ///
    /// # Returns
    /// The command in permille, clamped to the output window.
    pub fn tick(&mut self, target: i16, measured: i16, dt_us: i32) -> i32 {
        let error = target as i32 - measured as i32;
        // A non positive dt freezes the time based terms
        let dt = dt_us.max(0) as i64;

        // ######################## PROPORTIONAL TERM #################################
        let p = self.kp as i64 * error as i64;

        // ########################## INTEGRAL TERM ###################################
        let increment = (self.ki as i64 * error as i64).saturating_mul(dt) / 1_000_000;
        self.integral = (self.integral as i64)
            .saturating_add(increment)
            .clamp(self.integral_min as i64, self.integral_max as i64) as i32;

        // ######################### DERIVATIVE TERM ##################################
        let derivative = match self.previous_error {
            Some(previous) if dt > 0 => ((error - previous) as i64 * 1_000_000) / dt,
            _ => 0,
        };
        let d = (self.kd as i64).saturating_mul(derivative);

        // Update previous error for the next calculation
        self.previous_error = Some(error);

        // ############################## OUTPUT ######################################
        let output = p.saturating_add(self.integral as i64).saturating_add(d) / 1000;
        output.clamp(self.command_min as i64, self.command_max as i64) as i32
    }

    /// Current integral accumulator, in milli-permille
    #[cfg(test)]
    fn integral(&self) -> i32 {
        self.integral
    }

    /// Returns true until the first sample after a reset has been processed
    #[cfg(test)]
    fn is_fresh(&self) -> bool {
        self.previous_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAINS: PidGains = PidGains {
        kp: 1000,
        ki: 1000,
        kd: 1000,
        integral_min: -50_000,
        integral_max: 50_000,
        command_min: -1000,
        command_max: 1000,
    };

    #[test]
    fn first_sample_has_no_derivative_kick() {
        let mut pid = PID::new(PidGains { ki: 0, ..GAINS });
        // Only the proportional part: 1.0 * 100
        assert_eq!(pid.tick(100, 0, 10_000), 100);
        assert!(!pid.is_fresh());
    }

    #[test]
    fn derivative_after_first_sample() {
        let mut pid = PID::new(PidGains { ki: 0, kd: 10, ..GAINS });
        pid.tick(100, 0, 10_000);
        // Error drops by 10 in 10ms: derivative -1000/s, kd 0.01s removes 10
        assert_eq!(pid.tick(100, 10, 10_000), 80);
    }

    #[test]
    fn zero_dt_disables_time_terms() {
        let mut pid = PID::new(GAINS);
        pid.tick(100, 0, 10_000);
        let integral = pid.integral();
        assert_eq!(pid.tick(100, 50, 0), 50 + integral / 1000);
        assert_eq!(pid.integral(), integral);
    }

    #[test]
    fn integral_is_clamped() {
        let mut pid = PID::new(GAINS);
        for _ in 0..10_000 {
            pid.tick(500, 0, 10_000);
        }
        assert_eq!(pid.integral(), 50_000);
        for _ in 0..10_000 {
            pid.tick(0, 500, 10_000);
        }
        assert_eq!(pid.integral(), -50_000);
    }

    #[test]
    fn output_is_clamped() {
        let mut pid = PID::new(GAINS);
        assert_eq!(pid.tick(i16::MAX, i16::MIN, 10_000), 1000);
        pid.reset();
        assert_eq!(pid.tick(i16::MIN, i16::MAX, 10_000), -1000);
    }

    #[test]
    fn extreme_gains_saturate() {
        let mut pid = PID::new(PidGains {
            kp: i32::MAX,
            ki: i32::MAX,
            kd: i32::MAX,
            integral_min: i32::MIN,
            integral_max: i32::MAX,
            ..GAINS
        });
        assert_eq!(pid.tick(i16::MAX, i16::MIN, i32::MAX), 1000);
        assert_eq!(pid.integral(), i32::MAX);
        assert_eq!(pid.tick(i16::MIN, i16::MAX, 1), -1000);
    }

    #[test]
    fn reset_restores_sentinel() {
        let mut pid = PID::new(GAINS);
        pid.tick(10, 0, 10_000);
        pid.reset();
        assert!(pid.is_fresh());
        assert_eq!(pid.integral(), 0);
    }
}

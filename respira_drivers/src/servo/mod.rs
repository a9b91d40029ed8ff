// Implements the servo PWM bank of the ventilator (TIM3 at 50 Hz).
//
// Key Features:
// - CH1/CH2 drive the inspiratory and expiratory pinch valve servos
// - CH3 drives the blower ESC with the same 1000..2000 us pulse protocol
// - `ValveServo` and `BlowerEsc` only stage a pulse width; `ServoBank::apply` writes them

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::{
    clocks::Clocks,
    pac::TIM3,
    timer::{
        Alignment, CaptureCompareDma, CountDir, OutputCompare, TimChannel, Timer, TimerConfig,
        UpdateReqSrc,
    },
};

use respira_algo::config::{BLOWER_SPEED_MAX, VALVE_CLOSED_STATE};
use respira_algo::{BlowerDriver, ValveDriver};

use super::pinout;

pub const SERVO_FREQ_HZ: u16 = 50;
const SERVO_PERIOD_US: u32 = 20_000;

pub const PULSE_MIN_US: u16 = 1000;
pub const PULSE_MAX_US: u16 = 2000;

/// Servo travel covered by the pulse range, in degrees.
pub const SERVO_TRAVEL_DEG: u16 = 180;

/// Pinch valve servo. Positions are degrees.
pub struct ValveServo {
    pulse_us: u16,
}

impl ValveServo {
    /// Starts on the closed position so the first frame never opens a valve.
    pub const fn new() -> Self {
        ValveServo {
            pulse_us: Self::position_to_pulse(VALVE_CLOSED_STATE),
        }
    }

    pub const fn position_to_pulse(position: u16) -> u16 {
        let deg = if position > SERVO_TRAVEL_DEG {
            SERVO_TRAVEL_DEG
        } else {
            position
        };
        let span = (PULSE_MAX_US - PULSE_MIN_US) as u32;
        PULSE_MIN_US + (deg as u32 * span / SERVO_TRAVEL_DEG as u32) as u16
    }

    pub fn pulse_us(&self) -> u16 {
        self.pulse_us
    }
}

impl ValveDriver for ValveServo {
    fn set_position(&mut self, position: u16) {
        self.pulse_us = Self::position_to_pulse(position);
    }
}

/// Blower ESC. The minimum pulse keeps the ESC armed with the motor stopped.
pub struct BlowerEsc {
    pulse_us: u16,
}

impl BlowerEsc {
    pub const fn new() -> Self {
        BlowerEsc {
            pulse_us: PULSE_MIN_US,
        }
    }

    pub const fn speed_to_pulse(speed: u16) -> u16 {
        let speed = if speed > BLOWER_SPEED_MAX {
            BLOWER_SPEED_MAX
        } else {
            speed
        };
        let span = (PULSE_MAX_US - PULSE_MIN_US) as u32;
        PULSE_MIN_US + (speed as u32 * span / BLOWER_SPEED_MAX as u32) as u16
    }

    pub fn pulse_us(&self) -> u16 {
        self.pulse_us
    }
}

impl BlowerDriver for BlowerEsc {
    fn run(&mut self, speed: u16) {
        self.pulse_us = Self::speed_to_pulse(speed);
    }

    fn stop(&mut self) {
        self.pulse_us = PULSE_MIN_US;
    }
}

pub struct ServoBank {
    tim: Timer<TIM3>,
}

impl ServoBank {
    pub fn new(tim3: TIM3, clock_cfg: &Clocks) -> Self {
        let mut timer = Timer::new_tim3(
            tim3,
            SERVO_FREQ_HZ as f32,
            TimerConfig {
                one_pulse_mode: false,
                update_request_source: UpdateReqSrc::Any,
                auto_reload_preload: true,
                alignment: Alignment::Edge,
                capture_compare_dma: CaptureCompareDma::Update,
                direction: CountDir::Up,
            },
            clock_cfg,
        );
        timer.enable();

        ServoBank { tim: timer }
    }

    pub fn begin(&mut self) {
        // Outputs stay low until the first `apply`
        self.tim
            .enable_pwm_output(TimChannel::C1, OutputCompare::Pwm1, 0.0);
        self.tim
            .enable_pwm_output(TimChannel::C2, OutputCompare::Pwm1, 0.0);
        self.tim
            .enable_pwm_output(TimChannel::C3, OutputCompare::Pwm1, 0.0);

        pinout::actuators::VALVE_INSPIRATORY.init();
        pinout::actuators::VALVE_EXPIRATORY.init();
        pinout::actuators::BLOWER_ESC.init();
    }

    pub fn apply(&mut self, inspiratory: &ValveServo, expiratory: &ValveServo, blower: &BlowerEsc) {
        let period = self.tim.get_max_duty();
        self.tim
            .set_duty(TimChannel::C1, Self::pulse2duty(inspiratory.pulse_us(), period));
        self.tim
            .set_duty(TimChannel::C2, Self::pulse2duty(expiratory.pulse_us(), period));
        self.tim
            .set_duty(TimChannel::C3, Self::pulse2duty(blower.pulse_us(), period));
    }

    fn pulse2duty(pulse_us: u16, period: u32) -> u32 {
        (pulse_us as u64 * period as u64 / SERVO_PERIOD_US as u64) as u32
    }
}

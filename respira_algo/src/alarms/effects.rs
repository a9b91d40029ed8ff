// Implements the audible and visual alarm effects.
//
// Key Features:
// - `BuzzerSequencer`: explicit state machine walking static (tone, duration) tables
// - One pattern per alarm priority (repeating) and a one-shot boot beep
// - LED policy per priority: blinking red, blinking yellow, steady yellow
// - Hardware stays behind the `AlarmEffects` capability

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::{AlarmCode, AlarmPriority};
use crate::config::ALARM_LED_BLINK_HALF_PERIOD_MS;

/// Buzzer output level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tone {
    Off,
    Low,
    High,
}

/// Alarm LED output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedState {
    Off,
    Red,
    Yellow,
}

/// Outputs driven by the alarm controller.
pub trait AlarmEffects {
    fn set_buzzer(&mut self, tone: Tone);
    fn set_leds(&mut self, leds: LedState);
    /// Triggered alarms, lowest code first, empty slots last.
    fn display_alarms(&mut self, alarms: &[Option<AlarmCode>]);
}

type Step = (Tone, u32);

const HIGH_PRIORITY_STEPS: [Step; 10] = [
    (Tone::High, 150),
    (Tone::Low, 150),
    (Tone::High, 150),
    (Tone::Off, 150),
    (Tone::High, 150),
    (Tone::Low, 150),
    (Tone::High, 150),
    (Tone::Low, 150),
    (Tone::High, 150),
    (Tone::Off, 2500),
];

const MEDIUM_PRIORITY_STEPS: [Step; 6] = [
    (Tone::Low, 200),
    (Tone::Off, 150),
    (Tone::Low, 200),
    (Tone::Off, 150),
    (Tone::Low, 200),
    (Tone::Off, 6000),
];

const LOW_PRIORITY_STEPS: [Step; 4] = [
    (Tone::Low, 200),
    (Tone::Off, 150),
    (Tone::Low, 200),
    (Tone::Off, 15_000),
];

const BOOT_STEPS: [Step; 3] = [(Tone::High, 100), (Tone::Off, 100), (Tone::High, 300)];

/// Buzzer patterns known to the sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BuzzerPattern {
    HighPriority,
    MediumPriority,
    LowPriority,
    Boot,
}

impl BuzzerPattern {
    /// Pattern announcing an alarm priority, `None` for silence.
    pub const fn for_priority(priority: AlarmPriority) -> Option<BuzzerPattern> {
        match priority {
            AlarmPriority::High => Some(BuzzerPattern::HighPriority),
            AlarmPriority::Medium => Some(BuzzerPattern::MediumPriority),
            AlarmPriority::Low => Some(BuzzerPattern::LowPriority),
            AlarmPriority::None => None,
        }
    }

    const fn steps(self) -> &'static [Step] {
        match self {
            BuzzerPattern::HighPriority => &HIGH_PRIORITY_STEPS,
            BuzzerPattern::MediumPriority => &MEDIUM_PRIORITY_STEPS,
            BuzzerPattern::LowPriority => &LOW_PRIORITY_STEPS,
            BuzzerPattern::Boot => &BOOT_STEPS,
        }
    }

    const fn repeats(self) -> bool {
        !matches!(self, BuzzerPattern::Boot)
    }
}

/// Walks a buzzer pattern step by step.
pub struct BuzzerSequencer {
    pattern: Option<BuzzerPattern>,
    index: usize,
    remaining_ms: u32,
    repeat: bool,
}

impl BuzzerSequencer {
    pub const fn new() -> Self {
        Self {
            pattern: None,
            index: 0,
            remaining_ms: 0,
            repeat: false,
        }
    }

    /// Restarts from the first step of `pattern`.
    pub fn start(&mut self, pattern: BuzzerPattern) {
        self.pattern = Some(pattern);
        self.index = 0;
        self.remaining_ms = pattern.steps()[0].1;
        self.repeat = pattern.repeats();
    }

    pub fn stop(&mut self) {
        self.pattern = None;
        self.index = 0;
        self.remaining_ms = 0;
    }

    /// Pattern being played, `None` once a one-shot pattern is over.
    #[inline]
    pub fn pattern(&self) -> Option<BuzzerPattern> {
        self.pattern
    }

    /// Advances the pattern by `elapsed_ms` and returns the tone to play.
    pub fn tick(&mut self, elapsed_ms: u32) -> Tone {
        let Some(pattern) = self.pattern else {
            return Tone::Off;
        };
        let steps = pattern.steps();
        let mut elapsed = elapsed_ms;

        while elapsed >= self.remaining_ms {
            elapsed -= self.remaining_ms;
            self.index += 1;
            if self.index >= steps.len() {
                if !self.repeat {
                    self.stop();
                    return Tone::Off;
                }
                self.index = 0;
            }
            self.remaining_ms = steps[self.index].1;
        }
        self.remaining_ms -= elapsed;
        steps[self.index].0
    }
}

impl Default for BuzzerSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// LED output for the highest active priority at time `now_ms`.
pub fn led_state(priority: AlarmPriority, now_ms: u32) -> LedState {
    let blink_on = (now_ms / ALARM_LED_BLINK_HALF_PERIOD_MS) % 2 == 0;
    match priority {
        AlarmPriority::High if blink_on => LedState::Red,
        AlarmPriority::Medium if blink_on => LedState::Yellow,
        AlarmPriority::Low => LedState::Yellow,
        _ => LedState::Off,
    }
}

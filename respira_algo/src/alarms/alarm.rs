// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::{AlarmCode, AlarmPriority};

/// One debounced alarm condition.
///
/// The alarm is triggered once it has been detected during `threshold` distinct cycles in a
/// row. A single "not detected" report resets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    priority: AlarmPriority,
    code: AlarmCode,
    threshold: u8,
    counter: u8,
    last_detected_cycle: Option<u32>,
}

impl Alarm {
    pub const fn new(priority: AlarmPriority, code: AlarmCode, threshold: u8) -> Self {
        Self {
            priority,
            code,
            threshold,
            counter: 0,
            last_detected_cycle: None,
        }
    }

    #[inline]
    pub fn priority(&self) -> AlarmPriority {
        self.priority
    }

    #[inline]
    pub fn code(&self) -> AlarmCode {
        self.code
    }

    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    #[inline]
    pub fn counter(&self) -> u8 {
        self.counter
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.counter >= self.threshold
    }

    /// Reports the condition during `cycle`. A second report for the same cycle is ignored.
    pub fn detected(&mut self, cycle: u32) {
        if self.last_detected_cycle == Some(cycle) {
            return;
        }
        self.last_detected_cycle = Some(cycle);
        if self.counter < self.threshold {
            self.counter += 1;
        }
    }

    /// Reports the condition is gone.
    pub fn not_detected(&mut self) {
        self.counter = 0;
        self.last_detected_cycle = None;
    }
}

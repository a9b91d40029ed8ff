// Phases of the breathing cycle and the timing budget derived from the respiratory rate.
//
// One cycle lasts `6000 / cycles_per_minute` centiseconds; the first third is the inhalation
// (inspiration, then hold), the rest is the exhalation.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::config::{
    CENTISEC_PER_MINUTE, CYCLES_PER_MINUTE_MAX, CYCLES_PER_MINUTE_MIN,
    HOLD_INSPIRATION_TIME_PERCENT, PLATEAU_ARMING_WINDOW_PERCENT,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CyclePhase {
    Inhalation,
    Exhalation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleSubPhase {
    /// Pressure rises towards the peak command
    Inspiration,
    /// Pressure is held at the plateau command
    HoldInspiration,
    /// Pressure falls towards the PEEP command
    Exhale,
}

impl CycleSubPhase {
    /// Phase this sub-phase belongs to.
    pub const fn phase(self) -> CyclePhase {
        match self {
            CycleSubPhase::Inspiration | CycleSubPhase::HoldInspiration => CyclePhase::Inhalation,
            CycleSubPhase::Exhale => CyclePhase::Exhalation,
        }
    }
}

/// Durations of one breathing cycle, in centiseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleTiming {
    centi_sec_per_cycle: u16,
    centi_sec_per_inhalation: u16,
}

impl CycleTiming {
    pub fn from_rate(cycles_per_minute: u16) -> Self {
        let rate = cycles_per_minute.clamp(CYCLES_PER_MINUTE_MIN, CYCLES_PER_MINUTE_MAX);
        let centi_sec_per_cycle = CENTISEC_PER_MINUTE / rate;
        Self {
            centi_sec_per_cycle,
            centi_sec_per_inhalation: centi_sec_per_cycle / 3,
        }
    }

    #[inline]
    pub fn centi_sec_per_cycle(&self) -> u16 {
        self.centi_sec_per_cycle
    }

    #[inline]
    pub fn centi_sec_per_inhalation(&self) -> u16 {
        self.centi_sec_per_inhalation
    }

    /// Tick from which the hold phase is entered whatever the pressure.
    pub fn hold_start_tick(&self) -> u16 {
        self.percent_to_tick(HOLD_INSPIRATION_TIME_PERCENT)
    }

    /// First tick at which plateau accumulation may be armed.
    pub fn plateau_arming_tick(&self) -> u16 {
        self.percent_to_tick(PLATEAU_ARMING_WINDOW_PERCENT)
    }

    #[inline]
    pub fn is_inhalation(&self, tick: u16) -> bool {
        tick < self.centi_sec_per_inhalation
    }

    /// Position of `tick` in the inhalation budget, in percent (may exceed 100).
    pub fn percent_of_inhalation(&self, tick: u16) -> u32 {
        if self.centi_sec_per_inhalation == 0 {
            return 100;
        }
        tick as u32 * 100 / self.centi_sec_per_inhalation as u32
    }

    fn percent_to_tick(&self, percent: u32) -> u16 {
        (self.centi_sec_per_inhalation as u32 * percent / 100) as u16
    }
}

// Operator commands of the ventilator.
//
// Key Features:
// - Four commands: respiratory rate, minimal PEEP, maximal plateau and maximal peak pressure
// - Every increment/decrement is clamped to the documented range, never rejected
// - Plateau command never exceeds the peak command, peak never falls below the plateau
// - Changes are staged as pending values and applied only at the next cycle start
// - The peak command is also moved by the cycle-to-cycle calibration; a pending operator
//   change of the peak always wins over the calibrated value

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::config::{
    CYCLES_PER_MINUTE_DEFAULT, CYCLES_PER_MINUTE_MAX, CYCLES_PER_MINUTE_MIN, PEAK_DEFAULT_MMH2O,
    PEAK_MAX_MMH2O, PEAK_MIN_MMH2O, PEEP_DEFAULT_MMH2O, PEEP_MAX_MMH2O, PEEP_MIN_MMH2O,
    PEEP_STEP_MMH2O, PLATEAU_DEFAULT_MMH2O, PLATEAU_MAX_MMH2O, PLATEAU_MIN_MMH2O,
    PLATEAU_STEP_MMH2O,
};

/// One complete set of operator commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandSet {
    pub cycles_per_minute: u16,
    pub min_peep: i16,
    pub max_plateau: i16,
    pub max_peak: i16,
}

impl CommandSet {
    pub const DEFAULT: CommandSet = CommandSet {
        cycles_per_minute: CYCLES_PER_MINUTE_DEFAULT,
        min_peep: PEEP_DEFAULT_MMH2O,
        max_plateau: PLATEAU_DEFAULT_MMH2O,
        max_peak: PEAK_DEFAULT_MMH2O,
    };

    /// Returns true if every command lies in its range and plateau <= peak.
    pub fn is_within_bounds(&self) -> bool {
        (CYCLES_PER_MINUTE_MIN..=CYCLES_PER_MINUTE_MAX).contains(&self.cycles_per_minute)
            && (PEEP_MIN_MMH2O..=PEEP_MAX_MMH2O).contains(&self.min_peep)
            && (PLATEAU_MIN_MMH2O..=PLATEAU_MAX_MMH2O).contains(&self.max_plateau)
            && (PEAK_MIN_MMH2O..=PEAK_MAX_MMH2O).contains(&self.max_peak)
            && self.max_plateau <= self.max_peak
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bit masks of the commands touched by the operator since the last cycle start.
#[repr(u8)]
enum FieldBit {
    Rate = 1 << 0,
    Peep = 1 << 1,
    Plateau = 1 << 2,
    Peak = 1 << 3,
}

/// Active and pending operator commands.
pub struct OperatorCommands {
    /// Commands used by the running cycle
    active: CommandSet,
    /// Commands that will be used from the next cycle on
    next: CommandSet,
    /// Fields of `next` changed by the operator
    dirty: u8,
    /// Step of the peak command
    peak_step: i16,
}

impl OperatorCommands {
    pub fn new(initial: CommandSet, peak_step: i16) -> Self {
        Self {
            active: initial,
            next: initial,
            dirty: 0,
            peak_step,
        }
    }

    /// Commands of the running cycle.
    #[inline]
    pub fn active(&self) -> &CommandSet {
        &self.active
    }

    /// Commands that will be applied at the next cycle start.
    #[inline]
    pub fn next(&self) -> &CommandSet {
        &self.next
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.dirty != 0
    }

    pub fn increment_cycles_per_minute(&mut self) {
        self.next.cycles_per_minute = self
            .next
            .cycles_per_minute
            .saturating_add(1)
            .min(CYCLES_PER_MINUTE_MAX);
        self.mark(FieldBit::Rate);
    }

    pub fn decrement_cycles_per_minute(&mut self) {
        self.next.cycles_per_minute = self
            .next
            .cycles_per_minute
            .saturating_sub(1)
            .max(CYCLES_PER_MINUTE_MIN);
        self.mark(FieldBit::Rate);
    }

    pub fn increment_min_peep(&mut self) {
        self.next.min_peep = self
            .next
            .min_peep
            .saturating_add(PEEP_STEP_MMH2O)
            .min(PEEP_MAX_MMH2O);
        self.mark(FieldBit::Peep);
    }

    pub fn decrement_min_peep(&mut self) {
        self.next.min_peep = self
            .next
            .min_peep
            .saturating_sub(PEEP_STEP_MMH2O)
            .max(PEEP_MIN_MMH2O);
        self.mark(FieldBit::Peep);
    }

    pub fn increment_max_plateau(&mut self) {
        let ceiling = PLATEAU_MAX_MMH2O.min(self.next.max_peak);
        self.next.max_plateau = self
            .next
            .max_plateau
            .saturating_add(PLATEAU_STEP_MMH2O)
            .min(ceiling);
        self.mark(FieldBit::Plateau);
    }

    pub fn decrement_max_plateau(&mut self) {
        self.next.max_plateau = self
            .next
            .max_plateau
            .saturating_sub(PLATEAU_STEP_MMH2O)
            .max(PLATEAU_MIN_MMH2O);
        self.mark(FieldBit::Plateau);
    }

    pub fn increment_max_peak(&mut self) {
        self.next.max_peak = self
            .next
            .max_peak
            .saturating_add(self.peak_step)
            .min(PEAK_MAX_MMH2O);
        self.mark(FieldBit::Peak);
    }

    pub fn decrement_max_peak(&mut self) {
        let floor = PEAK_MIN_MMH2O.max(self.next.max_plateau);
        self.next.max_peak = self.next.max_peak.saturating_sub(self.peak_step).max(floor);
        self.mark(FieldBit::Peak);
    }

    /// Moves the active peak command after a cycle, keeping it above the plateau command.
    ///
    /// Returns the peak command actually in effect.
    pub fn calibrate_max_peak(&mut self, delta: i16) -> i16 {
        let floor = PEAK_MIN_MMH2O.max(self.active.max_plateau);
        self.active.max_peak = self
            .active
            .max_peak
            .saturating_add(delta)
            .clamp(floor, PEAK_MAX_MMH2O);

        // Keep the pending set in sync unless the operator changed the peak
        if self.dirty & (FieldBit::Peak as u8) == 0 {
            self.next.max_peak = self.active.max_peak.max(self.next.max_plateau);
        }
        self.active.max_peak
    }

    /// Applies the pending operator changes. Returns true if anything changed.
    pub fn apply_pending(&mut self) -> bool {
        if self.dirty == 0 {
            return false;
        }
        let previous = self.active;
        self.active = self.next;
        if self.active.max_plateau > self.active.max_peak {
            self.active.max_peak = self.active.max_plateau;
            self.next.max_peak = self.active.max_peak;
        }
        self.dirty = 0;
        previous != self.active
    }

    #[inline(always)]
    fn mark(&mut self, field: FieldBit) {
        self.dirty |= field as u8;
    }
}

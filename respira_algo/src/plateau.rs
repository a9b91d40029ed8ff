// Plateau pressure detection.
//
// Key Features:
// - Sliding window of the last samples, written every tick and cleared at each cycle start
// - Accumulation is armed once per cycle, when the window is stable within the last 5% of the
//   inhalation budget
// - The plateau is latched as the mean of the accumulated samples as soon as stability is lost
//   (usually at the start of the exhale) or at the end of the cycle
// - A cycle without a latched plateau reports `PLATEAU_UNKNOWN`

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::config::{MAX_PRESSURE_SAMPLES, PLATEAU_UNKNOWN, PRESSURE_STABILITY_THRESHOLD_MMH2O};
use crate::cycle::CycleTiming;
use crate::math_integer::fifo_buffer::{BufferFIFO, WindowStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlateauState {
    /// Not armed yet in this cycle
    Waiting,
    /// Stable pressure is being averaged
    Accumulating,
    /// Plateau computed, nothing changes until the next cycle
    Latched,
}

pub struct PlateauTracker {
    window: BufferFIFO<i16, MAX_PRESSURE_SAMPLES>,
    state: PlateauState,
    sum: i32,
    count: i32,
    plateau: i16,
}

impl PlateauTracker {
    pub fn new() -> Self {
        Self {
            window: BufferFIFO::new(),
            state: PlateauState::Waiting,
            sum: 0,
            count: 0,
            plateau: PLATEAU_UNKNOWN,
        }
    }

    /// Forgets the previous cycle.
    pub fn reset(&mut self) {
        self.window.clear();
        self.state = PlateauState::Waiting;
        self.sum = 0;
        self.count = 0;
        self.plateau = PLATEAU_UNKNOWN;
    }

    /// Feeds the pressure of one tick.
    pub fn tick(&mut self, tick: u16, pressure: i16, timing: &CycleTiming) {
        self.window.write(pressure);
        let stable = self.is_stable();

        match self.state {
            PlateauState::Waiting => {
                let armed = tick >= timing.plateau_arming_tick()
                    && tick < timing.centi_sec_per_inhalation();
                if stable && armed {
                    self.state = PlateauState::Accumulating;
                    self.sum = pressure as i32;
                    self.count = 1;
                }
            }
            PlateauState::Accumulating => {
                if stable {
                    self.sum += pressure as i32;
                    self.count += 1;
                } else {
                    self.latch();
                }
            }
            PlateauState::Latched => {}
        }
    }

    /// Closes the cycle and returns its plateau, `PLATEAU_UNKNOWN` if none was found.
    pub fn finish(&mut self) -> i16 {
        if self.state == PlateauState::Accumulating {
            self.latch();
        }
        self.plateau
    }

    /// Statistics of the current window, once it is full.
    #[inline]
    pub fn window_stats(&self) -> Option<WindowStats> {
        self.window.stats()
    }

    /// True when the window is full and its spread is below the stability threshold.
    pub fn is_stable(&self) -> bool {
        self.window
            .stats()
            .map_or(false, |s| s.spread() < PRESSURE_STABILITY_THRESHOLD_MMH2O)
    }

    #[inline]
    pub fn state(&self) -> PlateauState {
        self.state
    }

    #[inline]
    pub fn plateau(&self) -> i16 {
        self.plateau
    }

    fn latch(&mut self) {
        if self.count > 0 {
            self.plateau = (self.sum / self.count) as i16;
        }
        self.state = PlateauState::Latched;
    }
}

impl Default for PlateauTracker {
    fn default() -> Self {
        Self::new()
    }
}

// Implements the airway pressure front-end: ADC sample -> filtered pressure in mmH2O.
//
// Key Features:
// - Conversion of an MPX5010 class sensor read through a resistor divider
//   (Vout = Vs * (0.09 * P + 0.04), P in kPa)
// - Integer low-pass filtering of the converted value
// - Keeps the last good value so the controller is always fed, even when a read is missing

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_integer::filters::lpf::FilterLPF;
use crate::math_integer::normalization::adc_to_value;

/// ADC reference voltage in millivolts.
pub const ADC_REFERENCE_MV: i32 = 3300;
/// Sensor supply voltage in millivolts.
pub const SENSOR_SUPPLY_MV: i32 = 5000;
/// Ratio of the divider between the sensor output and the ADC input (permille).
pub const DIVIDER_RATIO_PERMILLE: i32 = 680;
/// Default smoothing of the pressure filter (0..255).
pub const PRESSURE_FILTER_ALPHA: u8 = 64;

/// Converts a raw 12-bit sample of the pressure sensor to mmH2O, clamped to positive values.
pub fn adc_to_mmh2o(raw: u16) -> i16 {
    let adc_mv = adc_to_value(raw, ADC_REFERENCE_MV);
    let sensor_mv = adc_mv * 1000 / DIVIDER_RATIO_PERMILLE;

    // Output relative to the supply, in permille: 40 at 0 kPa, 90 more per kPa
    let ratio = sensor_mv * 1000 / SENSOR_SUPPLY_MV;
    let pascal = (ratio - 40) * 1000 / 90;

    // 1 mmH2O = 9.807 Pa
    let mmh2o = pascal * 1000 / 9807;
    mmh2o.clamp(0, i16::MAX as i32) as i16
}

/// Low-pass filter on converted pressure samples.
pub struct PressureFilter {
    filter: FilterLPF,
}

impl PressureFilter {
    pub fn new(alpha: u8) -> Self {
        Self {
            filter: FilterLPF::new(0, alpha),
        }
    }

    /// Filters one pressure sample and returns the filtered pressure.
    #[inline]
    pub fn tick(&mut self, pressure: i16) -> i16 {
        self.filter.tick(pressure)
    }
}

/// Raw ADC sample in, pressure for `PressureController::update_pressure` out.
pub struct PressureFrontEnd {
    filter: PressureFilter,
    last_good: i16,
    missed_reads: u32,
}

impl PressureFrontEnd {
    pub fn new(alpha: u8) -> Self {
        Self {
            filter: PressureFilter::new(alpha),
            last_good: 0,
            missed_reads: 0,
        }
    }

    /// Processes the read of this tick; `None` when the sample was not available.
    pub fn tick(&mut self, raw: Option<u16>) -> i16 {
        match raw {
            Some(raw) => {
                self.last_good = self.filter.tick(adc_to_mmh2o(raw));
            }
            None => {
                self.missed_reads = self.missed_reads.saturating_add(1);
                debug!("pressure read missed, reusing {} mmH2O", self.last_good);
            }
        }
        self.last_good
    }

    /// Last filtered pressure
    #[inline]
    pub fn pressure(&self) -> i16 {
        self.last_good
    }

    /// Number of reads that were not available since boot
    #[inline]
    pub fn missed_reads(&self) -> u32 {
        self.missed_reads
    }
}

impl Default for PressureFrontEnd {
    fn default() -> Self {
        Self::new(PRESSURE_FILTER_ALPHA)
    }
}

// Implements the SupplyMonitor module, filtering the supply voltage measurement and reporting
// the power related alarms (mains disconnected, battery low, battery very low).

// Key Features:
// - Processes raw supply voltage readings from ADC
// - Applies a low-pass filter to smooth voltage data, primed with the first sample
// - Scales filtered output to obtain voltage in millivolts
// - Raises or clears one alarm per voltage threshold, once per breathing cycle

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::alarms::{AlarmCode, AlarmController};
use crate::config::{BATTERY_LOW_MV, BATTERY_VERY_LOW_MV, MAINS_CONNECTED_MIN_MV};
use crate::math_integer::filters::lpf::FilterLPF;
use crate::math_integer::normalization::{adc_to_value, ADC_FULL_SCALE};

/// Voltage thresholds and the alarm raised below each of them.
const SUPPLY_ALARMS: [(i32, AlarmCode); 3] = [
    (MAINS_CONNECTED_MIN_MV, AlarmCode::RCM_SW_16),
    (BATTERY_LOW_MV, AlarmCode::RCM_SW_11),
    (BATTERY_VERY_LOW_MV, AlarmCode::RCM_SW_12),
];

/// Manages supply voltage measurements with low-pass filtering
pub struct SupplyMonitor {
    /// Instance of low-pass filter for smoothing ADC samples
    filter: FilterLPF,

    /// Voltage in millivolts matching the ADC full scale
    max_voltage_mv: i32,

    /// Current voltage measurement in millivolts
    voltage_mv: i32,

    /// The filter starts from the first sample instead of zero
    primed: bool,
}

impl SupplyMonitor {
    /// Constructs a `SupplyMonitor` with the specified filter constant and full scale voltage
    pub fn new(k_filter: u8, max_voltage_mv: i32) -> Self {
        Self {
            filter: FilterLPF::new(0, k_filter),
            max_voltage_mv,
            voltage_mv: 0,
            primed: false,
        }
    }

    /// Updates the voltage measurement with a new ADC sample
    pub fn tick(&mut self, vsup_adc: u16) -> &Self {
        let raw = (vsup_adc as i32).min(ADC_FULL_SCALE) as i16;
        if !self.primed {
            self.filter.reset(raw);
            self.primed = true;
        }
        let filtered = self.filter.tick(raw).max(0) as u16;
        self.voltage_mv = adc_to_value(filtered, self.max_voltage_mv);
        self
    }

    /// Retrieves the voltage in millivolts
    #[inline]
    pub fn voltage_mv(&self) -> i32 {
        self.voltage_mv
    }

    /// Retrieves the maximum voltage in millivolts
    #[inline]
    pub fn max_voltage_mv(&self) -> i32 {
        self.max_voltage_mv
    }

    /// True while the voltage shows the mains adapter is plugged in
    #[inline]
    pub fn is_on_mains(&self) -> bool {
        self.voltage_mv >= MAINS_CONNECTED_MIN_MV
    }

    /// Reports the supply alarms of this cycle.
    pub fn check_alarms(&self, cycle: u32, alarms: &mut AlarmController) {
        if !self.primed {
            return;
        }
        for (threshold, code) in SUPPLY_ALARMS {
            if self.voltage_mv < threshold {
                alarms.detected_alarm(code, cycle, threshold, self.voltage_mv);
            } else {
                alarms.not_detected_alarm(code);
            }
        }
    }
}

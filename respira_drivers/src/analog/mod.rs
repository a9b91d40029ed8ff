// Implements the analog front-end reads (ADC1, one-shot conversions in the control tick).
//
// Key Features:
// - Pressure sensor and supply divider on single ended channels
// - Right aligned 12-bit samples, matching the integer conversions of the control core

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::{
    adc::{Adc, AdcDevice, Align, InputType, SampleTime},
    clocks::Clocks,
    pac::ADC1,
};

use super::pinout::sensors::*;

pub struct AnalogInputs {
    adc: Adc<ADC1>,
}

impl AnalogInputs {
    pub fn new(adc1: ADC1, clock_cfg: &Clocks) -> Self {
        PRESSURE.init();
        SUPPLY.init();

        let mut adc = Adc::new_adc1(adc1, AdcDevice::One, Default::default(), clock_cfg.systick());

        for channel in [PRESSURE_CHANNEL, SUPPLY_CHANNEL] {
            adc.set_input_type(channel, InputType::SingleEnded);
            // The sensor output impedance needs a long sampling window
            adc.set_sample_time(channel, SampleTime::T92);
        }
        adc.set_align(Align::Right);

        AnalogInputs { adc }
    }

    pub fn read_pressure(&mut self) -> u16 {
        self.adc.read(PRESSURE_CHANNEL)
    }

    pub fn read_supply(&mut self) -> u16 {
        self.adc.read(SUPPLY_CHANNEL)
    }
}

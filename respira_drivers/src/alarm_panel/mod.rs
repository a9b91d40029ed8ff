// Implements the alarm outputs of the front panel.
//
// Key Features:
// - Buzzer tone and red/yellow LEDs driven by the alarm controller
// - Alarm line reported over defmt, only when the triggered set changes

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::gpio::Pin;

use respira_algo::alarms::ALARM_COUNT;
use respira_algo::{AlarmCode, AlarmEffects, LedState, Tone};

use super::buzzer::Buzzer;
use super::pinout;

pub struct AlarmPanel {
    buzzer: Buzzer,
    red: Pin,
    yellow: Pin,
    shown: [Option<AlarmCode>; ALARM_COUNT],
}

impl AlarmPanel {
    pub fn new(buzzer: Buzzer) -> Self {
        let mut red = pinout::alarm::LED_RED.init();
        let mut yellow = pinout::alarm::LED_YELLOW.init();
        red.set_low();
        yellow.set_low();

        AlarmPanel {
            buzzer,
            red,
            yellow,
            shown: [None; ALARM_COUNT],
        }
    }
}

impl AlarmEffects for AlarmPanel {
    fn set_buzzer(&mut self, tone: Tone) {
        self.buzzer.set_tone(tone);
    }

    fn set_leds(&mut self, leds: LedState) {
        match leds {
            LedState::Off => {
                self.red.set_low();
                self.yellow.set_low();
            }
            LedState::Red => {
                self.red.set_high();
                self.yellow.set_low();
            }
            LedState::Yellow => {
                self.red.set_low();
                self.yellow.set_high();
            }
        }
    }

    fn display_alarms(&mut self, alarms: &[Option<AlarmCode>]) {
        if self.shown[..] == *alarms {
            return;
        }
        for (slot, code) in self.shown.iter_mut().zip(alarms.iter()) {
            *slot = *code;
        }
        defmt::info!("ALARMS: {}", alarms);
    }
}

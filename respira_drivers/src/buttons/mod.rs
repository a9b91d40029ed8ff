// Implements the operator button reader.
//
// Key Features:
// - Ten active low buttons with internal pull-ups
// - Polled once per control tick; a press is reported once, on its falling edge

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::gpio::{Pin, Pull};

use super::pinout::buttons::*;
use super::pinout::PinDef;

pub const BUTTON_COUNT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Button {
    PeakUp,
    PeakDown,
    PlateauUp,
    PlateauDown,
    PeepUp,
    PeepDown,
    CycleUp,
    CycleDown,
    Snooze,
    StartStop,
}

const LAYOUT: [(Button, PinDef); BUTTON_COUNT] = [
    (Button::PeakUp, PEAK_UP),
    (Button::PeakDown, PEAK_DOWN),
    (Button::PlateauUp, PLATEAU_UP),
    (Button::PlateauDown, PLATEAU_DOWN),
    (Button::PeepUp, PEEP_UP),
    (Button::PeepDown, PEEP_DOWN),
    (Button::CycleUp, CYCLE_UP),
    (Button::CycleDown, CYCLE_DOWN),
    (Button::Snooze, SNOOZE),
    (Button::StartStop, START_STOP),
];

pub struct Buttons {
    pins: [Pin; BUTTON_COUNT],
    pressed: [bool; BUTTON_COUNT],
}

impl Buttons {
    pub fn new() -> Self {
        let pins = LAYOUT.map(|(_, def)| {
            let mut pin = def.init();
            pin.pull(Pull::Up);
            pin
        });

        Buttons {
            pins,
            pressed: [false; BUTTON_COUNT],
        }
    }

    /// Calls `on_press` for every button pressed since the previous poll.
    pub fn poll<F: FnMut(Button)>(&mut self, mut on_press: F) {
        for (i, pin) in self.pins.iter().enumerate() {
            let pressed = pin.is_low();
            if pressed && !self.pressed[i] {
                on_press(LAYOUT[i].0);
            }
            self.pressed[i] = pressed;
        }
    }
}

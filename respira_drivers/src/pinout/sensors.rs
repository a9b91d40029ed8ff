//! Analog inputs. Channel numbers are the ADC1 channels wired to each pin.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::PinDef;
use super::{PinMode, Port};

/// MPX5010 output behind the 680 permille divider, ADC1_IN1
pub const PRESSURE: PinDef = PinDef {
    port: Port::A,
    pin: 0,
    mode: PinMode::Analog,
};
pub const PRESSURE_CHANNEL: u8 = 1;

/// Supply rail divider, ADC1_IN2
pub const SUPPLY: PinDef = PinDef {
    port: Port::A,
    pin: 1,
    mode: PinMode::Analog,
};
pub const SUPPLY_CHANNEL: u8 = 2;

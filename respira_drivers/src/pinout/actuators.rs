//! PWM outputs of the pinch valve servos and the blower ESC (TIM3, AF2).

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::PinDef;
use super::{PinMode, Port};

/// Inspiratory pinch valve servo, TIM3_CH1
pub const VALVE_INSPIRATORY: PinDef = PinDef {
    port: Port::A,
    pin: 6,
    mode: PinMode::Alt(2),
};

/// Expiratory pinch valve servo, TIM3_CH2
pub const VALVE_EXPIRATORY: PinDef = PinDef {
    port: Port::A,
    pin: 4,
    mode: PinMode::Alt(2),
};

/// Blower ESC input, TIM3_CH3
pub const BLOWER_ESC: PinDef = PinDef {
    port: Port::B,
    pin: 0,
    mode: PinMode::Alt(2),
};

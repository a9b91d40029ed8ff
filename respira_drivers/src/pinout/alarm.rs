// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::PinDef;
use super::{PinMode, Port};

/// Piezo buzzer, TIM4_CH1
pub const BUZZER: PinDef = PinDef {
    port: Port::B,
    pin: 6,
    mode: PinMode::Alt(2),
};

pub const LED_RED: PinDef = PinDef {
    port: Port::B,
    pin: 15,
    mode: PinMode::Output,
};

pub const LED_YELLOW: PinDef = PinDef {
    port: Port::B,
    pin: 14,
    mode: PinMode::Output,
};

//! Operator buttons, active low with internal pull-ups.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::PinDef;
use super::{PinMode, Port};

pub const PEAK_UP: PinDef = PinDef::new(Port::A, 8, PinMode::Input);
pub const PEAK_DOWN: PinDef = PinDef::new(Port::A, 9, PinMode::Input);
pub const PLATEAU_UP: PinDef = PinDef::new(Port::A, 10, PinMode::Input);
pub const PLATEAU_DOWN: PinDef = PinDef::new(Port::A, 15, PinMode::Input);
pub const PEEP_UP: PinDef = PinDef::new(Port::B, 3, PinMode::Input);
pub const PEEP_DOWN: PinDef = PinDef::new(Port::B, 4, PinMode::Input);
pub const CYCLE_UP: PinDef = PinDef::new(Port::B, 5, PinMode::Input);
pub const CYCLE_DOWN: PinDef = PinDef::new(Port::B, 7, PinMode::Input);
pub const SNOOZE: PinDef = PinDef::new(Port::C, 13, PinMode::Input);
pub const START_STOP: PinDef = PinDef::new(Port::C, 10, PinMode::Input);

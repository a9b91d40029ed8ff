// Sensor front-ends of the control core: airway pressure and power supply.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod pressure;
pub mod supply;

pub use pressure::{adc_to_mmh2o, PressureFilter, PressureFrontEnd};
pub use supply::SupplyMonitor;

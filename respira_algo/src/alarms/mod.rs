// Alarm engine of the ventilator.
//
// Key Features:
// - Fixed catalogue of clinically defined alarms, each with a priority, a stable code and a
//   debounce threshold counted in distinct breathing cycles
// - `AlarmController` keeps the ordered set of triggered alarms, the highest active priority,
//   the operator snooze and a bounded queue of transition events for telemetry
// - `run_alarm_effects` drives buzzer, LEDs and display through the `AlarmEffects` capability

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

mod alarm;
mod controller;
pub mod effects;

pub use alarm::Alarm;
pub use controller::{AlarmController, AlarmEvent, CoreData, ALARM_COUNT, ALARM_EVENT_QUEUE_LEN};
pub use effects::{AlarmEffects, BuzzerPattern, BuzzerSequencer, LedState, Tone};

/// Priority of an alarm, ordered from `None` to `High`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmPriority {
    None,
    Low,
    Medium,
    High,
}

/// Stable numeric identifier of an alarm, shown on the display and sent to telemetry.
///
/// The tens digit groups alarms by priority (1x high, 2x medium, 3x low) so the lowest code
/// is also the most severe one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmCode(pub u8);

impl AlarmCode {
    /// Mean pressure of the cycle too low (disconnection), high priority
    pub const RCM_SW_2: AlarmCode = AlarmCode(11);
    /// Plateau out of band, high priority
    pub const RCM_SW_1: AlarmCode = AlarmCode(12);
    /// Battery very low
    pub const RCM_SW_12: AlarmCode = AlarmCode(13);
    /// PEEP out of band, high priority
    pub const RCM_SW_3: AlarmCode = AlarmCode(14);
    /// Instantaneous over-pressure
    pub const RCM_SW_18: AlarmCode = AlarmCode(17);
    /// Battery low
    pub const RCM_SW_11: AlarmCode = AlarmCode(21);
    /// Plateau out of band, medium priority
    pub const RCM_SW_14: AlarmCode = AlarmCode(22);
    /// PEEP out of band, medium priority
    pub const RCM_SW_15: AlarmCode = AlarmCode(23);
    /// Mean pressure of the cycle too low (disconnection), medium priority
    pub const RCM_SW_19: AlarmCode = AlarmCode(24);
    /// Mains disconnected
    pub const RCM_SW_16: AlarmCode = AlarmCode(31);

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Catalogue of the alarms known to the controller, in code order.
pub const ALARM_CATALOGUE: [Alarm; ALARM_COUNT] = [
    Alarm::new(AlarmPriority::High, AlarmCode::RCM_SW_2, 3),
    Alarm::new(AlarmPriority::High, AlarmCode::RCM_SW_1, 3),
    Alarm::new(AlarmPriority::High, AlarmCode::RCM_SW_12, 1),
    Alarm::new(AlarmPriority::High, AlarmCode::RCM_SW_3, 3),
    Alarm::new(AlarmPriority::High, AlarmCode::RCM_SW_18, 1),
    Alarm::new(AlarmPriority::Medium, AlarmCode::RCM_SW_11, 1),
    Alarm::new(AlarmPriority::Medium, AlarmCode::RCM_SW_14, 2),
    Alarm::new(AlarmPriority::Medium, AlarmCode::RCM_SW_15, 2),
    Alarm::new(AlarmPriority::Medium, AlarmCode::RCM_SW_19, 3),
    Alarm::new(AlarmPriority::Low, AlarmCode::RCM_SW_16, 1),
];

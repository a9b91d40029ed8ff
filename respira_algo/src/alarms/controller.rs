// Implements the AlarmController: detection reports in, triggered set and effects out.
//
// Key Features:
// - Debounced detection per alarm, with one event per triggered/cleared transition
// - Triggered set kept as `Option<AlarmCode>` slots, lowest code first, empty slots last
// - Snooze silences the buzzer for 120 s, cancelled early when a new alarm triggers
// - Buzzer, LEDs and display refreshed once per tick through `AlarmEffects`

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use heapless::Deque;

use super::effects::{led_state, AlarmEffects, BuzzerPattern, BuzzerSequencer, Tone};
use super::{Alarm, AlarmCode, AlarmPriority, ALARM_CATALOGUE};
use crate::config::{ALARM_DISPLAY_REFRESH_TICKS, SNOOZE_DURATION_MS};
use crate::cycle::{CyclePhase, CycleSubPhase};

/// Number of alarms known to the controller.
pub const ALARM_COUNT: usize = 10;

/// Capacity of the transition event queue.
pub const ALARM_EVENT_QUEUE_LEN: usize = 16;

/// Controller context recorded once per tick and attached to alarm events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreData {
    pub tick: u16,
    pub pressure: i16,
    pub phase: CyclePhase,
    pub sub_phase: CycleSubPhase,
    pub cycle: u32,
}

impl CoreData {
    const fn new() -> Self {
        Self {
            tick: 0,
            pressure: 0,
            phase: CyclePhase::Inhalation,
            sub_phase: CycleSubPhase::Inspiration,
            cycle: 0,
        }
    }
}

/// Transition of one alarm, queued for telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmEvent {
    pub code: AlarmCode,
    pub priority: AlarmPriority,
    /// `true` when the alarm became triggered, `false` when it was cleared
    pub triggered: bool,
    pub cycle: u32,
    pub expected: i32,
    pub measured: i32,
    pub core: CoreData,
}

struct Snooze {
    since_ms: u32,
    /// Alarms already triggered when the operator snoozed
    known: [bool; ALARM_COUNT],
}

pub struct AlarmController {
    alarms: [Alarm; ALARM_COUNT],
    triggered: [Option<AlarmCode>; ALARM_COUNT],
    highest_priority: AlarmPriority,

    snooze: Option<Snooze>,
    core: CoreData,
    events: Deque<AlarmEvent, ALARM_EVENT_QUEUE_LEN>,

    sequencer: BuzzerSequencer,
    tone: Option<Tone>,
    last_effects_ms: Option<u32>,
}

impl AlarmController {
    pub const fn new() -> Self {
        Self {
            alarms: ALARM_CATALOGUE,
            triggered: [None; ALARM_COUNT],
            highest_priority: AlarmPriority::None,
            snooze: None,
            core: CoreData::new(),
            events: Deque::new(),
            sequencer: BuzzerSequencer::new(),
            tone: None,
            last_effects_ms: None,
        }
    }

    /// Reports that the condition of `code` was observed during `cycle`.
    pub fn detected_alarm(&mut self, code: AlarmCode, cycle: u32, expected: i32, measured: i32) {
        let Some(index) = self.index_of(code) else {
            error!("unknown alarm code {}", code.value());
            return;
        };
        let alarm = &mut self.alarms[index];
        let was_triggered = alarm.is_triggered();
        alarm.detected(cycle);
        if was_triggered || !alarm.is_triggered() {
            return;
        }

        let priority = alarm.priority();
        warn!(
            "alarm {} triggered ({:?}), expected {} measured {}",
            code.value(),
            priority,
            expected,
            measured
        );
        self.insert_triggered(code);
        self.update_highest_priority();
        self.push_event(AlarmEvent {
            code,
            priority,
            triggered: true,
            cycle,
            expected,
            measured,
            core: self.core,
        });

        let newly_active = self.snooze.as_ref().map_or(false, |s| !s.known[index]);
        if newly_active {
            info!("snooze cancelled by alarm {}", code.value());
            self.snooze = None;
        }
    }

    /// Reports that the condition of `code` is gone.
    pub fn not_detected_alarm(&mut self, code: AlarmCode) {
        let Some(index) = self.index_of(code) else {
            error!("unknown alarm code {}", code.value());
            return;
        };
        let alarm = &mut self.alarms[index];
        let was_triggered = alarm.is_triggered();
        alarm.not_detected();
        if !was_triggered {
            return;
        }

        let priority = alarm.priority();
        info!("alarm {} cleared", code.value());
        self.remove_triggered(code);
        self.update_highest_priority();
        self.push_event(AlarmEvent {
            code,
            priority,
            triggered: false,
            cycle: self.core.cycle,
            expected: 0,
            measured: 0,
            core: self.core,
        });
    }

    /// Records the controller context of the current tick.
    pub fn update_core_data(
        &mut self,
        tick: u16,
        pressure: i16,
        phase: CyclePhase,
        sub_phase: CycleSubPhase,
        cycle: u32,
    ) {
        self.core = CoreData {
            tick,
            pressure,
            phase,
            sub_phase,
            cycle,
        };
    }

    /// Copy of the triggered set, lowest code first, empty slots last.
    #[inline]
    pub fn triggered_alarms(&self) -> [Option<AlarmCode>; ALARM_COUNT] {
        self.triggered
    }

    pub fn is_triggered(&self, code: AlarmCode) -> bool {
        self.index_of(code)
            .map_or(false, |index| self.alarms[index].is_triggered())
    }

    #[inline]
    pub fn highest_priority(&self) -> AlarmPriority {
        self.highest_priority
    }

    #[inline]
    pub fn alarms(&self) -> &[Alarm; ALARM_COUNT] {
        &self.alarms
    }

    /// Oldest transition event not yet consumed.
    #[inline]
    pub fn pop_event(&mut self) -> Option<AlarmEvent> {
        self.events.pop_front()
    }

    /// Mutes the buzzer for `SNOOZE_DURATION_MS`.
    pub fn snooze(&mut self, now_ms: u32) {
        let mut known = [false; ALARM_COUNT];
        for (slot, alarm) in known.iter_mut().zip(self.alarms.iter()) {
            *slot = alarm.is_triggered();
        }
        self.snooze = Some(Snooze {
            since_ms: now_ms,
            known,
        });
        info!("alarms snoozed at {} ms", now_ms);
    }

    /// Ends the snooze before its timeout.
    pub fn unsnooze(&mut self) {
        if self.snooze.take().is_some() {
            info!("snooze cancelled by operator");
        }
    }

    #[inline]
    pub fn is_snoozed(&self) -> bool {
        self.snooze.is_some()
    }

    /// Plays the one-shot boot beep, unless an alarm is already sounding.
    pub fn play_boot_beep(&mut self) {
        if self.sequencer.pattern().is_none() {
            self.sequencer.start(BuzzerPattern::Boot);
        }
    }

    /// Refreshes buzzer, LEDs and display; called once per tick.
    ///
    /// # Arguments
    /// * `tick` - Free running tick counter, used for the display cadence
    /// * `now_ms` - Monotonic time in milliseconds, used for patterns and snooze timeout
    /// * `effects` - Outputs to drive
    pub fn run_alarm_effects<E: AlarmEffects>(&mut self, tick: u32, now_ms: u32, effects: &mut E) {
        self.update_highest_priority();

        let expired = self
            .snooze
            .as_ref()
            .map_or(false, |s| now_ms.wrapping_sub(s.since_ms) >= SNOOZE_DURATION_MS);
        if expired {
            info!("snooze expired");
            self.snooze = None;
        }

        if tick % ALARM_DISPLAY_REFRESH_TICKS as u32 == 0 {
            effects.display_alarms(&self.triggered);
        }

        effects.set_leds(led_state(self.highest_priority, now_ms));

        // ########################### BUZZER ##########################################
        let wanted = if self.snooze.is_some() {
            None
        } else {
            BuzzerPattern::for_priority(self.highest_priority)
        };
        let mut elapsed = match self.last_effects_ms {
            Some(last) => now_ms.wrapping_sub(last),
            None => 0,
        };
        self.last_effects_ms = Some(now_ms);

        let current = self.sequencer.pattern();
        match wanted {
            Some(pattern) if current != Some(pattern) => {
                // A new pattern always starts from its first step
                self.sequencer.start(pattern);
                elapsed = 0;
            }
            None if current != Some(BuzzerPattern::Boot) => self.sequencer.stop(),
            _ => {}
        }

        let tone = self.sequencer.tick(elapsed);
        if self.tone != Some(tone) {
            effects.set_buzzer(tone);
            self.tone = Some(tone);
        }
    }

    fn index_of(&self, code: AlarmCode) -> Option<usize> {
        self.alarms.iter().position(|alarm| alarm.code() == code)
    }

    fn update_highest_priority(&mut self) {
        self.highest_priority = self
            .alarms
            .iter()
            .filter(|alarm| alarm.is_triggered())
            .map(|alarm| alarm.priority())
            .max()
            .unwrap_or(AlarmPriority::None);
    }

    fn insert_triggered(&mut self, code: AlarmCode) {
        if self.triggered.contains(&Some(code)) {
            return;
        }
        if let Some(slot) = self.triggered.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(code);
        }
    }

    fn remove_triggered(&mut self, code: AlarmCode) {
        for slot in self.triggered.iter_mut() {
            if *slot == Some(code) {
                *slot = None;
            }
        }
        self.triggered.sort_unstable_by_key(|slot| match slot {
            Some(code) => (false, code.value()),
            None => (true, 0),
        });
    }

    fn push_event(&mut self, event: AlarmEvent) {
        let Err(event) = self.events.push_back(event) else {
            return;
        };
        if let Some(dropped) = self.events.pop_front() {
            warn!("alarm event queue full, dropping event of alarm {}", dropped.code.value());
        }
        if let Err(lost) = self.events.push_back(event) {
            error!("alarm event of {} lost", lost.code.value());
        }
    }
}

impl Default for AlarmController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::LedState;

    #[derive(Default)]
    struct Outputs {
        tone: Option<Tone>,
        leds: Option<LedState>,
        displayed: Option<[Option<AlarmCode>; ALARM_COUNT]>,
        refreshes: u32,
    }

    impl AlarmEffects for Outputs {
        fn set_buzzer(&mut self, tone: Tone) {
            self.tone = Some(tone);
        }
        fn set_leds(&mut self, leds: LedState) {
            self.leds = Some(leds);
        }
        fn display_alarms(&mut self, alarms: &[Option<AlarmCode>]) {
            let mut copy = [None; ALARM_COUNT];
            copy.copy_from_slice(alarms);
            self.displayed = Some(copy);
            self.refreshes += 1;
        }
    }

    #[test]
    fn triggers_after_threshold_cycles() {
        let mut ctrl = AlarmController::new();
        ctrl.detected_alarm(AlarmCode::RCM_SW_14, 0, 300, 200);
        assert!(!ctrl.is_triggered(AlarmCode::RCM_SW_14));
        ctrl.detected_alarm(AlarmCode::RCM_SW_14, 0, 300, 200);
        assert!(!ctrl.is_triggered(AlarmCode::RCM_SW_14));
        ctrl.detected_alarm(AlarmCode::RCM_SW_14, 1, 300, 200);
        assert!(ctrl.is_triggered(AlarmCode::RCM_SW_14));
        assert_eq!(ctrl.highest_priority(), AlarmPriority::Medium);
    }

    #[test]
    fn triggered_set_is_sorted_after_clear() {
        let mut ctrl = AlarmController::new();
        ctrl.detected_alarm(AlarmCode::RCM_SW_16, 0, 0, 0);
        ctrl.detected_alarm(AlarmCode::RCM_SW_18, 0, 800, 850);
        ctrl.detected_alarm(AlarmCode::RCM_SW_11, 0, 0, 0);
        assert_eq!(
            &ctrl.triggered_alarms()[..3],
            &[
                Some(AlarmCode::RCM_SW_16),
                Some(AlarmCode::RCM_SW_18),
                Some(AlarmCode::RCM_SW_11)
            ]
        );

        ctrl.not_detected_alarm(AlarmCode::RCM_SW_18);
        let set = ctrl.triggered_alarms();
        assert_eq!(
            &set[..3],
            &[Some(AlarmCode::RCM_SW_11), Some(AlarmCode::RCM_SW_16), None]
        );
        assert!(set[2..].iter().all(|slot| slot.is_none()));
        assert_eq!(ctrl.highest_priority(), AlarmPriority::Medium);
    }

    #[test]
    fn events_follow_transitions() {
        let mut ctrl = AlarmController::new();
        ctrl.update_core_data(42, 850, CyclePhase::Inhalation, CycleSubPhase::Inspiration, 3);
        ctrl.detected_alarm(AlarmCode::RCM_SW_18, 3, 800, 850);
        ctrl.detected_alarm(AlarmCode::RCM_SW_18, 3, 800, 860);
        ctrl.not_detected_alarm(AlarmCode::RCM_SW_18);
        ctrl.not_detected_alarm(AlarmCode::RCM_SW_18);

        let raised = ctrl.pop_event().unwrap();
        assert!(raised.triggered);
        assert_eq!(raised.measured, 850);
        assert_eq!(raised.core.tick, 42);
        let cleared = ctrl.pop_event().unwrap();
        assert!(!cleared.triggered);
        assert_eq!(ctrl.pop_event(), None);
    }

    #[test]
    fn event_queue_drops_oldest() {
        let mut ctrl = AlarmController::new();
        for cycle in 0..(ALARM_EVENT_QUEUE_LEN as u32 + 4) {
            ctrl.detected_alarm(AlarmCode::RCM_SW_18, cycle, 800, cycle as i32);
            ctrl.not_detected_alarm(AlarmCode::RCM_SW_18);
        }
        let mut count = 0;
        let mut first = None;
        while let Some(event) = ctrl.pop_event() {
            first.get_or_insert(event.cycle);
            count += 1;
        }
        assert_eq!(count, ALARM_EVENT_QUEUE_LEN);
        assert_eq!(first, Some(12));
    }

    #[test]
    fn operator_can_end_snooze_early() {
        let mut ctrl = AlarmController::new();
        let mut out = Outputs::default();
        ctrl.detected_alarm(AlarmCode::RCM_SW_18, 0, 800, 900);
        ctrl.snooze(0);
        ctrl.run_alarm_effects(1, 10, &mut out);
        assert_eq!(out.tone, Some(Tone::Off));

        ctrl.unsnooze();
        assert!(!ctrl.is_snoozed());
        ctrl.run_alarm_effects(2, 20, &mut out);
        assert_eq!(out.tone, Some(Tone::High));
    }

    #[test]
    fn snooze_expires_after_timeout() {
        let mut ctrl = AlarmController::new();
        let mut out = Outputs::default();
        ctrl.detected_alarm(AlarmCode::RCM_SW_18, 0, 800, 900);
        ctrl.run_alarm_effects(0, 0, &mut out);
        assert_eq!(out.tone, Some(Tone::High));

        ctrl.snooze(10);
        ctrl.run_alarm_effects(1, 20, &mut out);
        assert_eq!(out.tone, Some(Tone::Off));
        ctrl.run_alarm_effects(2, 10 + SNOOZE_DURATION_MS - 1, &mut out);
        assert!(ctrl.is_snoozed());
        ctrl.run_alarm_effects(3, 10 + SNOOZE_DURATION_MS, &mut out);
        assert!(!ctrl.is_snoozed());
        assert_eq!(out.tone, Some(Tone::High));
    }

    #[test]
    fn known_alarm_does_not_cancel_snooze() {
        let mut ctrl = AlarmController::new();
        ctrl.detected_alarm(AlarmCode::RCM_SW_16, 0, 27_000, 23_000);
        ctrl.snooze(0);
        ctrl.not_detected_alarm(AlarmCode::RCM_SW_16);
        ctrl.detected_alarm(AlarmCode::RCM_SW_16, 1, 27_000, 23_000);
        assert!(ctrl.is_snoozed());
    }

    #[test]
    fn display_refreshed_at_cadence() {
        let mut ctrl = AlarmController::new();
        let mut out = Outputs::default();
        ctrl.detected_alarm(AlarmCode::RCM_SW_12, 0, 24_000, 23_000);
        for tick in 0..100 {
            ctrl.run_alarm_effects(tick, tick * 10, &mut out);
        }
        assert_eq!(out.refreshes, 2);
        assert_eq!(out.displayed.unwrap()[0], Some(AlarmCode::RCM_SW_12));
        assert_eq!(out.leds, Some(LedState::Off));
    }

    #[test]
    fn boot_beep_then_silence() {
        let mut ctrl = AlarmController::new();
        let mut out = Outputs::default();
        ctrl.play_boot_beep();
        ctrl.run_alarm_effects(0, 0, &mut out);
        assert_eq!(out.tone, Some(Tone::High));
        for tick in 1..100 {
            ctrl.run_alarm_effects(tick, tick * 10, &mut out);
        }
        assert_eq!(out.tone, Some(Tone::Off));
    }
}

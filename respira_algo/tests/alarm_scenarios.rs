mod common;

use common::Bench;
use respira_algo::config::PLATEAU_UNKNOWN;
use respira_algo::math_integer::normalization::ADC_FULL_SCALE;
use respira_algo::sensors::SupplyMonitor;
use respira_algo::{AlarmCode, AlarmEffects, AlarmPriority, LedState, Tone};

#[derive(Default)]
struct Panel {
    tone: Option<Tone>,
    leds: Option<LedState>,
    lines: u32,
}

impl AlarmEffects for Panel {
    fn set_buzzer(&mut self, tone: Tone) {
        self.tone = Some(tone);
    }

    fn set_leds(&mut self, leds: LedState) {
        self.leds = Some(leds);
    }

    fn display_alarms(&mut self, _alarms: &[Option<AlarmCode>]) {
        self.lines += 1;
    }
}

const SUPPLY_FULL_SCALE_MV: i32 = 36_300;

fn supply_raw(mv: i32) -> u16 {
    (mv * ADC_FULL_SCALE / SUPPLY_FULL_SCALE_MV + 1) as u16
}

/// Rises to `hold` by the end of the inspiration, holds it until the end of the inhalation,
/// then stays at `exhale`.
fn held_trace(hold: i16, exhale: i16) -> impl Fn(u16) -> i16 {
    move |tick| match tick {
        0..=79 => ((tick as i32 + 1) * hold as i32 / 80) as i16,
        80..=99 => hold,
        _ => exhale,
    }
}

const BAND_ALARMS: [AlarmCode; 4] = [
    AlarmCode::RCM_SW_14,
    AlarmCode::RCM_SW_15,
    AlarmCode::RCM_SW_1,
    AlarmCode::RCM_SW_3,
];

fn band_alarms(bench: &Bench) -> [bool; 4] {
    BAND_ALARMS.map(|code| bench.triggered(code))
}

#[test]
fn plateau_and_peep_out_of_band_escalate() {
    let mut bench = Bench::new();

    // Plateau 200 against 300, PEEP 120 against 50
    bench.run_cycle(held_trace(200, 120));
    assert_eq!(bench.ctrl.previous_plateau_pressure(), 200);
    assert_eq!(band_alarms(&bench), [false; 4]);

    bench.run_cycle(held_trace(200, 120));
    assert_eq!(band_alarms(&bench), [true, true, false, false]);
    assert_eq!(bench.alarms.highest_priority(), AlarmPriority::Medium);

    let raised = bench.alarms.pop_event().unwrap();
    assert_eq!(raised.code, AlarmCode::RCM_SW_14);
    assert_eq!((raised.cycle, raised.expected, raised.measured), (1, 300, 200));
    let raised = bench.alarms.pop_event().unwrap();
    assert_eq!(raised.code, AlarmCode::RCM_SW_15);
    assert_eq!((raised.expected, raised.measured), (50, 120));

    bench.run_cycle(held_trace(200, 120));
    assert_eq!(band_alarms(&bench), [true; 4]);
    assert_eq!(bench.alarms.highest_priority(), AlarmPriority::High);

    // Back on the commands: a single cycle clears all four
    bench.run_cycle(held_trace(300, 50));
    assert_eq!(band_alarms(&bench), [false; 4]);
}

#[test]
fn band_edges_are_inclusive() {
    for (plateau, peep, outside) in [
        (240, 70, false),
        (360, 30, false),
        (239, 71, true),
        (361, 29, true),
    ] {
        let mut bench = Bench::new();
        bench.run_cycle(held_trace(plateau, peep));
        bench.run_cycle(held_trace(plateau, peep));
        assert_eq!(bench.ctrl.previous_plateau_pressure(), plateau);
        assert_eq!(
            bench.triggered(AlarmCode::RCM_SW_14),
            outside,
            "plateau {}",
            plateau
        );
        assert_eq!(bench.triggered(AlarmCode::RCM_SW_15), outside, "peep {}", peep);
    }
}

#[test]
fn unknown_plateau_counts_as_out_of_band() {
    let mut bench = Bench::new();
    // Never stable during the inhalation, PEEP on its command
    let restless = |tick: u16| match tick {
        0..=99 if tick % 2 == 0 => 100,
        0..=99 => 300,
        _ => 50,
    };

    bench.run_cycle(restless);
    assert_eq!(bench.ctrl.previous_plateau_pressure(), PLATEAU_UNKNOWN);
    bench.run_cycle(restless);
    assert!(bench.triggered(AlarmCode::RCM_SW_14));
    assert!(!bench.triggered(AlarmCode::RCM_SW_15));

    let raised = bench.alarms.pop_event().unwrap();
    assert_eq!(raised.measured, PLATEAU_UNKNOWN as i32);
}

#[test]
fn disconnection_triggers_on_third_cycle() {
    let mut bench = Bench::new();

    for cycle in 1..=3 {
        bench.run_cycle(|_| 15);
        let expected = cycle >= 3;
        assert_eq!(bench.triggered(AlarmCode::RCM_SW_2), expected, "cycle {}", cycle);
        assert_eq!(bench.triggered(AlarmCode::RCM_SW_19), expected, "cycle {}", cycle);
    }
    assert_eq!(bench.alarms.highest_priority(), AlarmPriority::High);

    // Reconnected: a single good cycle clears both
    bench.run_cycle(|tick| if tick < 100 { 300 } else { 55 });
    assert!(!bench.triggered(AlarmCode::RCM_SW_2));
    assert!(!bench.triggered(AlarmCode::RCM_SW_19));
}

#[test]
fn over_pressure_is_instantaneous() {
    let mut bench = Bench::new();
    bench.step(0, 700);
    assert!(!bench.triggered(AlarmCode::RCM_SW_18));

    bench.step(1, 801);
    assert!(bench.triggered(AlarmCode::RCM_SW_18));

    bench.step(2, 800);
    assert!(!bench.triggered(AlarmCode::RCM_SW_18));

    let raised = bench.alarms.pop_event().unwrap();
    assert_eq!(raised.code, AlarmCode::RCM_SW_18);
    assert!(raised.triggered);
    assert_eq!(raised.measured, 801);
    assert_eq!(raised.core.tick, 1);
    let cleared = bench.alarms.pop_event().unwrap();
    assert!(!cleared.triggered);
}

#[test]
fn new_alarm_cancels_snooze() {
    let mut bench = Bench::new();
    let mut panel = Panel::default();
    let mut supply = SupplyMonitor::new(0, SUPPLY_FULL_SCALE_MV);

    bench.step(0, 850);
    bench.alarms.run_alarm_effects(0, 0, &mut panel);
    assert_eq!(panel.tone, Some(Tone::High));
    assert_eq!(panel.leds, Some(LedState::Red));

    bench.alarms.snooze(0);
    bench.alarms.run_alarm_effects(1, 10, &mut panel);
    assert_eq!(panel.tone, Some(Tone::Off));

    // 10 s later the mains adapter is unplugged
    supply.tick(supply_raw(26_000));
    supply.check_alarms(bench.ctrl.cycle_number(), &mut bench.alarms);
    assert!(bench.triggered(AlarmCode::RCM_SW_16));
    assert!(!bench.alarms.is_snoozed());

    bench.alarms.run_alarm_effects(2, 10_010, &mut panel);
    assert_eq!(panel.tone, Some(Tone::High));
}

#[test]
fn snooze_survives_known_alarms_until_timeout() {
    let mut bench = Bench::new();
    let mut panel = Panel::default();

    bench.step(0, 850);
    bench.alarms.snooze(0);
    for tick in 1..12_000u32 {
        bench.alarms.run_alarm_effects(tick, tick * 10, &mut panel);
        assert!(bench.alarms.is_snoozed(), "tick {}", tick);
        assert_eq!(panel.tone, Some(Tone::Off));
    }

    bench.alarms.run_alarm_effects(12_000, 120_000, &mut panel);
    assert!(!bench.alarms.is_snoozed());
    assert_eq!(panel.tone, Some(Tone::High));
    assert_eq!(panel.lines, 240);
}

#[test]
fn triggered_set_lists_most_severe_first() {
    let mut bench = Bench::new();
    let mut supply = SupplyMonitor::new(0, SUPPLY_FULL_SCALE_MV);

    supply.tick(supply_raw(24_300));
    supply.check_alarms(0, &mut bench.alarms);
    bench.step(0, 900);

    let set = bench.alarms.triggered_alarms();
    assert_eq!(
        &set[..3],
        &[
            Some(AlarmCode::RCM_SW_16),
            Some(AlarmCode::RCM_SW_11),
            Some(AlarmCode::RCM_SW_18)
        ]
    );

    // Clearing re-sorts the remaining alarms
    supply.tick(supply_raw(25_000));
    supply.check_alarms(1, &mut bench.alarms);
    let set = bench.alarms.triggered_alarms();
    assert_eq!(
        &set[..3],
        &[Some(AlarmCode::RCM_SW_18), Some(AlarmCode::RCM_SW_16), None]
    );
}
